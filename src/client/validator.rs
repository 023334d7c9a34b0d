//! Session Validator
//!
//! Decides whether a persisted token is still accepted by the backend without
//! logging the user out on infrastructure noise. Only a 401/403 from the
//! "who am I" endpoint is conclusive; every other outcome is indeterminate.

use crate::client::api::{is_auth_status, ApiClient};
use crate::client::config::Endpoint;
use crate::client::retry::RetryPolicy;
use crate::client::types::{redact_token, UserProfile};
use serde_json::Value;

/// Conclusive verdict on a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenState {
    /// Accepted; carries the user record when the response included one
    Valid(Option<UserProfile>),
    /// Rejected with 401/403
    Invalid,
}

/// Result of one validation round.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Definite(TokenState),
    /// Server error, transport failure or timeout; says nothing about the token
    Indeterminate(String),
}

impl Validation {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Definite(TokenState::Invalid))
    }
}

/// Outcome of the bounded startup loop.
#[derive(Debug, Clone, PartialEq)]
pub enum StartupValidation {
    Valid(Option<UserProfile>),
    Invalid,
    /// Every attempt was indeterminate; keep the session provisionally
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct SessionValidator {
    api: ApiClient,
    policy: RetryPolicy,
}

impl SessionValidator {
    pub fn new(api: ApiClient, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One round against the "who am I" endpoint.
    pub async fn validate(&self, token: &str) -> Validation {
        let path = self.api.config().path(Endpoint::Me);
        match self.api.probe(&path, token).await {
            Ok(probe) if probe.status.is_success() => {
                let profile = probe.body.as_ref().and_then(profile_from_body);
                Validation::Definite(TokenState::Valid(profile))
            }
            Ok(probe) if is_auth_status(probe.status) => {
                tracing::info!("Token {} rejected with {}", redact_token(token), probe.status);
                Validation::Definite(TokenState::Invalid)
            }
            Ok(probe) => Validation::Indeterminate(format!("server returned {}", probe.status)),
            Err(e) => Validation::Indeterminate(e.to_string()),
        }
    }

    /// Startup loop: retry indeterminate rounds with backoff, stop on the first
    /// definite verdict.
    pub async fn validate_with_retry(&self, token: &str) -> StartupValidation {
        let max = self.policy.max_attempts();
        let mut attempt = 1;
        loop {
            tracing::debug!("Token validation attempt {}/{}", attempt, max);
            match self.validate(token).await {
                Validation::Definite(TokenState::Valid(profile)) => {
                    return StartupValidation::Valid(profile)
                }
                Validation::Definite(TokenState::Invalid) => return StartupValidation::Invalid,
                Validation::Indeterminate(reason) => {
                    tracing::warn!("Token validation attempt {} inconclusive: {}", attempt, reason);
                }
            }

            match self.policy.delay_after(attempt) {
                Some(delay) => {
                    tracing::debug!("Retrying token validation in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    tracing::warn!(
                        "Token validation inconclusive after {} attempts, keeping session",
                        attempt
                    );
                    return StartupValidation::Exhausted { attempts: attempt };
                }
            }
        }
    }
}

/// Accept `{user: {...}}`, `{data: {...}}` or a bare user object.
fn profile_from_body(body: &Value) -> Option<UserProfile> {
    let candidate = body
        .get("user")
        .or_else(|| body.get("data"))
        .filter(|v| v.is_object())
        .or_else(|| {
            let looks_like_user = body.get("email").is_some()
                || body.get("fname").is_some()
                || body.get("_id").is_some();
            looks_like_user.then_some(body)
        })?;
    Some(UserProfile::new(candidate.clone()))
}
