/**
 * Shared Types Module
 *
 * Wire types for the auth endpoints and the cached user profile.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Account type sent with login and send-code requests.
pub const CUSTOMER_ACCOUNT: &str = "customer";

/// Last-known user record.
///
/// The backend owns the shape; this layer only reads a few identity fields
/// and otherwise passes the record through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(pub Value);

impl UserProfile {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Server identifier, accepting `id` or `_id` as string or number.
    pub fn id(&self) -> Option<String> {
        ["id", "_id"].iter().find_map(|key| match self.0.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    /// `fname lname`, falling back to `name`.
    pub fn display_name(&self) -> Option<String> {
        let part = |key: &str| {
            self.0
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        match (part("fname"), part("lname")) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.to_string()),
            (None, Some(last)) => Some(last.to_string()),
            (None, None) => part("name").map(str::to_string),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "type")]
    pub account_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendCodeRequest {
    pub email: String,
    #[serde(rename = "type")]
    pub account_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

/// Registration form. `code` must come from a successful signup verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignupRequest {
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub code: String,
}

/// Login/signup response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub message: Option<String>,
}

/// Shorten a token for log output.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}
