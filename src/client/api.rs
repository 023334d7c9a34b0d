/**
 * API Client Module
 *
 * Thin async HTTP client for the auction backend. Attaches the bearer token,
 * applies the configured request timeout and classifies every response into
 * one of the `ApiError` categories so callers never inspect raw statuses.
 */

use crate::client::config::Config;
use crate::shared::envelope;
use crate::shared::error::ApiError;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Status and parsed body of a request whose outcome the caller classifies itself.
#[derive(Debug, Clone)]
pub struct Probe {
    pub status: StatusCode,
    pub body: Option<Value>,
}

/// HTTP client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: Config,
}

impl ApiClient {
    /// Build a client with the configured request timeout.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError> {
        self.send(self.request(Method::GET, path, token), token.is_some()).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<Value, ApiError> {
        self.send(self.request(Method::POST, path, token).json(body), token.is_some())
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<Value, ApiError> {
        self.send(self.request(Method::PUT, path, token).json(body), token.is_some())
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError> {
        self.send(self.request(Method::DELETE, path, token), token.is_some())
            .await
    }

    /// Issue a GET and return the raw status. Only transport failures are errors.
    pub async fn probe(&self, path: &str, token: &str) -> Result<Probe, ApiError> {
        let response = self.request(Method::GET, path, Some(token)).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok());
        Ok(Probe { status, body })
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = self.config.api_url(path);
        tracing::debug!("{} {}", method, url);
        let request = self.http.request(method, url).header(ACCEPT, "application/json");
        match token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// A 401/403 only means a dead token when one was sent; for anonymous
    /// calls it is an ordinary failure carrying the server's message.
    async fn send(&self, request: RequestBuilder, authenticated: bool) -> Result<Value, ApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!("Request failed before a response: {}", e);
            ApiError::from(e)
        })?;

        let status = response.status();
        if authenticated && is_auth_status(status) {
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        classify(status, &text)
    }
}

/// 401 and 403 are the only statuses that invalidate a token.
pub fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn classify(status: StatusCode, text: &str) -> Result<Value, ApiError> {
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|body| envelope::message(&body));
        tracing::debug!("Server returned {}: {}", status, truncate(text, 100));
        return Err(ApiError::status(status.as_u16(), message));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(text).map_err(|e| {
        tracing::error!("Response is not valid JSON ({}): {}", e, truncate(text, 100));
        ApiError::malformed(e.to_string())
    })
}

/// Reject 2xx bodies that report `success: false`.
pub fn require_success(body: Value) -> Result<Value, ApiError> {
    if envelope::success_flag(&body) == Some(false) {
        return Err(ApiError::Rejected {
            message: envelope::message(&body),
        });
    }
    Ok(body)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
