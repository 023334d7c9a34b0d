use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use std::path::PathBuf;
use std::time::Duration;

/// Named API endpoints used by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// "Who am I" session check
    Me,
    Login,
    SendSignupCode,
    SendResetCode,
    VerifySignupCode,
    VerifyResetCode,
    Signup,
    UpdatePassword,
    DeleteAccount,
    Auctions,
    Orders,
    Transactions,
    Conversations,
}

impl Endpoint {
    /// Key used for overrides in the `[endpoints]` config table
    pub fn key(self) -> &'static str {
        match self {
            Self::Me => "me",
            Self::Login => "login",
            Self::SendSignupCode => "send_signup_code",
            Self::SendResetCode => "send_reset_code",
            Self::VerifySignupCode => "verify_signup_code",
            Self::VerifyResetCode => "verify_reset_code",
            Self::Signup => "signup",
            Self::UpdatePassword => "update_password",
            Self::DeleteAccount => "delete_account",
            Self::Auctions => "auctions",
            Self::Orders => "orders",
            Self::Transactions => "transactions",
            Self::Conversations => "conversations",
        }
    }

    fn default_path(self) -> &'static str {
        match self {
            Self::Me => "users/me",
            Self::Login => "auth/",
            Self::SendSignupCode => "users/send-code",
            Self::SendResetCode => "users/forget-password",
            Self::VerifySignupCode => "users/verify-otp/registration",
            Self::VerifyResetCode => "users/verify-otp/forget-password",
            Self::Signup => "users/signup",
            Self::UpdatePassword => "users/update-password",
            Self::DeleteAccount => "users/",
            Self::Auctions => "auction/user/{page}",
            Self::Orders => "auction/order/user?page={page}",
            Self::Transactions => "payment/history",
            Self::Conversations => "auction/conversations/{user_id}",
        }
    }
}

/// Runtime configuration: the validated [`AppConfig`] plus endpoint resolution.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_app(app: AppConfig) -> Self {
        Self { app }
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self::from_app(builder.build()?))
    }

    /// Defaults overridden by `GAVEL_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        AppConfig::from_env().map(Self::from_app)
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn server_url(&self) -> &str {
        &self.app.server_url
    }

    /// Get the full URL for a relative API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path.trim_start_matches('/'))
    }

    /// Candidate paths for an endpoint, in the order they should be tried.
    pub fn paths(&self, endpoint: Endpoint) -> Vec<String> {
        match self.app.endpoints.get(endpoint.key()) {
            Some(paths) if !paths.is_empty() => paths.clone(),
            _ => vec![endpoint.default_path().to_string()],
        }
    }

    /// Primary path for an endpoint
    pub fn path(&self, endpoint: Endpoint) -> String {
        self.paths(endpoint)
            .into_iter()
            .next()
            .unwrap_or_else(|| endpoint.default_path().to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        self.app.request_timeout
    }

    pub fn revalidate_interval(&self) -> Duration {
        self.app.revalidate_interval
    }

    /// Credential file location, falling back to the platform data dir.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.app
            .store_path
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("gavel").join("credentials.json")))
    }
}
