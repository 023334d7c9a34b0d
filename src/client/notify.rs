//! User notification channel
//!
//! Every user-facing outcome of the session layer goes through a [`Notifier`]:
//! one notice per logical event. Destructive actions ask for confirmation
//! through the same channel first.

use async_trait::async_trait;

pub const SESSION_EXPIRED_TITLE: &str = "Session Expired";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn session_expired() -> Self {
        Self::error(SESSION_EXPIRED_TITLE, SESSION_EXPIRED_MESSAGE)
    }
}

/// A yes/no question gating a destructive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
}

impl Confirmation {
    pub fn delete_account() -> Self {
        Self {
            title: "Delete Account".to_string(),
            message: "Are you sure you want to delete your account? This action cannot be undone."
                .to_string(),
            confirm_label: "Delete".to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    /// Ask the user; `true` only on explicit confirmation.
    async fn confirm(&self, request: &Confirmation) -> bool;
}

/// Headless notifier: writes notices to the log and answers confirmations
/// with a fixed choice.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier {
    confirm_destructive: bool,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every confirmation with `answer`.
    pub fn confirming(answer: bool) -> Self {
        Self {
            confirm_destructive: answer,
        }
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Error => tracing::warn!("[{}] {}", notice.title, notice.message),
            NoticeKind::Success | NoticeKind::Info => {
                tracing::info!("[{}] {}", notice.title, notice.message)
            }
        }
    }

    async fn confirm(&self, request: &Confirmation) -> bool {
        tracing::info!(
            "[{}] {} -> {}",
            request.title,
            request.message,
            if self.confirm_destructive { "confirmed" } else { "declined" }
        );
        self.confirm_destructive
    }
}
