//! Resource Fetch Coordinator
//!
//! Loads the four resource collections for one session epoch. Each fetch is
//! independent: a failure marks only its own collection, and all four run
//! concurrently with [`FetchCoordinator::fetch_all`] waiting for every one to
//! settle.
//!
//! Each resource has an ordered list of candidate paths. Candidates are tried
//! in turn until one answers 2xx with a recognised envelope. A 401/403 from any
//! candidate stops the fetch and is reported upward; it is never retried here.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gavel::client::api::ApiClient;
//! use gavel::client::config::Config;
//! use gavel::client::fetch::FetchCoordinator;
//! use gavel::client::resources::ResourceBoard;
//! use tokio::sync::RwLock;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = FetchCoordinator::new(ApiClient::new(Config::new())?);
//! let board = RwLock::new(ResourceBoard::new());
//!
//! let summary = coordinator.fetch_all(&board, "token", 0, Some("42")).await;
//! if summary.auth_failed() {
//!     // hand over to the session teardown
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::api::ApiClient;
use crate::client::resources::{FetchMode, FetchTicket, ResourceBoard, ResourceKind};
use crate::shared::envelope;
use crate::shared::error::ApiError;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::RwLock;

const PAGE_PLACEHOLDER: &str = "{page}";
const USER_ID_PLACEHOLDER: &str = "{user_id}";

/// User-facing detail when a path needs the user id and the profile has none.
pub const MISSING_USER_ID_MESSAGE: &str = "Unable to load this section: user id unavailable.";

/// How a single fetch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchReport {
    /// Result written to the board
    Applied,
    /// Finished after the session moved on; result dropped
    Stale,
    /// Not started (stale epoch, already in flight or nothing more to load)
    Skipped,
    /// A candidate answered 401/403
    AuthFailed,
}

/// Per-resource reports from one `fetch_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub epoch: u64,
    pub reports: Vec<(ResourceKind, FetchReport)>,
}

impl FetchSummary {
    pub fn auth_failed(&self) -> bool {
        self.reports
            .iter()
            .any(|(_, report)| *report == FetchReport::AuthFailed)
    }

    pub fn report(&self, kind: ResourceKind) -> Option<&FetchReport> {
        self.reports
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, report)| report)
    }
}

/// Outcome of walking the candidate list.
enum Attempt {
    Items(Vec<Value>),
    Failed(String),
    Unauthorized,
}

#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    api: ApiClient,
}

impl FetchCoordinator {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Fetch all four collections concurrently and wait for every one.
    pub async fn fetch_all(
        &self,
        board: &RwLock<ResourceBoard>,
        token: &str,
        epoch: u64,
        user_id: Option<&str>,
    ) -> FetchSummary {
        tracing::info!("Fetching all resources for epoch {}", epoch);
        let fetches = ResourceKind::ALL.map(|kind| async move {
            let report = self
                .fetch_one(board, kind, FetchMode::Replace, token, epoch, user_id)
                .await;
            (kind, report)
        });
        let reports = join_all(fetches).await;
        FetchSummary { epoch, reports }
    }

    /// Fetch one collection, replacing or appending per `mode`.
    pub async fn fetch_one(
        &self,
        board: &RwLock<ResourceBoard>,
        kind: ResourceKind,
        mode: FetchMode,
        token: &str,
        epoch: u64,
        user_id: Option<&str>,
    ) -> FetchReport {
        let Some(ticket) = board.write().await.begin(kind, epoch, mode) else {
            tracing::debug!("Skipping {} fetch ({:?}) for epoch {}", kind, mode, epoch);
            return FetchReport::Skipped;
        };

        let result = match self.attempt(kind, ticket.page, token, user_id).await {
            Attempt::Items(items) => Ok(items),
            Attempt::Failed(detail) => Err(detail),
            Attempt::Unauthorized => {
                tracing::warn!("Fetching {} was rejected as unauthorized", kind);
                board.write().await.abandon(ticket);
                return FetchReport::AuthFailed;
            }
        };

        self.apply(board, ticket, result).await
    }

    async fn apply(
        &self,
        board: &RwLock<ResourceBoard>,
        ticket: FetchTicket,
        result: Result<Vec<Value>, String>,
    ) -> FetchReport {
        let kind = ticket.kind;
        match &result {
            Ok(items) => tracing::debug!("Loaded {} {} (page {})", items.len(), kind, ticket.page),
            Err(detail) => tracing::warn!("Failed to load {}: {}", kind, detail),
        }
        if board.write().await.complete(ticket, result) {
            FetchReport::Applied
        } else {
            tracing::debug!("Dropping superseded {} result (epoch {})", kind, ticket.epoch);
            FetchReport::Stale
        }
    }

    async fn attempt(
        &self,
        kind: ResourceKind,
        page: u32,
        token: &str,
        user_id: Option<&str>,
    ) -> Attempt {
        let candidates = self.api.config().paths(kind.endpoint());
        let mut last_error: Option<ApiError> = None;
        let mut answered = false;

        for template in &candidates {
            let Some(path) = expand_path(template, page, user_id) else {
                tracing::warn!("Cannot fetch {} from {}: no user id", kind, template);
                last_error = None;
                continue;
            };

            match self.api.get(&path, Some(token)).await {
                Ok(body) => match envelope::extract_collection(&body, kind.envelope_keys()) {
                    Some(items) => return Attempt::Items(items),
                    None => {
                        tracing::warn!(
                            "Unrecognised {} envelope from {}: {}",
                            kind,
                            path,
                            envelope::describe_shape(&body)
                        );
                        answered = true;
                    }
                },
                Err(e) if e.is_auth_failure() => return Attempt::Unauthorized,
                Err(e) => {
                    tracing::debug!("Candidate {} for {} failed: {}", path, kind, e);
                    last_error = Some(e);
                }
            }
        }

        if answered {
            // A 2xx with an unknown shape is an empty collection, not an error.
            return Attempt::Items(Vec::new());
        }
        match last_error {
            Some(e) => Attempt::Failed(e.user_message()),
            None => Attempt::Failed(MISSING_USER_ID_MESSAGE.to_string()),
        }
    }
}

/// Substitute `{page}` and `{user_id}`; `None` when a user id is required but absent.
fn expand_path(template: &str, page: u32, user_id: Option<&str>) -> Option<String> {
    let path = template.replace(PAGE_PLACEHOLDER, &page.to_string());
    if !path.contains(USER_ID_PLACEHOLDER) {
        return Some(path);
    }
    match user_id.map(str::trim) {
        Some(id) if !id.is_empty() => Some(path.replace(USER_ID_PLACEHOLDER, id)),
        _ => None,
    }
}
