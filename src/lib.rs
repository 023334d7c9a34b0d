//! Gavel - Auction Client Session Layer
//!
//! Session and data controller for the auction mobile client. It keeps a user
//! signed in across restarts, confirms the stored token with the backend
//! without logging out on network noise, loads the four per-user collections
//! (auctions, orders, transactions, conversations) independently, and tears
//! the session down through one idempotent path when the server rejects the
//! token.
//!
//! # Module Structure
//!
//! - **`shared`** - Types that do not depend on a running session
//!   - Error taxonomy (`ApiError`, `StoreError`, `SessionError`)
//!   - Configuration (`AppConfig`, TOML + environment)
//!   - Response envelope normalization
//!
//! - **`client`** - The session layer itself
//!   - Credential Store, Session Validator
//!   - Resource Fetch Coordinator
//!   - Session Lifecycle Controller and the periodic monitor
//!
//! # Usage
//!
//! ```rust,no_run
//! use gavel::client::{Config, CredentialStore, MemoryStore, SessionController, TracingNotifier};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = Arc::new(SessionController::new(
//!     Config::from_env()?,
//!     CredentialStore::new(Arc::new(MemoryStore::new())),
//!     Arc::new(TracingNotifier::new()),
//! )?);
//!
//! controller.restore_session().await;
//! let _monitor = controller.start_monitor();
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! All work runs on tokio. The controller is shared as an `Arc`; the session
//! sits behind a `tokio::sync::Mutex` and the collections behind a
//! `tokio::sync::RwLock`. Every fetch carries the session epoch it was
//! started under and its result is dropped if the epoch has moved on.
//!
//! # Error Handling
//!
//! - `Result<T, E>` with `thiserror` enums in `shared::error`
//! - Only 401/403 ends a session; every other failure stays local and
//!   produces one user-facing notice

/// Shared types and configuration
pub mod shared;

/// Session, credential and resource handling
pub mod client;
