//! Client Session Module
//!
//! Session and data layer of the auction mobile client: keeps the user signed
//! in across restarts, checks the token with the backend, loads the user's
//! auctions, orders, transactions and conversations, and tears everything
//! down when the server stops accepting the token.
//!
//! # Architecture
//!
//! - **`config`** - Endpoint table and URL resolution
//! - **`types`** - Wire types and the cached user profile
//! - **`api`** - HTTP client and response classification
//! - **`store`** - Credential Store (token + profile, always as a pair)
//! - **`retry`** - Backoff strategies for startup validation
//! - **`validator`** - Session Validator (definite vs indeterminate)
//! - **`resources`** - The four resource collections and their epoch
//! - **`fetch`** - Resource Fetch Coordinator
//! - **`flow`** - Session phase and navigation state machines
//! - **`notify`** - User notification channel
//! - **`session`** - Session Lifecycle Controller
//! - **`sync`** - Periodic re-validation task
//! - **`main`** - Headless driver (binary)
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs        - Module exports and documentation
//! ├── main.rs       - Binary entry point
//! ├── config.rs     - Endpoint configuration
//! ├── types.rs      - Wire types
//! ├── api.rs        - HTTP client
//! ├── store.rs      - Credential persistence
//! ├── retry.rs      - Backoff
//! ├── validator.rs  - Token validation
//! ├── resources.rs  - Collections
//! ├── fetch.rs      - Collection fetching
//! ├── flow.rs       - State machines
//! ├── notify.rs     - Notices
//! ├── session.rs    - Controller
//! └── sync/         - Background monitor
//! ```

pub mod api;
pub mod config;
pub mod fetch;
pub mod flow;
pub mod notify;
pub mod resources;
pub mod retry;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use config::{Config, Endpoint};
pub use flow::{AuthStep, OtpMode, Screen, SessionPhase, Tab};
pub use notify::{Notice, Notifier, TracingNotifier};
pub use resources::{ResourceKind, ResourceStatus};
pub use session::{RestoreOutcome, SessionController, SessionSnapshot, SignupForm};
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use sync::SessionMonitor;
pub use types::UserProfile;
