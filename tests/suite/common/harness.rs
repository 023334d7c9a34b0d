//! Controller harness
//!
//! Builds a `SessionController` wired to a mock backend, an in-memory
//! credential medium and a notifier that records every notice.

use async_trait::async_trait;
use gavel::client::notify::{Confirmation, Notice, NoticeKind, Notifier};
use gavel::client::store::{KeyValueStore, MemoryStore};
use gavel::client::{Config, CredentialStore, SessionController, UserProfile};
use gavel::shared::{AppConfig, AppConfigBuilder, StoreError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::MockServer;

/// Notifier that keeps every notice and answers confirmations with a preset.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    answer: AtomicBool,
    confirmations: AtomicUsize,
}

impl RecordingNotifier {
    pub fn answering(answer: bool) -> Self {
        let notifier = Self::default();
        notifier.answer.store(answer, Ordering::SeqCst);
        notifier
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn titled(&self, title: &str) -> usize {
        self.notices().iter().filter(|n| n.title == title).count()
    }

    pub fn errors(&self) -> Vec<Notice> {
        self.notices()
            .into_iter()
            .filter(|n| n.kind == NoticeKind::Error)
            .collect()
    }

    pub fn confirmations(&self) -> usize {
        self.confirmations.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.notices.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    async fn confirm(&self, _request: &Confirmation) -> bool {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        self.answer.load(Ordering::SeqCst)
    }
}

/// Memory medium that fails writes to one chosen key.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_key: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn fail_writes_to(&self, key: &str) {
        *self.failing_key.lock().unwrap() = Some(key.to_string());
    }

    pub fn heal(&self) {
        *self.failing_key.lock().unwrap() = None;
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let failing = self.failing_key.lock().unwrap().clone();
        if failing.as_deref() == Some(key) {
            return Err(StoreError::Unavailable(format!("write to {} refused", key)));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.inner.remove(keys).await
    }
}

/// Base settings pointing at `server`, with fast backoff.
pub fn config_builder(server: &MockServer) -> AppConfigBuilder {
    AppConfig::builder()
        .server_url(format!("{}/api/", server.uri()))
        .request_timeout(Duration::from_secs(5))
        .validation_backoff_unit(Duration::from_millis(10))
}

pub struct Harness {
    pub server: MockServer,
    pub controller: Arc<SessionController>,
    pub notifier: Arc<RecordingNotifier>,
    pub medium: Arc<MemoryStore>,
    pub store: CredentialStore,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with(|builder| builder, RecordingNotifier::default()).await
    }

    pub async fn with(
        configure: impl FnOnce(AppConfigBuilder) -> AppConfigBuilder,
        notifier: RecordingNotifier,
    ) -> Self {
        let server = MockServer::start().await;
        let config = Config::with_builder(configure(config_builder(&server))).unwrap();
        let medium = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(medium.clone());
        let notifier = Arc::new(notifier);
        let controller = Arc::new(
            SessionController::new(config, store.clone(), notifier.clone()).unwrap(),
        );
        Self {
            server,
            controller,
            notifier,
            medium,
            store,
        }
    }

    /// Persist credentials as a previous run would have.
    pub async fn seed(&self, token: &str, profile: serde_json::Value) {
        assert!(self.store.save(token, &UserProfile::new(profile)).await);
    }
}
