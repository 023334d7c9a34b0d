//! Session Lifecycle Controller
//!
//! Owns the session (phase, token, profile) and the resource board, and is
//! the only place either is mutated. Every other component reports back here:
//! the validator's verdicts and any 401/403 seen while fetching funnel into a
//! single teardown path.
//!
//! # Teardown
//!
//! Teardown clears the credential store, ends the session and resets all four
//! collections under the session lock, then bumps the epoch. Callers that
//! observed a failure under an older epoch, or that arrive after the session
//! is already gone, find nothing to do. Concurrent reports therefore produce
//! one teardown and one "Session Expired" notice.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gavel::client::config::Config;
//! use gavel::client::notify::TracingNotifier;
//! use gavel::client::session::SessionController;
//! use gavel::client::store::{CredentialStore, MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CredentialStore::new(Arc::new(MemoryStore::new()));
//! let controller = Arc::new(SessionController::new(
//!     Config::new(),
//!     store,
//!     Arc::new(TracingNotifier::new()),
//! )?);
//!
//! controller.restore_session().await;
//! controller.login("a@b.com", "pw").await?;
//! controller.logout().await;
//! # Ok(())
//! # }
//! ```

use crate::client::api::{require_success, ApiClient};
use crate::client::config::{Config, Endpoint};
use crate::client::fetch::{FetchCoordinator, FetchReport, FetchSummary};
use crate::client::flow::{AuthStep, FlowEvent, Navigator, OtpMode, Screen, SessionEvent, SessionPhase, Tab};
use crate::client::notify::{Confirmation, Notice, Notifier};
use crate::client::resources::{FetchMode, ResourceBoard, ResourceCollection, ResourceKind};
use crate::client::retry::RetryPolicy;
use crate::client::store::{CredentialStore, Credentials};
use crate::client::sync::SessionMonitor;
use crate::client::types::{
    redact_token, AuthResponse, LoginRequest, SendCodeRequest, SignupRequest, UpdatePasswordRequest,
    UserProfile, VerifyCodeRequest, CUSTOMER_ACCOUNT,
};
use crate::client::validator::{SessionValidator, StartupValidation, TokenState, Validation};
use crate::shared::error::{ApiError, SessionError};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const ERROR_TITLE: &str = "Error";
const SUCCESS_TITLE: &str = "Success";

/// Registration form as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
}

/// Result of startup restoration.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// Nothing persisted
    NoSession,
    /// Token confirmed by the server
    Restored,
    /// Every validation attempt was inconclusive; session kept
    Provisional { attempts: u32 },
    /// Token rejected; storage cleared
    Invalidated,
}

/// Read-only view of the session for rendering and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub is_authenticated: bool,
    pub profile: Option<UserProfile>,
    /// Redacted token prefix, never the full token
    pub token_hint: Option<String>,
    pub epoch: u64,
    pub last_validated: Option<DateTime<Utc>>,
    pub screen: Screen,
    pub pending_tab: Option<Tab>,
    /// Email kept across the send-code and verify steps
    pub pending_email: Option<String>,
}

/// Code exchange in progress. `code` is set once the server accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Verification {
    mode: OtpMode,
    email: String,
    code: Option<String>,
}

#[derive(Debug, Default)]
struct Session {
    phase: SessionPhase,
    token: Option<String>,
    profile: Option<UserProfile>,
    last_validated: Option<DateTime<Utc>>,
    verification: Option<Verification>,
    navigator: Navigator,
}

impl Session {
    fn is_authenticated(&self) -> bool {
        self.phase.is_authenticated() && self.token.is_some()
    }

    fn end(&mut self) {
        self.phase = self.phase.on(SessionEvent::Ended);
        self.token = None;
        self.profile = None;
        self.last_validated = None;
        self.verification = None;
        self.navigator.apply(FlowEvent::SignedOut);
    }

    fn verified_code(&self, mode: OtpMode) -> Option<&Verification> {
        self.verification
            .as_ref()
            .filter(|v| v.mode == mode && v.code.is_some())
    }
}

/// What authenticated background work needs from the session.
struct ActiveSession {
    token: String,
    epoch: u64,
    user_id: Option<String>,
}

pub struct SessionController {
    config: Config,
    api: ApiClient,
    validator: SessionValidator,
    fetcher: FetchCoordinator,
    store: CredentialStore,
    notifier: Arc<dyn Notifier>,
    session: Mutex<Session>,
    resources: RwLock<ResourceBoard>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("server_url", &self.config.server_url())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(
        config: Config,
        store: CredentialStore,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::new(config.clone())?;
        let policy = RetryPolicy::linear(
            config.app().validation_attempts,
            config.app().validation_backoff_unit,
        );
        Ok(Self {
            validator: SessionValidator::new(api.clone(), policy),
            fetcher: FetchCoordinator::new(api.clone()),
            config,
            api,
            store,
            notifier,
            session: Mutex::new(Session::default()),
            resources: RwLock::new(ResourceBoard::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Spawn the periodic re-validation task for this controller.
    pub fn start_monitor(self: &Arc<Self>) -> SessionMonitor {
        SessionMonitor::start(Arc::downgrade(self), self.config.revalidate_interval())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        let board = self.resources.read().await;
        SessionSnapshot {
            phase: session.phase,
            is_authenticated: session.is_authenticated(),
            profile: session.profile.clone(),
            token_hint: session.token.as_deref().map(redact_token),
            epoch: board.epoch(),
            last_validated: session.last_validated,
            screen: session.navigator.screen(),
            pending_tab: session.navigator.pending(),
            pending_email: session.verification.as_ref().map(|v| v.email.clone()),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.is_authenticated()
    }

    /// Copy of all four collections.
    pub async fn resources(&self) -> ResourceBoard {
        self.resources.read().await.clone()
    }

    pub async fn collection(&self, kind: ResourceKind) -> ResourceCollection {
        self.resources.read().await.get(kind).clone()
    }

    /// Recover the persisted session and confirm it with the server.
    pub async fn restore_session(&self) -> RestoreOutcome {
        let Some(Credentials { token, profile }) = self.store.load().await else {
            tracing::info!("No stored session, user needs to sign in");
            return RestoreOutcome::NoSession;
        };

        let epoch = {
            let mut session = self.session.lock().await;
            let mut board = self.resources.write().await;
            let epoch = board.epoch() + 1;
            board.reset(epoch);
            session.token = Some(token.clone());
            session.profile = Some(profile);
            session.phase = session.phase.on(SessionEvent::Restored);
            epoch
        };
        tracing::info!("Restoring stored session {}", redact_token(&token));

        match self.validator.validate_with_retry(&token).await {
            StartupValidation::Valid(profile) => {
                self.mark_validated(epoch, profile).await;
                self.ensure_data_loaded().await;
                RestoreOutcome::Restored
            }
            StartupValidation::Invalid => {
                tracing::info!("Stored token is no longer valid, clearing session");
                self.end_session(Some(epoch), true).await;
                RestoreOutcome::Invalidated
            }
            StartupValidation::Exhausted { attempts } => {
                self.ensure_data_loaded().await;
                RestoreOutcome::Provisional { attempts }
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return self.reject(SessionError::Validation(
                "Please enter your email and password".to_string(),
            ));
        }
        self.begin_authentication().await?;

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            account_type: CUSTOMER_ACCOUNT,
        };
        let path = self.config.path(Endpoint::Login);
        let result = self
            .api
            .post(&path, None, &request)
            .await
            .and_then(require_success)
            .and_then(parse_auth_response);
        self.finish_authentication(result, None).await
    }

    /// Register with a code verified through [`Self::verify_otp`] for the same email.
    pub async fn signup(&self, form: SignupForm) -> Result<(), SessionError> {
        let email = form.email.trim().to_string();
        let required = [&form.fname, &form.lname, &email, &form.password, &form.phone];
        if required.iter().any(|field| field.trim().is_empty()) {
            return self.reject(SessionError::Validation(
                "Please fill all required fields including verification code".to_string(),
            ));
        }
        if form.password != form.confirm_password {
            return self.reject(SessionError::Validation("Passwords do not match".to_string()));
        }

        let code = {
            let session = self.session.lock().await;
            session
                .verified_code(OtpMode::Signup)
                .filter(|v| v.email.eq_ignore_ascii_case(&email))
                .and_then(|v| v.code.clone())
        };
        let Some(code) = code else {
            return self.reject(SessionError::VerificationRequired(
                "Please verify your email before creating an account".to_string(),
            ));
        };
        self.begin_authentication().await?;

        let request = SignupRequest {
            fname: form.fname.trim().to_string(),
            lname: form.lname.trim().to_string(),
            email,
            password: form.password,
            phone: form.phone.trim().to_string(),
            code,
        };
        let path = self.config.path(Endpoint::Signup);
        let result = self
            .api
            .post(&path, None, &request)
            .await
            .and_then(require_success)
            .and_then(parse_auth_response);
        self.finish_authentication(result, Some("Account created successfully"))
            .await
    }

    /// Request a verification code for `mode`, remembering the email.
    pub async fn send_code(&self, mode: OtpMode, email: &str) -> Result<(), SessionError> {
        let email = email.trim().to_string();
        if email.is_empty() {
            return self.reject(SessionError::Validation(
                "Please enter your email address".to_string(),
            ));
        }

        let request = SendCodeRequest {
            email: email.clone(),
            account_type: CUSTOMER_ACCOUNT,
        };
        let path = self.config.path(mode.send_endpoint());
        match self.api.post(&path, None, &request).await.and_then(require_success) {
            Ok(_) => {
                let mut session = self.session.lock().await;
                session.verification = Some(Verification {
                    mode,
                    email,
                    code: None,
                });
                session.navigator.apply(FlowEvent::CodeSent(mode));
                drop(session);
                tracing::info!("Verification code sent ({:?})", mode);
                self.notifier.notify(Notice::success(
                    SUCCESS_TITLE,
                    "Verification code sent to your email",
                ));
                Ok(())
            }
            Err(e) => self.reject(e.into()),
        }
    }

    /// Submit the code received for `mode`.
    pub async fn verify_otp(&self, mode: OtpMode, code: &str) -> Result<(), SessionError> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return self.reject(SessionError::Validation(
                "Please enter the verification code".to_string(),
            ));
        }

        let email = {
            let session = self.session.lock().await;
            session
                .verification
                .as_ref()
                .filter(|v| v.mode == mode)
                .map(|v| v.email.clone())
        };
        let Some(email) = email else {
            return self.reject(SessionError::VerificationRequired(
                "Please request a verification code first".to_string(),
            ));
        };

        let request = VerifyCodeRequest {
            email: email.clone(),
            code: code.clone(),
        };
        let path = self.config.path(mode.verify_endpoint());
        if let Err(e) = self.api.post(&path, None, &request).await.and_then(require_success) {
            return self.reject(e.into());
        }

        {
            let mut session = self.session.lock().await;
            match session.verification.as_mut() {
                Some(v) if v.mode == mode && v.email == email => v.code = Some(code),
                _ => {
                    tracing::debug!("Verification state changed while the code was checked");
                    return Err(SessionError::VerificationRequired(
                        "Please request a verification code first".to_string(),
                    ));
                }
            }
            session.navigator.apply(FlowEvent::CodeVerified(mode));
        }
        tracing::info!("Verification code accepted ({:?})", mode);
        if mode == OtpMode::Signup {
            self.notifier.notify(Notice::success(
                SUCCESS_TITLE,
                "Email verified! Please complete your registration.",
            ));
        }
        Ok(())
    }

    /// Complete the forgot-password flow from the new-password step.
    pub async fn update_password(&self, password: &str, confirm: &str) -> Result<(), SessionError> {
        if password.is_empty() || confirm.is_empty() {
            return self.reject(SessionError::Validation(
                "Please fill all password fields".to_string(),
            ));
        }
        if password != confirm {
            return self.reject(SessionError::Validation("Passwords do not match".to_string()));
        }

        let code = {
            let session = self.session.lock().await;
            let on_step = session.navigator.screen() == Screen::Auth(AuthStep::NewPassword);
            session
                .verified_code(OtpMode::ForgotPassword)
                .filter(|_| on_step)
                .and_then(|v| v.code.clone())
        };
        let Some(code) = code else {
            return self.reject(SessionError::VerificationRequired(
                "Please verify your email before choosing a new password".to_string(),
            ));
        };

        let request = UpdatePasswordRequest {
            password: password.to_string(),
            code,
        };
        let path = self.config.path(Endpoint::UpdatePassword);
        match self.api.put(&path, None, &request).await.and_then(require_success) {
            Ok(_) => {
                let mut session = self.session.lock().await;
                session.verification = None;
                session.navigator.apply(FlowEvent::PasswordUpdated);
                drop(session);
                tracing::info!("Password updated");
                self.notifier.notify(Notice::success(
                    SUCCESS_TITLE,
                    "Password updated successfully. Please sign in.",
                ));
                Ok(())
            }
            Err(e) => self.reject(e.into()),
        }
    }

    /// Clear everything locally. Never fails.
    pub async fn logout(&self) {
        self.end_session(None, false).await;
        tracing::info!("Signed out");
        self.notifier
            .notify(Notice::success(SUCCESS_TITLE, "Logged out successfully"));
    }

    /// Delete the account after explicit confirmation, then sign out.
    pub async fn delete_account(&self) -> Result<(), SessionError> {
        let Some(active) = self.active_session().await else {
            return self.reject(SessionError::NotAuthenticated);
        };

        if !self.notifier.confirm(&Confirmation::delete_account()).await {
            tracing::debug!("Account deletion declined");
            return Err(SessionError::Cancelled);
        }

        let path = self.config.path(Endpoint::DeleteAccount);
        match self
            .api
            .delete(&path, Some(&active.token))
            .await
            .and_then(require_success)
        {
            Ok(_) => {
                self.end_session(Some(active.epoch), false).await;
                tracing::info!("Account deleted");
                self.notifier
                    .notify(Notice::success(SUCCESS_TITLE, "Account deleted successfully"));
                Ok(())
            }
            Err(e) if e.is_auth_failure() => {
                self.expire(Some(active.epoch)).await;
                Err(e.into())
            }
            Err(e) => self.reject(e.into()),
        }
    }

    /// Report a 401/403 seen anywhere. Returns whether this call tore the session down.
    pub async fn on_authentication_failure(&self) -> bool {
        self.expire(None).await
    }

    /// Fetch all four collections unless any already holds data.
    pub async fn ensure_data_loaded(&self) -> Option<FetchSummary> {
        let active = {
            let session = self.session.lock().await;
            let board = self.resources.read().await;
            if !session.is_authenticated() {
                return None;
            }
            let untouched = board.iter().all(|c| c.is_empty() && !c.in_flight());
            if !untouched {
                tracing::debug!("Resources already loaded, skipping fetch");
                return None;
            }
            ActiveSession {
                token: session.token.clone()?,
                epoch: board.epoch(),
                user_id: session.profile.as_ref().and_then(UserProfile::id),
            }
        };

        let summary = self
            .fetcher
            .fetch_all(&self.resources, &active.token, active.epoch, active.user_id.as_deref())
            .await;
        if summary.auth_failed() {
            self.expire(Some(active.epoch)).await;
        }
        Some(summary)
    }

    /// Reload one collection. Silently does nothing while signed out.
    pub async fn refresh(&self, kind: ResourceKind) -> Option<FetchReport> {
        self.fetch(kind, FetchMode::Replace).await
    }

    /// Append the next page of orders; ignored while a page is in flight.
    pub async fn load_more_orders(&self) -> Option<FetchReport> {
        self.fetch(ResourceKind::Orders, FetchMode::Append).await
    }

    async fn fetch(&self, kind: ResourceKind, mode: FetchMode) -> Option<FetchReport> {
        let active = self.active_session().await?;
        let report = self
            .fetcher
            .fetch_one(
                &self.resources,
                kind,
                mode,
                &active.token,
                active.epoch,
                active.user_id.as_deref(),
            )
            .await;
        if report == FetchReport::AuthFailed {
            self.expire(Some(active.epoch)).await;
        }
        Some(report)
    }

    /// One background health check. Only a definite rejection ends the session.
    pub async fn revalidate(&self) -> Option<Validation> {
        let active = self.active_session().await?;
        let outcome = self.validator.validate(&active.token).await;
        match &outcome {
            Validation::Definite(TokenState::Invalid) => {
                tracing::info!("Token rejected during periodic validation");
                self.expire(Some(active.epoch)).await;
            }
            Validation::Definite(TokenState::Valid(profile)) => {
                self.mark_validated(active.epoch, profile.clone()).await;
            }
            Validation::Indeterminate(reason) => {
                tracing::debug!("Periodic validation inconclusive, continuing: {}", reason);
            }
        }
        Some(outcome)
    }

    pub async fn select_tab(&self, tab: Tab) -> Screen {
        let mut session = self.session.lock().await;
        let authenticated = session.is_authenticated();
        session.navigator.select_tab(tab, authenticated)
    }

    pub async fn navigate(&self, event: FlowEvent) -> Screen {
        let mut session = self.session.lock().await;
        let screen = session.navigator.apply(event);
        // Leaving the sign-in area forgets the email entered there.
        if matches!(screen, Screen::Tab(_)) {
            session.verification = None;
        }
        screen
    }

    async fn active_session(&self) -> Option<ActiveSession> {
        let session = self.session.lock().await;
        if !session.is_authenticated() {
            return None;
        }
        let board = self.resources.read().await;
        Some(ActiveSession {
            token: session.token.clone()?,
            epoch: board.epoch(),
            user_id: session.profile.as_ref().and_then(UserProfile::id),
        })
    }

    async fn begin_authentication(&self) -> Result<(), SessionError> {
        let mut session = self.session.lock().await;
        if session.phase == SessionPhase::Authenticating {
            return Err(SessionError::Validation(
                "A sign-in request is already in progress".to_string(),
            ));
        }
        session.phase = session.phase.on(SessionEvent::Submit);
        Ok(())
    }

    async fn finish_authentication(
        &self,
        result: Result<(String, UserProfile), ApiError>,
        success_message: Option<&str>,
    ) -> Result<(), SessionError> {
        let (token, profile) = match result {
            Ok(pair) => pair,
            Err(e) => {
                let mut session = self.session.lock().await;
                session.phase = session.phase.on(SessionEvent::Failed);
                drop(session);
                tracing::info!("Sign-in failed: {}", e);
                return self.reject(e.into());
            }
        };

        {
            let mut session = self.session.lock().await;
            let next = session.phase.on(SessionEvent::Succeeded);
            if !next.is_authenticated() {
                tracing::debug!("Session ended while signing in, discarding credentials");
                return Err(SessionError::Cancelled);
            }
            let mut board = self.resources.write().await;
            let epoch = board.epoch() + 1;
            board.reset(epoch);
            session.phase = next;
            session.token = Some(token.clone());
            session.profile = Some(profile.clone());
            session.last_validated = Some(Utc::now());
            session.verification = None;
            session.navigator.signed_in();
        }
        tracing::info!(
            "Signed in as {} ({})",
            profile.email().unwrap_or("unknown"),
            redact_token(&token)
        );

        self.store.save(&token, &profile).await;
        if let Some(message) = success_message {
            self.notifier.notify(Notice::success(SUCCESS_TITLE, message));
        }
        self.ensure_data_loaded().await;
        Ok(())
    }

    /// Record a successful validation, refreshing the cached profile when the
    /// server sent one.
    async fn mark_validated(&self, epoch: u64, profile: Option<UserProfile>) {
        let mut session = self.session.lock().await;
        if self.resources.read().await.epoch() != epoch || !session.is_authenticated() {
            return;
        }
        session.last_validated = Some(Utc::now());

        let Some(profile) = profile else { return };
        if session.profile.as_ref() == Some(&profile) {
            return;
        }
        session.profile = Some(profile.clone());
        if let Some(token) = session.token.clone() {
            tracing::debug!("Refreshing cached profile");
            self.store.save(&token, &profile).await;
        }
    }

    /// Teardown after an auth failure, with the one "Session Expired" notice.
    async fn expire(&self, epoch: Option<u64>) -> bool {
        let ended = self.end_session(epoch, true).await;
        if ended {
            tracing::info!("Session expired, signed out");
            self.notifier.notify(Notice::session_expired());
        }
        ended
    }

    /// The single teardown path.
    ///
    /// With `epoch` set, does nothing unless the session is still on that
    /// epoch. With `require_token`, does nothing when no session is held.
    async fn end_session(&self, epoch: Option<u64>, require_token: bool) -> bool {
        let mut session = self.session.lock().await;
        let mut board = self.resources.write().await;
        if epoch.is_some_and(|epoch| epoch != board.epoch()) {
            tracing::debug!("Ignoring teardown for stale epoch {:?}", epoch);
            return false;
        }
        if require_token && session.token.is_none() {
            return false;
        }

        self.store.clear().await;
        let next = board.epoch() + 1;
        board.reset(next);
        session.end();
        true
    }

    fn reject<T>(&self, error: SessionError) -> Result<T, SessionError> {
        self.notifier
            .notify(Notice::error(ERROR_TITLE, error.user_message()));
        Err(error)
    }
}

/// Token and profile from a login or signup body.
fn parse_auth_response(body: Value) -> Result<(String, UserProfile), ApiError> {
    let response: AuthResponse =
        serde_json::from_value(body).map_err(|e| ApiError::malformed(e.to_string()))?;
    let token = response
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::malformed("response carried no token"))?;
    let profile = response
        .user
        .filter(|user| !user.as_value().is_null())
        .unwrap_or_else(|| UserProfile::new(json!({})));
    Ok((token, profile))
}
