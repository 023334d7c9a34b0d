/**
 * Session and Navigation Flow Module
 *
 * Explicit state for what the app is showing and where the session stands.
 * Both machines are table-driven: every (state, event) pair resolves to one
 * next state, and pairs without an entry leave the state unchanged.
 */

use crate::client::config::Endpoint;

/// Authentication phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Anonymous,
    /// Login or signup submitted, response pending
    Authenticating,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Login or signup request sent
    Submit,
    Succeeded,
    Failed,
    /// Credentials recovered from storage
    Restored,
    /// Teardown after logout, account deletion or an auth failure
    Ended,
}

impl SessionPhase {
    pub fn on(self, event: SessionEvent) -> Self {
        use SessionEvent::*;
        use SessionPhase::*;
        match (self, event) {
            (_, Ended) => Anonymous,
            (Anonymous, Submit) => Authenticating,
            (Anonymous, Restored) => Authenticated,
            (Authenticating, Succeeded) => Authenticated,
            (Authenticating, Failed) => Anonymous,
            (phase, _) => phase,
        }
    }

    pub fn is_authenticated(self) -> bool {
        self == Self::Authenticated
    }
}

/// Bottom-bar tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Home,
    Orders,
    Transactions,
    Chat,
    Profile,
}

impl Tab {
    /// Tabs that need a signed-in user
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Orders | Self::Transactions | Self::Chat)
    }
}

/// Which flow a verification code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpMode {
    Signup,
    ForgotPassword,
}

impl OtpMode {
    pub fn send_endpoint(self) -> Endpoint {
        match self {
            Self::Signup => Endpoint::SendSignupCode,
            Self::ForgotPassword => Endpoint::SendResetCode,
        }
    }

    pub fn verify_endpoint(self) -> Endpoint {
        match self {
            Self::Signup => Endpoint::VerifySignupCode,
            Self::ForgotPassword => Endpoint::VerifyResetCode,
        }
    }
}

/// Steps of the sign-in area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    SignIn,
    SignUp,
    ForgotPassword,
    VerifyCode(OtpMode),
    NewPassword,
}

/// What is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Tab(Tab),
    Auth(AuthStep),
}

impl Default for Screen {
    fn default() -> Self {
        Self::Tab(Tab::Home)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    OpenSignIn,
    OpenSignUp,
    OpenForgotPassword,
    CodeSent(OtpMode),
    CodeVerified(OtpMode),
    PasswordUpdated,
    Back,
    SignedOut,
}

fn next_screen(screen: Screen, event: FlowEvent) -> Screen {
    use AuthStep::*;
    use FlowEvent::*;
    match (screen, event) {
        (_, SignedOut) => Screen::Tab(Tab::Home),
        (Screen::Tab(_), OpenSignIn) => Screen::Auth(SignIn),
        (Screen::Auth(SignUp), OpenSignIn) => Screen::Auth(SignIn),
        (Screen::Auth(SignIn), OpenSignUp) => Screen::Auth(SignUp),
        (Screen::Auth(SignIn), OpenForgotPassword) => Screen::Auth(ForgotPassword),
        (Screen::Auth(SignUp), CodeSent(OtpMode::Signup)) => {
            Screen::Auth(VerifyCode(OtpMode::Signup))
        }
        (Screen::Auth(ForgotPassword), CodeSent(OtpMode::ForgotPassword)) => {
            Screen::Auth(VerifyCode(OtpMode::ForgotPassword))
        }
        (Screen::Auth(VerifyCode(OtpMode::Signup)), CodeVerified(OtpMode::Signup)) => {
            Screen::Auth(SignUp)
        }
        (Screen::Auth(VerifyCode(OtpMode::ForgotPassword)), CodeVerified(OtpMode::ForgotPassword)) => {
            Screen::Auth(NewPassword)
        }
        (Screen::Auth(NewPassword), PasswordUpdated) => Screen::Auth(SignIn),
        (Screen::Auth(VerifyCode(OtpMode::Signup)), Back) => Screen::Auth(SignUp),
        (Screen::Auth(VerifyCode(OtpMode::ForgotPassword)), Back) => Screen::Auth(ForgotPassword),
        (Screen::Auth(SignUp | ForgotPassword | NewPassword), Back) => Screen::Auth(SignIn),
        (Screen::Auth(SignIn), Back) => Screen::Tab(Tab::Home),
        (screen, _) => screen,
    }
}

/// Current screen plus a protected tab waiting on sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigator {
    screen: Screen,
    pending: Option<Tab>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn pending(&self) -> Option<Tab> {
        self.pending
    }

    /// Open `tab`, or record it and go to sign-in when it needs a session.
    pub fn select_tab(&mut self, tab: Tab, authenticated: bool) -> Screen {
        if tab.is_protected() && !authenticated {
            tracing::debug!("{:?} needs sign-in, remembering intent", tab);
            self.pending = Some(tab);
            self.screen = Screen::Auth(AuthStep::SignIn);
        } else {
            self.screen = Screen::Tab(tab);
        }
        self.screen
    }

    pub fn apply(&mut self, event: FlowEvent) -> Screen {
        self.screen = next_screen(self.screen, event);
        if matches!(event, FlowEvent::SignedOut) || self.screen == Screen::Tab(Tab::Home) {
            self.pending = None;
        }
        self.screen
    }

    /// After login or signup: resume the remembered tab, else go home.
    pub fn signed_in(&mut self) -> Screen {
        let tab = self.pending.take().unwrap_or_default();
        self.screen = Screen::Tab(tab);
        self.screen
    }
}
