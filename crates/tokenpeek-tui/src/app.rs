//! Application state management for tokenpeek.
//!
//! This module contains the core `App` struct that manages all application state:
//! the login form, the token screen, the blocking notice, and the background
//! sign-in task.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use tokenpeek_core::token_view::COPY_FAILED_MESSAGE;
use tokenpeek_core::validation::{
    can_add_email_char, can_add_password_char, validate_email, validate_password,
};
use tokenpeek_core::{
    validate_login, AuthError, Clipboard, ClipboardError, Field, FieldErrors, IdentityProvider,
    LoginFormInput, Route, Router, SessionToken, SignInFlow, TokenStore, TokenView,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
/// One sign-in runs at a time and sends exactly one result.
const CHANNEL_BUFFER_SIZE: usize = 4;

pub const WAITING_MESSAGE: &str = "Waiting for Google sign-in in your browser...";

pub const FORM_VALID_MESSAGE: &str =
    "Form is valid. Nothing was sent - use Continue with Google to sign in.";

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingNotice,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    ShowPassword,
    Submit,
    Social(SocialProvider),
}

impl LoginFocus {
    const ORDER: [LoginFocus; 7] = [
        LoginFocus::Email,
        LoginFocus::Password,
        LoginFocus::ShowPassword,
        LoginFocus::Submit,
        LoginFocus::Social(SocialProvider::Google),
        LoginFocus::Social(SocialProvider::Apple),
        LoginFocus::Social(SocialProvider::Facebook),
    ];

    fn position(&self) -> usize {
        Self::ORDER.iter().position(|f| f == self).unwrap_or(0)
    }

    /// Get the next field (wrapping around)
    pub fn next(&self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    /// Get the previous field (wrapping around)
    pub fn prev(&self) -> Self {
        let len = Self::ORDER.len();
        Self::ORDER[(self.position() + len - 1) % len]
    }
}

/// Social sign-in buttons. Only Google is wired to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialProvider {
    Google,
    Apple,
    Facebook,
}

impl SocialProvider {
    pub fn label(&self) -> &'static str {
        match self {
            SocialProvider::Google => "Continue with Google",
            SocialProvider::Apple => "Continue with Apple",
            SocialProvider::Facebook => "Continue with Facebook",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SocialProvider::Google => "Google",
            SocialProvider::Apple => "Apple",
            SocialProvider::Facebook => "Facebook",
        }
    }

    pub fn is_wired(&self) -> bool {
        matches!(self, SocialProvider::Google)
    }
}

/// Token screen focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFocus {
    Back,
    Copy,
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    pub router: Router,
    pub store: TokenStore,
    pub flow: SignInFlow,
    provider: Arc<dyn IdentityProvider>,
    clipboard: Box<dyn Clipboard>,

    // UI State
    pub state: AppState,
    pub notice: Option<String>,
    pub status_message: Option<String>,
    last_route: Route,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub show_password: bool,
    pub field_errors: FieldErrors,
    email_touched: bool,
    password_touched: bool,
    pub consent_url: Option<String>,

    // Token screen state
    pub token_view: TokenView,
    pub token_focus: TokenFocus,

    // Background task channels
    signin_rx: mpsc::Receiver<Result<SessionToken, AuthError>>,
    signin_tx: mpsc::Sender<Result<SessionToken, AuthError>>,
    consent_rx: Option<mpsc::UnboundedReceiver<String>>,
    /// Abandons the running ceremony (the user closed the browser tab)
    signin_cancel: Option<oneshot::Sender<()>>,
}

impl App {
    /// Create a new application instance
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        clipboard: Box<dyn Clipboard>,
        store: TokenStore,
        start: Route,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let token_view = TokenView::load(&store);
        let token_focus = initial_token_focus(&token_view);

        Self {
            router: Router::new(start),
            store,
            flow: SignInFlow::new(),
            provider,
            clipboard,

            state: AppState::Normal,
            notice: None,
            status_message: None,
            last_route: start,

            login_email: String::new(),
            login_password: String::new(),
            login_focus: LoginFocus::Email,
            show_password: false,
            field_errors: FieldErrors::new(),
            email_touched: false,
            password_touched: false,
            consent_url: None,

            token_view,
            token_focus,

            signin_rx: rx,
            signin_tx: tx,
            consent_rx: None,
            signin_cancel: None,
        }
    }

    /// Receive consent URLs reported by the provider, to show while waiting
    pub fn with_consent_urls(mut self, rx: mpsc::UnboundedReceiver<String>) -> Self {
        self.consent_rx = Some(rx);
        self
    }

    pub fn route(&self) -> Route {
        self.router.current()
    }

    // =========================================================================
    // Notices
    // =========================================================================

    /// Show a blocking notice; input is captured until it is dismissed
    pub fn show_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
        self.state = AppState::ShowingNotice;
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
        self.state = AppState::Normal;
    }

    // =========================================================================
    // Login Form
    // =========================================================================

    /// Type a character into the focused text field
    pub fn push_char(&mut self, c: char) {
        match self.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(self.login_email.chars().count(), c) {
                    self.login_email.push(c);
                    self.email_touched = true;
                    self.revalidate(Field::Email);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(self.login_password.chars().count(), c) {
                    self.login_password.push(c);
                    self.password_touched = true;
                    self.revalidate(Field::Password);
                }
            }
            _ => {}
        }
    }

    /// Delete the last character of the focused text field
    pub fn pop_char(&mut self) {
        match self.login_focus {
            LoginFocus::Email => {
                if self.login_email.pop().is_some() {
                    self.email_touched = true;
                    self.revalidate(Field::Email);
                }
            }
            LoginFocus::Password => {
                if self.login_password.pop().is_some() {
                    self.password_touched = true;
                    self.revalidate(Field::Password);
                }
            }
            _ => {}
        }
    }

    /// Re-run the rule for one field, if the user has touched it
    fn revalidate(&mut self, field: Field) {
        let result = match field {
            Field::Email if self.email_touched => validate_email(&self.login_email).map(|_| ()),
            Field::Password if self.password_touched => validate_password(&self.login_password),
            _ => return,
        };
        match result {
            Ok(()) => self.field_errors.remove(field),
            Err(e) => self.field_errors.insert(e),
        }
    }

    pub fn toggle_show_password(&mut self) {
        self.show_password = !self.show_password;
    }

    /// Validate the whole form. Nothing is sent anywhere and the route stays put.
    pub fn submit_login(&mut self) {
        self.email_touched = true;
        self.password_touched = true;

        let input = LoginFormInput::new(self.login_email.clone(), self.login_password.clone());
        match validate_login(&input) {
            Ok(login) => {
                self.field_errors = FieldErrors::new();
                debug!(email = %login.email, "Login form validated");
                self.status_message = Some(FORM_VALID_MESSAGE.to_string());
            }
            Err(errors) => {
                debug!(errors = errors.len(), "Login form has errors");
                if let Some(field) = errors.first_field() {
                    self.login_focus = match field {
                        Field::Email => LoginFocus::Email,
                        Field::Password => LoginFocus::Password,
                    };
                }
                self.field_errors = errors;
                self.status_message = None;
            }
        }
    }

    pub fn error_for(&self, field: Field) -> Option<String> {
        self.field_errors.get(field).map(|e| e.to_string())
    }

    // =========================================================================
    // Social Sign-in
    // =========================================================================

    pub fn press_social(&mut self, provider: SocialProvider) {
        if provider.is_wired() {
            self.start_google_sign_in();
        } else {
            self.show_notice(format!("{} login not required for this task.", provider.name()));
        }
    }

    /// Start the Google ceremony in the background.
    ///
    /// The pending flag is claimed here, before the task is spawned, so a
    /// second key press cannot start a second ceremony.
    pub fn start_google_sign_in(&mut self) {
        let attempt = match self.flow.begin() {
            Ok(attempt) => attempt,
            Err(e) => {
                debug!(error = %e, "Ignoring sign-in request");
                return;
            }
        };

        info!(provider = self.provider.name(), "Starting sign-in");
        self.consent_url = None;
        self.status_message = Some(WAITING_MESSAGE.to_string());

        let provider = Arc::clone(&self.provider);
        let store = self.store.clone();
        let router = self.router.clone();
        let tx = self.signin_tx.clone();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.signin_cancel = Some(cancel_tx);

        tokio::spawn(async move {
            // Losing the race drops the attempt, which clears the pending flag
            let result = tokio::select! {
                result = attempt.run(provider.as_ref(), &store, &router) => result,
                Ok(()) = cancel_rx => {
                    info!("Sign-in abandoned by user");
                    Err(AuthError::Cancelled)
                }
            };
            if tx.send(result).await.is_err() {
                warn!("Sign-in finished after the UI closed");
            }
        });
    }

    pub fn is_signing_in(&self) -> bool {
        self.flow.is_pending()
    }

    /// Give up on the running ceremony.
    /// The outcome arrives as `AuthError::Cancelled` through the usual result path.
    pub fn cancel_sign_in(&mut self) {
        if let Some(cancel) = self.signin_cancel.take() {
            debug!("Cancelling sign-in");
            let _ = cancel.send(());
        }
    }

    /// Check for completed background tasks
    pub fn check_background_tasks(&mut self) {
        if let Some(rx) = self.consent_rx.as_mut() {
            while let Ok(url) = rx.try_recv() {
                if self.flow.is_pending() {
                    self.consent_url = Some(url);
                }
            }
        }
        while let Ok(result) = self.signin_rx.try_recv() {
            self.process_sign_in_result(result);
        }
        self.sync_route();
    }

    fn process_sign_in_result(&mut self, result: Result<SessionToken, AuthError>) {
        self.consent_url = None;
        self.signin_cancel = None;
        match result {
            Ok(token) => {
                self.status_message = Some(format!("Signed in as {}", token.who()));
            }
            Err(e) => {
                self.status_message = None;
                self.show_notice(e.user_message());
            }
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// React to a route change made by the router (possibly from a background task)
    pub fn sync_route(&mut self) {
        let route = self.router.current();
        if route == self.last_route {
            return;
        }
        debug!(from = self.last_route.path(), to = route.path(), "Route changed");
        self.last_route = route;

        if route == Route::Token {
            self.token_view = TokenView::load(&self.store);
            self.token_focus = initial_token_focus(&self.token_view);
        }
    }

    pub fn back_to_login(&mut self) {
        self.router.navigate(Route::Login);
        self.status_message = None;
        self.sync_route();
    }

    // =========================================================================
    // Token Screen
    // =========================================================================

    pub fn copy_token(&mut self, now: Instant) {
        if !self.token_view.can_copy() {
            return;
        }
        match self.token_view.copy(self.clipboard.as_mut(), now) {
            Ok(()) => {}
            Err(ClipboardError::NothingToCopy) => {}
            Err(_) => self.show_notice(COPY_FAILED_MESSAGE),
        }
    }

    /// Per-frame housekeeping (expire the "Copied!" acknowledgment)
    pub fn tick(&mut self, now: Instant) {
        self.token_view.tick(now);
    }
}

/// Copy is focused when there is something to copy
fn initial_token_focus(view: &TokenView) -> TokenFocus {
    if view.can_copy() {
        TokenFocus::Copy
    } else {
        TokenFocus::Back
    }
}

// ============================================================================
// Tests
// ============================================================================
