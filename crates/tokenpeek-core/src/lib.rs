//! Core library for tokenpeek.
//!
//! This crate holds everything that is not terminal rendering:
//!
//! - `validation`: pure login form rules (email grammar, required password)
//! - `session`: ephemeral session storage and the access-token store
//! - `identity`: the identity bridge, the sign-in flow and the Google provider
//! - `route`: the two navigation routes and a shared router handle
//! - `clipboard` / `token_view`: the token screen model and copy action
//! - `config`: configuration file and environment overrides

pub mod clipboard;
pub mod config;
pub mod identity;
pub mod route;
pub mod session;
pub mod token_view;
pub mod validation;

pub use clipboard::{Clipboard, ClipboardError, SystemClipboard};
pub use config::{Config, GoogleConfig};
pub use identity::{
    sign_in, AuthError, GoogleProvider, IdentityProvider, SignInAttempt, SignInFlow,
};
pub use route::{Route, Router};
pub use session::{
    read_stored_token, MemoryStorage, SessionStorage, SessionToken, StorageError, StoredToken,
    TokenStore, ACCESS_TOKEN_KEY,
};
pub use token_view::TokenView;
pub use validation::{
    validate_login, Field, FieldErrors, LoginFormInput, ValidatedLogin, ValidationError,
};
