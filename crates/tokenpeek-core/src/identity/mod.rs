//! Identity bridge for third-party sign-in.
//!
//! The provider ceremony itself (consent page, token exchange) sits behind the
//! `IdentityProvider` trait. `sign_in` turns a provider result into a
//! `SessionToken`, and `SignInFlow` adds the pending flag, the storage write
//! and the redirect to the token screen.
//!
//! `GoogleProvider` is the real provider: an installed-app OAuth 2.0 flow
//! that opens the system browser and receives the redirect on a loopback port.

pub mod bridge;
pub mod error;
pub mod google;
pub mod provider;

pub use bridge::{sign_in, SignInAttempt, SignInFlow};
pub use error::AuthError;
pub use google::GoogleProvider;
pub use provider::{IdentityProvider, OAuthCredential, ProviderSignIn, ProviderUser};
