//! Google sign-in via the installed-app OAuth 2.0 flow.
//!
//! The ceremony: listen on a loopback port, open the system browser on
//! Google's consent page, take the single redirect that comes back, and
//! exchange the authorization code (with its PKCE verifier) for tokens.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use rand::RngCore;
use reqwest::{Client, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{AuthError, IdentityProvider, OAuthCredential, ProviderSignIn, ProviderUser};
use crate::config::GoogleConfig;

// ============================================================================
// Constants
// ============================================================================

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str = "openid email profile";

/// Path Google redirects back to on the loopback listener
pub const CALLBACK_PATH: &str = "/oauth2callback";

/// HTTP request timeout for the token exchange.
/// The consent ceremony itself has no timeout; this only bounds the HTTP call.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Largest callback request we are willing to buffer
const MAX_CALLBACK_REQUEST_BYTES: usize = 8192;

/// How long one loopback connection may take to send its request line.
/// Browsers open idle preconnect sockets that never send anything.
const CALLBACK_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Called with the consent URL before the browser is opened
pub type ConsentUrlHook = Arc<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// PKCE and state
// ============================================================================

/// PKCE code verifier and challenge
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

/// Generate a PKCE verifier (32 random bytes, base64url) and its S256 challenge
pub fn generate_pkce() -> Pkce {
    let verifier = random_urlsafe(32);
    let challenge = BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    Pkce {
        verifier,
        challenge,
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the consent page URL
pub fn build_auth_url(
    client_id: &str,
    redirect_uri: &str,
    pkce: &Pkce,
    state: &str,
) -> Result<Url, AuthError> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", SCOPES),
            ("state", state),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("prompt", "select_account"),
        ],
    )
    .map_err(|e| AuthError::PopupBlocked(format!("invalid consent URL: {}", e)))
}

// ============================================================================
// Loopback callback
// ============================================================================

/// What a request on the loopback listener turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    /// The user declined consent or closed the ceremony
    Denied,
    /// The provider redirected back with an error other than a denial
    ProviderError(String),
    StateMismatch,
    /// Some other request (favicon, stray preconnect); keep waiting
    NotCallback,
}

/// Interpret the request target of a loopback request.
pub fn parse_callback(target: &str, expected_state: &str) -> CallbackOutcome {
    let url = match Url::parse(&format!("http://localhost{}", target)) {
        Ok(url) => url,
        Err(_) => return CallbackOutcome::NotCallback,
    };
    if url.path() != CALLBACK_PATH {
        return CallbackOutcome::NotCallback;
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };

    if param("state").as_deref() != Some(expected_state) {
        return CallbackOutcome::StateMismatch;
    }

    match (param("code"), param("error")) {
        (_, Some(error)) if error == "access_denied" => CallbackOutcome::Denied,
        (_, Some(error)) => CallbackOutcome::ProviderError(error),
        (Some(code), None) if !code.is_empty() => CallbackOutcome::Code(code),
        _ => CallbackOutcome::ProviderError("missing authorization code".to_string()),
    }
}

/// Pull the request target out of the HTTP request line
fn request_target(request: &str) -> Option<&str> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    parts.next()
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        let headers_done = buffer.windows(4).any(|w| w == b"\r\n\r\n");
        if headers_done || buffer.len() >= MAX_CALLBACK_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn html_response(status: &str, title: &str, message: &str) -> String {
    let body = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family:sans-serif;text-align:center;margin-top:4em\">\
         <h2>{title}</h2><p>{message}</p></body></html>"
    );
    format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    )
}

async fn respond(stream: &mut TcpStream, response: String) {
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(error = %e, "Failed to write callback response");
    }
    let _ = stream.shutdown().await;
}

/// Wait for the redirect and return the authorization code.
async fn wait_for_callback(listener: TcpListener, state: &str) -> Result<String, AuthError> {
    loop {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| AuthError::PopupBlocked(format!("callback listener failed: {}", e)))?;

        let request = match timeout(CALLBACK_READ_TIMEOUT, read_request(&mut stream)).await {
            Ok(Ok(request)) => request,
            Ok(Err(e)) => {
                debug!(error = %e, %peer, "Failed to read callback request");
                continue;
            }
            Err(_) => {
                debug!(%peer, "Dropping idle loopback connection");
                continue;
            }
        };

        let outcome = match request_target(&request) {
            Some(target) => parse_callback(target, state),
            None => CallbackOutcome::NotCallback,
        };

        match outcome {
            CallbackOutcome::Code(code) => {
                let page = html_response(
                    "200 OK",
                    "Signed in",
                    "You can close this tab and return to the terminal.",
                );
                respond(&mut stream, page).await;
                return Ok(code);
            }
            CallbackOutcome::Denied => {
                respond(
                    &mut stream,
                    html_response("200 OK", "Sign-in cancelled", "You can close this tab."),
                )
                .await;
                return Err(AuthError::Cancelled);
            }
            CallbackOutcome::ProviderError(error) => {
                respond(
                    &mut stream,
                    html_response("400 Bad Request", "Sign-in failed", &error),
                )
                .await;
                return Err(AuthError::Rejected(error));
            }
            CallbackOutcome::StateMismatch => {
                respond(
                    &mut stream,
                    html_response("400 Bad Request", "Sign-in failed", "State mismatch."),
                )
                .await;
                return Err(AuthError::Rejected("state mismatch".to_string()));
            }
            CallbackOutcome::NotCallback => {
                respond(&mut stream, html_response("404 Not Found", "Not found", "")).await;
            }
        }
    }
}

// ============================================================================
// Token exchange
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Claims read from the ID token for display. The signature is not checked.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Decode the payload segment of a JWT without verifying it
pub fn decode_id_token_claims(id_token: &str) -> Option<IdTokenClaims> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn rejection_reason(body: &str, status: reqwest::StatusCode) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(description) => format!("{} ({})", err.error, description),
            None => err.error,
        },
        Err(_) => format!("token exchange failed with status {}", status),
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Google identity provider.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct GoogleProvider {
    client: Client,
    config: GoogleConfig,
    consent_url_hook: Option<ConsentUrlHook>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            config,
            consent_url_hook: None,
        })
    }

    /// Report the consent URL (so it can be shown when no browser opens)
    pub fn on_consent_url(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.consent_url_hook = Some(Arc::new(hook));
        self
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce: &Pkce,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("code_verifier", pkce.verifier.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self.client.post(TOKEN_URL).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = rejection_reason(&body, status);
            warn!(%status, %reason, "Token exchange rejected");
            return Err(AuthError::Rejected(reason));
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}

impl fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("config", &self.config)
            .field("consent_url_hook", &self.consent_url_hook.is_some())
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn sign_in_with_popup(&self) -> Result<ProviderSignIn, AuthError> {
        if self.config.client_id.trim().is_empty() {
            return Err(AuthError::NotConfigured(
                "Set GOOGLE_CLIENT_ID (and GOOGLE_CLIENT_SECRET) or add them to the config file."
                    .to_string(),
            ));
        }

        let listener = TcpListener::bind(("127.0.0.1", self.config.redirect_port))
            .await
            .map_err(|e| {
                AuthError::PopupBlocked(format!("could not listen for the OAuth callback: {}", e))
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::PopupBlocked(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);

        let pkce = generate_pkce();
        let state = random_urlsafe(16);
        let auth_url = build_auth_url(&self.config.client_id, &redirect_uri, &pkce, &state)?;
        debug!(%redirect_uri, "Waiting for Google OAuth callback");

        if let Some(hook) = &self.consent_url_hook {
            hook(auth_url.as_str());
        }

        if self.config.open_browser {
            open::that(auth_url.as_str())
                .map_err(|e| AuthError::PopupBlocked(format!("failed to launch browser: {}", e)))?;
        } else {
            info!(url = %auth_url, "Browser launch disabled, open the consent URL manually");
        }

        let code = wait_for_callback(listener, &state).await?;
        debug!("Authorization code received, exchanging for tokens");

        let tokens = self.exchange_code(&code, &pkce, &redirect_uri).await?;

        let id_token = tokens.id_token.unwrap_or_default();
        let claims = decode_id_token_claims(&id_token).unwrap_or_default();
        let mut user = ProviderUser::new(id_token);
        user.email = claims.email;
        user.display_name = claims.name;

        Ok(ProviderSignIn {
            credential: Some(OAuthCredential {
                access_token: tokens.access_token,
            }),
            user,
        })
    }
}
