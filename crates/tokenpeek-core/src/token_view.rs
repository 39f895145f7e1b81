//! Token screen model: what to display and the copy action.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::clipboard::{Clipboard, ClipboardError};
use crate::session::{read_stored_token, StoredToken, TokenStore};

/// Shown instead of a token when storage has none
pub const NO_TOKEN_MESSAGE: &str = "No token found. Please login with Google again.";

pub const COPY_LABEL: &str = "Copy Token";
pub const COPIED_LABEL: &str = "Copied!";
pub const COPY_FAILED_MESSAGE: &str = "Copy failed. Please copy manually.";

/// How long the "Copied!" acknowledgment stays up
pub const COPIED_FEEDBACK: Duration = Duration::from_millis(1200);

#[derive(Debug, Clone)]
pub struct TokenView {
    token: StoredToken,
    copied_at: Option<Instant>,
}

impl TokenView {
    /// Read the store once; the view does not follow later writes.
    pub fn load(store: &TokenStore) -> Self {
        Self {
            token: read_stored_token(store),
            copied_at: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn display_text(&self) -> &str {
        self.token().unwrap_or(NO_TOKEN_MESSAGE)
    }

    pub fn can_copy(&self) -> bool {
        self.token.is_present()
    }

    /// Copy the token and start the "Copied!" acknowledgment.
    pub fn copy(
        &mut self,
        clipboard: &mut dyn Clipboard,
        now: Instant,
    ) -> Result<(), ClipboardError> {
        let token = self.token().ok_or(ClipboardError::NothingToCopy)?;
        match clipboard.set_text(token) {
            Ok(()) => {
                debug!("Token copied to clipboard");
                self.copied_at = Some(now);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Copy to clipboard failed");
                Err(e)
            }
        }
    }

    pub fn is_copied(&self, now: Instant) -> bool {
        self.copied_at
            .is_some_and(|at| now.saturating_duration_since(at) < COPIED_FEEDBACK)
    }

    pub fn copy_label(&self, now: Instant) -> &'static str {
        if self.is_copied(now) {
            COPIED_LABEL
        } else {
            COPY_LABEL
        }
    }

    /// Drop an expired acknowledgment. Returns true if the label changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.copied_at.is_some() && !self.is_copied(now) {
            self.copied_at = None;
            return true;
        }
        false
    }
}
