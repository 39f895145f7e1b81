//! Clipboard access for the copy action.
//!
//! `SystemClipboard` tries, in order:
//! 1. OSC 52 - terminal clipboard escape sequence (works over SSH)
//! 2. System clipboard via the `arboard` crate

use std::io::Write;

use base64::prelude::*;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("There is no token to copy")]
    NothingToCopy,

    #[error("OSC 52 clipboard failed: {0}")]
    Osc52(String),

    #[error("System clipboard failed: {0}")]
    System(String),
}

/// Somewhere text can be copied to
pub trait Clipboard: Send {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The user's clipboard
#[derive(Debug, Clone, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }

    /// Copies text using the OSC 52 escape sequence.
    ///
    /// This writes directly to stdout, which the terminal intercepts
    /// and copies to the system clipboard.
    fn copy_osc52(text: &str) -> Result<(), ClipboardError> {
        let encoded = BASE64_STANDARD.encode(text);

        // OSC 52 format: ESC ] 52 ; c ; <base64-data> ESC \
        let mut stdout = std::io::stdout();
        write!(stdout, "\x1b]52;c;{}\x1b\\", encoded)
            .map_err(|e| ClipboardError::Osc52(e.to_string()))?;
        stdout
            .flush()
            .map_err(|e| ClipboardError::Osc52(e.to_string()))
    }

    fn copy_system(text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::System(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| ClipboardError::System(e.to_string()))
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        match Self::copy_osc52(text) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(error = %e, "OSC 52 copy failed, trying system clipboard");
                Self::copy_system(text)
            }
        }
    }
}
