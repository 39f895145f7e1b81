//! Application configuration management.
//!
//! This module handles loading the application configuration, which holds
//! the Google OAuth client registration and a few launch options.
//!
//! Configuration is stored at `~/.config/tokenpeek/config.json`. Environment
//! variables (including those from a `.env` file) override the file.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tokenpeek";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
const ENV_REDIRECT_PORT: &str = "TOKENPEEK_REDIRECT_PORT";
const ENV_NO_BROWSER: &str = "TOKENPEEK_NO_BROWSER";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub google: GoogleConfig,
}

/// Google OAuth client registration ("Desktop app" client type)
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    /// Loopback port for the redirect; 0 picks a free port
    pub redirect_port: u16,
    pub open_browser: bool,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_port: 0,
            open_browser: true,
        }
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_port", &self.redirect_port)
            .field("open_browser", &self.open_browser)
            .finish()
    }
}

impl Config {
    /// Load the config file (defaults if absent) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from a variable lookup (the process environment in `load`)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(client_id) = lookup(ENV_CLIENT_ID).filter(|v| !v.trim().is_empty()) {
            self.google.client_id = client_id.trim().to_string();
        }
        if let Some(secret) = lookup(ENV_CLIENT_SECRET).filter(|v| !v.is_empty()) {
            self.google.client_secret = Some(secret);
        }
        if let Some(port) = lookup(ENV_REDIRECT_PORT) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.google.redirect_port = port,
                Err(e) => {
                    warn!(value = %port, error = %e, "Ignoring invalid {}", ENV_REDIRECT_PORT)
                }
            }
        }
        if lookup(ENV_NO_BROWSER).is_some() {
            self.google.open_browser = false;
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for log files
    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("logs"))
    }
}
