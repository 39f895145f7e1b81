//! tokenpeek - a terminal login demo.
//!
//! Shows a validated email/password form and a "Continue with Google" button.
//! A successful Google sign-in stores the access token for the session and
//! switches to a screen that displays it with a copy button.

mod app;
mod ui;

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tokenpeek_core::{Config, GoogleProvider, Route, SystemClipboard, TokenStore};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "tokenpeek.log";

/// Filter used when RUST_LOG is unset. Sign-in progress (including the consent
/// URL when the browser is not launched) is logged at info by the core crate.
const DEFAULT_LOG_FILTER: &str = "warn,tokenpeek_core=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StartAt {
    Login,
    Token,
}

impl From<StartAt> for Route {
    fn from(start: StartAt) -> Self {
        match start {
            StartAt::Login => Route::Login,
            StartAt::Token => Route::Token,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tokenpeek", version, about = "Sign in with Google and look at the token")]
struct Cli {
    /// Screen to open first
    #[arg(long, value_enum, default_value_t = StartAt::Login)]
    start_at: StartAt,
}

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so logs go to a daily file under `log_dir`.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=tokenpeek_core=debug).
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {:#}. Using defaults.", e);
            Config::default()
        }
    };

    let log_dir = config
        .log_dir()
        .unwrap_or_else(|_| std::env::temp_dir().join("tokenpeek"));
    let _log_guard = init_tracing(&log_dir);
    info!(start = ?cli.start_at, "tokenpeek starting");

    if config.google.client_id.is_empty() {
        warn!("GOOGLE_CLIENT_ID is not set; Google sign-in will report it as not configured");
    }

    let (consent_tx, consent_rx) = mpsc::unbounded_channel();
    let provider = GoogleProvider::new(config.google.clone())?.on_consent_url(move |url| {
        let _ = consent_tx.send(url.to_string());
    });

    let mut app = App::new(
        Arc::new(provider),
        Box::new(SystemClipboard::new()),
        TokenStore::in_memory(),
        cli.start_at.into(),
    )
    .with_consent_urls(consent_rx);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("tokenpeek shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app, Instant::now()))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key)? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();
        app.tick(Instant::now());

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_filter_keeps_sign_in_progress() {
        let filter = EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("tokenpeek_core=info"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn test_start_at_maps_to_route() {
        assert_eq!(Route::from(StartAt::Login), Route::Login);
        assert_eq!(Route::from(StartAt::Token), Route::Token);
        let cli = Cli::try_parse_from(["tokenpeek", "--start-at", "token"]).unwrap();
        assert_eq!(cli.start_at, StartAt::Token);
    }
}
