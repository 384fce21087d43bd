// Driver and event loop
mod app;

// Frame composition: redraw policy, clipping, layers, window chrome
pub mod compositor;

pub mod config;
pub mod error;
pub mod geometry;

// Kitty and Sixel image passthrough
pub mod graphics;

// PTY terminal module
pub mod pty;

// Window list sidebar
pub mod sidebar;

// State management module
pub mod state;

// Terminal content and escape scanning
pub mod term;

pub mod theme;

use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Mutex;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub use app::App;
use config::Config;
use error::AppError;

/// Send tracing output to `tileos.log`; stdout belongs to the UI
fn init_logging() -> Result<(), AppError> {
    let dir = std::env::var_os("TILEOS_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    let path = dir.join("tileos.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| AppError::Log { path, source })?;

    let filter = EnvFilter::try_from_env("TILEOS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber installed by an embedding program wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init();
    Ok(())
}

/// Puts the host terminal back however the loop ends
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen) {
            warn!("failed to leave alternate screen: {e}");
        }
        if let Err(e) = disable_raw_mode() {
            warn!("failed to disable raw mode: {e}");
        }
    }
}

pub fn run() -> Result<(), AppError> {
    init_logging()?;
    info!("starting tileos");

    let config_path = std::env::var_os("TILEOS_CONFIG").map(PathBuf::from);
    let config = Config::load_or_default(config_path.as_deref());

    let _guard = TerminalGuard::enter()?;
    let mut terminal: Terminal<CrosstermBackend<Stdout>> =
        Terminal::new(CrosstermBackend::new(io::stdout()))?;
    terminal.clear()?;

    let (width, height) = app::screen_size();
    let mut app = App::new(config, width, height);
    let result = app.run(&mut terminal);
    if let Err(e) = &result {
        warn!("event loop failed: {e}");
        app.ptys.close_all();
    }
    result
}
