//! # LaserDeck
//!
//! Operator client for networked laser exposure controllers. The controller
//! runs a small web server; LaserDeck keeps a live mirror of its state,
//! sends operator commands and uploads job files.
//!
//! ## Architecture
//!
//! LaserDeck is organized as a workspace with multiple crates:
//!
//! 1. **laserdeck-core** - Machine state model, state store, errors, event bus
//! 2. **laserdeck-settings** - Client configuration (JSON or TOML)
//! 3. **laserdeck-communication** - State stream, command dispatch, job upload
//! 4. **laserdeck** - Session wiring and the terminal front end

pub mod app;
pub mod console;

pub use app::Session;

pub use laserdeck_core::{
    AppEvent, CommandError, ConnectionError, Error, EventBus, MachineState, Notice, NoticeLevel,
    PageAction, PayloadError, Result, StateUpdate, UiStateStore, UploadError,
};

pub use laserdeck_communication::{
    Command, CommandDispatcher, ConnectionState, ControlPanel, Dispatch, HttpTransport,
    StateChannel, UiEvent, UploadManager, UploadSource, UploadState,
};

pub use laserdeck_settings::ClientSettings;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support (warnings and up by default)
/// - Output to `log_file` when given, otherwise to stderr so it does not
///   interleave with the console on stdout
pub fn init_logging(log_file: Option<&std::path::Path>) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(path) = log_file {
        use std::fs::OpenOptions;

        // Try to open log file, but if it fails, just disable logging rather than crash
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_line_number(true);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .try_init()?;
            }
            Err(_) => {
                tracing_subscriber::registry().with(env_filter).try_init()?;
            }
        }
        return Ok(());
    }

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
