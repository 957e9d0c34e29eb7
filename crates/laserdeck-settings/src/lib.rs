//! LaserDeck Settings Crate
//!
//! Handles client configuration: where the controller lives, which endpoint
//! generation it speaks, and the timings of reconnects and follow-up actions.

pub mod config;
pub mod error;

pub use config::{
    ClientSettings, CommandEnvelope, CommandSettings, ConnectionSettings, SessionSettings,
    UploadSettings,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
