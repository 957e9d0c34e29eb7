//! Client configuration for LaserDeck
//!
//! Configuration is organized into sections:
//! - Connection settings (controller address, endpoint paths, timeouts, reconnect delay)
//! - Command settings (request envelope generation)
//! - Upload settings (chunking)
//! - Session settings (timings of reboot reload and remote-shell redirect)
//!
//! Files may be JSON or TOML; every section and field is optional and falls
//! back to its default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, SettingsError, SettingsResult};

/// Key that carries the command name in a command request body
///
/// Older controller firmware reads `{"command": ...}`, newer firmware
/// `{"action": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandEnvelope {
    /// `{"command": name, ...}`
    #[default]
    Command,
    /// `{"action": name, ...}`
    Action,
}

impl CommandEnvelope {
    /// JSON key holding the command name
    pub fn key(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Action => "action",
        }
    }
}

impl std::fmt::Display for CommandEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Controller base URL, e.g. `http://192.168.4.1:5000`
    pub base_url: String,
    /// Server-sent state stream
    pub state_path: String,
    /// Generic command endpoint
    pub command_path: String,
    /// Movement endpoint
    pub move_path: String,
    /// Reboot endpoint
    pub reset_path: String,
    /// Binary upload endpoint
    pub upload_path: String,
    /// Timeout for establishing a TCP connection
    pub connect_timeout_ms: u64,
    /// Timeout for a command request (not applied to the stream or uploads)
    pub request_timeout_ms: u64,
    /// Fixed delay between state stream reconnect attempts
    pub reconnect_delay_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            state_path: "/state".to_string(),
            command_path: "/command".to_string(),
            move_path: "/move".to_string(),
            reset_path: "/reset".to_string(),
            upload_path: "/upload".to_string(),
            connect_timeout_ms: 3000,
            request_timeout_ms: 5000,
            reconnect_delay_ms: 2000,
        }
    }
}

impl ConnectionSettings {
    /// Absolute URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Host part of the base URL, without scheme or port
    pub fn host(&self) -> &str {
        let rest = self
            .base_url
            .split_once("://")
            .map_or(self.base_url.as_str(), |(_, rest)| rest);
        let authority = rest.split('/').next().unwrap_or(rest);
        let authority = authority.rsplit('@').next().unwrap_or(authority);
        if let Some(bracketed) = authority.strip_prefix('[') {
            return bracketed.split(']').next().unwrap_or(bracketed);
        }
        authority.split(':').next().unwrap_or(authority)
    }

    /// Delay between reconnect attempts
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Command request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// TCP connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Command settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Request body generation
    pub envelope: CommandEnvelope,
}

/// Upload settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Bytes read from disk per body chunk
    pub chunk_size: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
        }
    }
}

/// Timings of actions that follow a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Wait before reloading after a reboot request
    pub reboot_reload_delay_ms: u64,
    /// Port the remote shell service listens on
    pub webrepl_port: u16,
    /// Wait before redirecting to the remote shell
    pub webrepl_redirect_delay_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reboot_reload_delay_ms: 10_000,
            webrepl_port: 8266,
            webrepl_redirect_delay_ms: 2000,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Command settings
    pub commands: CommandSettings,
    /// Upload settings
    pub upload: UploadSettings,
    /// Session settings
    pub session: SessionSettings,
}

impl ClientSettings {
    /// Create new settings with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings file location (`<config dir>/laserdeck/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("laserdeck").join("config.toml"))
            .ok_or_else(|| ConfigError::NoConfigDirectory.into())
    }

    /// Load settings from `path`, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load settings from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let settings: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content).map_err(|e| {
            SettingsError::SaveError(format!("{}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> SettingsResult<()> {
        let connection = &self.connection;

        if !(connection.base_url.starts_with("http://")
            || connection.base_url.starts_with("https://"))
        {
            return Err(SettingsError::invalid(
                "connection.base_url",
                "must start with http:// or https://",
            ));
        }

        if connection.host().is_empty() {
            return Err(SettingsError::invalid(
                "connection.base_url",
                "has no host",
            ));
        }

        for (key, path) in [
            ("connection.state_path", &connection.state_path),
            ("connection.command_path", &connection.command_path),
            ("connection.move_path", &connection.move_path),
            ("connection.reset_path", &connection.reset_path),
            ("connection.upload_path", &connection.upload_path),
        ] {
            if !path.starts_with('/') {
                return Err(SettingsError::invalid(key, "must start with '/'"));
            }
        }

        if connection.request_timeout_ms == 0 || connection.connect_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.request_timeout_ms",
                "timeouts must be > 0",
            ));
        }

        if connection.reconnect_delay_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.reconnect_delay_ms",
                "must be > 0",
            ));
        }

        if self.upload.chunk_size == 0 {
            return Err(SettingsError::invalid("upload.chunk_size", "must be > 0"));
        }

        if self.session.webrepl_port == 0 {
            return Err(SettingsError::invalid("session.webrepl_port", "must be > 0"));
        }

        Ok(())
    }

    /// Address of the remote shell service on the controller
    pub fn webrepl_url(&self) -> String {
        let host = self.connection.host();
        if host.contains(':') {
            format!("http://[{}]:{}", host, self.session.webrepl_port)
        } else {
            format!("http://{}:{}", host, self.session.webrepl_port)
        }
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("none").to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ClientSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.connection.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(settings.commands.envelope.key(), "command");
    }

    #[test]
    fn test_url_joining() {
        let mut connection = ConnectionSettings::default();
        connection.base_url = "http://10.0.0.7:5000/".to_string();
        assert_eq!(connection.url("/state"), "http://10.0.0.7:5000/state");
        assert_eq!(connection.url("upload"), "http://10.0.0.7:5000/upload");
    }

    #[test]
    fn test_host_extraction() {
        let mut connection = ConnectionSettings::default();
        connection.base_url = "http://10.0.0.7:5000/".to_string();
        assert_eq!(connection.host(), "10.0.0.7");
        connection.base_url = "https://laser.local".to_string();
        assert_eq!(connection.host(), "laser.local");
        connection.base_url = "http://[fe80::1]:5000".to_string();
        assert_eq!(connection.host(), "fe80::1");
    }

    #[test]
    fn test_webrepl_url() {
        let mut settings = ClientSettings::default();
        settings.connection.base_url = "http://192.168.4.1:5000".to_string();
        assert_eq!(settings.webrepl_url(), "http://192.168.4.1:8266");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = ClientSettings::default();
        settings.connection.base_url = "ftp://x".to_string();
        assert!(settings.validate().is_err());

        let mut settings = ClientSettings::default();
        settings.connection.state_path = "state".to_string();
        assert!(settings.validate().is_err());

        let mut settings = ClientSettings::default();
        settings.connection.reconnect_delay_ms = 0;
        assert!(settings.validate().is_err());

        let mut settings = ClientSettings::default();
        settings.upload.chunk_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: ClientSettings = toml::from_str(
            r#"
            [connection]
            base_url = "http://192.168.4.1"

            [commands]
            envelope = "action"
            "#,
        )
        .unwrap();
        assert_eq!(settings.connection.base_url, "http://192.168.4.1");
        assert_eq!(settings.connection.state_path, "/state");
        assert_eq!(settings.commands.envelope, CommandEnvelope::Action);
        assert_eq!(settings.session.webrepl_port, 8266);
    }
}
