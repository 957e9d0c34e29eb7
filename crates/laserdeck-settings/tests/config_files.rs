use laserdeck_settings::{ClientSettings, CommandEnvelope, SettingsError};
use tempfile::TempDir;

#[test]
fn test_save_and_load_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut settings = ClientSettings::default();
    settings.connection.base_url = "http://192.168.4.1:5000".to_string();
    settings.commands.envelope = CommandEnvelope::Action;
    settings.save_to_file(&path).unwrap();

    let loaded = ClientSettings::load_from_file(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_save_and_load_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut settings = ClientSettings::default();
    settings.connection.reconnect_delay_ms = 500;
    settings.save_to_file(&path).unwrap();

    let loaded = ClientSettings::load_from_file(&path).unwrap();
    assert_eq!(loaded.connection.reconnect_delay_ms, 500);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    let err = ClientSettings::default().save_to_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Config(_)));
}

#[test]
fn test_invalid_file_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"upload":{"chunk_size":0}}"#).unwrap();

    let err = ClientSettings::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidSetting { .. }));
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = ClientSettings::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings, ClientSettings::default());
}
