use std::fs;
use std::path::PathBuf;

use cadence::config::Config;

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load(&dir.path().join("config.toml")).expect("load");

    assert!(config.data.dir.is_none());
    assert!(config.remote.path.is_none());
    assert!(config.remote.user_id.is_none());
    assert_eq!(config.dashboard.upcoming_limit, 3);
    assert_eq!(config.dashboard.focus_minutes, 0);
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    let toml = r#"
[data]
dir = "/tmp/cadence-data"

[remote]
path = "/tmp/cadence-remote"
user_id = "alice"

[dashboard]
upcoming_limit = 5
focus_minutes = 95
"#;
    fs::write(&path, toml)?;

    let config = Config::load(&path)?;
    assert_eq!(config.data.resolved_dir(), PathBuf::from("/tmp/cadence-data"));
    assert_eq!(config.remote.path, Some(PathBuf::from("/tmp/cadence-remote")));
    assert_eq!(config.remote.user_id.as_deref(), Some("alice"));
    assert_eq!(config.dashboard.upcoming_limit, 5);
    assert_eq!(config.dashboard.focus_minutes, 95);
    Ok(())
}

#[test]
fn config_load_rejects_invalid_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "this = [not valid").expect("write config");

    assert!(Config::load(&path).is_err());
    assert_eq!(Config::load_or_default(&path).dashboard.upcoming_limit, 3);
}

#[test]
fn config_rejects_zero_upcoming_limit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[dashboard]\nupcoming_limit = 0\n").expect("write config");

    assert!(Config::load(&path).is_err());
}
