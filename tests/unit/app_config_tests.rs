/*!
 * Tests for application configuration
 */

use anyhow::Result;
use captrack::app_config::{Config, LogLevel};
use std::time::Duration;
use tempfile::TempDir;

/// Test that the defaults describe the catalog site
#[test]
fn test_default_config_shouldUseSiteDefaults() {
    let config = Config::default();
    assert_eq!(config.site.base_url, "https://www.youtube.com");
    assert_eq!(config.site.watch_path, "/watch");
    assert_eq!(config.selectors.thumbnail, "a#thumbnail");
    assert_eq!(config.timings.download_delay(), Duration::from_millis(500));
    assert_eq!(config.timings.request_timeout(), Duration::from_secs(30));
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test that a saved configuration loads back unchanged
#[test]
fn test_config_file_withSavedDefaults_shouldLoadBack() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("conf.json");

    let mut config = Config::default();
    config.timings.debounce_ms = 250;
    config.selectors.observe_targets = vec!["#primary".to_string()];
    std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;

    let loaded: Config = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(loaded.timings.debounce_ms, 250);
    assert_eq!(loaded.selectors.observe_targets, vec!["#primary".to_string()]);
    assert!(loaded.validate().is_ok());
    Ok(())
}

/// Test validation failures
#[test]
fn test_validate_withBrokenValues_shouldFail() {
    let mut config = Config::default();
    config.site.base_url = "not a url".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.selectors.observe_targets.clear();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.site.item_param = String::new();
    assert!(config.validate().is_err());
}
