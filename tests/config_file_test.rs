//! Integration tests for file-based configuration.

mod common;

use std::fs;
use std::time::Duration;

use common::SecretsDir;
use credwatch::config::{AppConfig, WatchMode};
use credwatch::error::ErrorCategory;
use credwatch::store::CredentialStore;

#[test]
fn test_config_file_builds_working_stores() {
    let db = SecretsDir::new();
    db.write("MYSQL_HOSTNAME", "db.internal");
    let tokens = SecretsDir::new();
    tokens.write("API_TOKEN", "tok");

    let config_dir = SecretsDir::new();
    let config_path = config_dir.path().join("credwatch.json");
    let json = serde_json::json!({
        "domains": [
            {
                "name": "database",
                "directories": [db.path()],
                "expected_keys": ["MYSQL_HOSTNAME", "MYSQL_PORT"],
                "debounce_ms": 500
            },
            {
                "name": "tokens",
                "directories": [tokens.path()],
                "poll_interval_secs": 15
            }
        ]
    });
    fs::write(&config_path, json.to_string()).unwrap();

    let config = AppConfig::load_file(&config_path).unwrap();
    assert_eq!(config.domains.len(), 2);

    let database = config.domain("database").unwrap();
    assert_eq!(database.watch.debounce, Duration::from_millis(500));
    let store = CredentialStore::from_config(database);
    store.load();
    assert_eq!(store.validate(), vec!["MYSQL_PORT".to_string()]);

    let token_domain = config.domain("tokens").unwrap();
    assert_eq!(
        token_domain.watch.mode,
        WatchMode::Poll {
            interval: Duration::from_secs(15)
        }
    );
    let store = CredentialStore::from_config(token_domain);
    store.load();
    assert_eq!(store.get("API_TOKEN").as_deref(), Some("tok"));
}

#[test]
fn test_missing_config_file_is_configuration_error() {
    let dir = SecretsDir::new();
    let err = AppConfig::load_file(dir.path().join("absent.json")).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(err.error_code(), "E_CONFIG_READ");
}
