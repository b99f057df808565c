use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use nymval::auth::StaticIdentity;
use nymval::config::{GenerationConfig, ProviderConfig};
use nymval::providers::OpenRouterProvider;
use nymval::storage::SqliteStorage;

#[allow(dead_code)]
pub const TEST_API_KEY: &str = "test-key";

#[allow(dead_code)]
pub fn create_temp_storage(user: &str) -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("history.db");
    let storage = SqliteStorage::new_with_path(db_path, Arc::new(StaticIdentity::new(user)))
        .expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Provider config pointing at a mock server's `/chat/completions`
#[allow(dead_code)]
pub fn mock_provider_config(server_uri: &str) -> ProviderConfig {
    ProviderConfig {
        base_url: format!("{}/chat/completions", server_uri),
        api_key: Some(TEST_API_KEY.to_string()),
        timeout_seconds: 5,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn mock_provider(server_uri: &str) -> OpenRouterProvider {
    OpenRouterProvider::new(
        mock_provider_config(server_uri),
        GenerationConfig::default(),
        TEST_API_KEY.to_string(),
    )
    .expect("failed to create provider")
}
