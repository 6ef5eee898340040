//! Layered configuration: defaults, YAML file, then environment.

use nbsweep_runner::config::{ConfigError, HarnessConfig};
use nbsweep_types::SyncFailurePolicy;
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "NBSWEEP_WORKSPACE",
    "NBSWEEP_CATALOG_URL",
    "NBSWEEP_CATALOG_FALLBACK",
    "NBSWEEP_FORGE_API_ROOT",
    "GITHUB_TOKEN",
    "NBSWEEP_EXECUTION_TIMEOUT_SECS",
    "NBSWEEP_ON_SYNC_FAILURE",
    "NBSWEEP_ENGINE_COMMAND",
    "NBSWEEP_GIT_COMMAND",
];

fn clear_env() {
    for var in ENV_VARS {
        unsafe { std::env::remove_var(var) };
    }
}

fn write_yaml(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("nbsweep.yml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_yaml_overrides_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_yaml(
        &dir,
        "workspace: /srv/sweep\nexecution_timeout_secs: 120\nkernels: [python3, ir]\non_sync_failure: skip\n",
    );

    let config = HarnessConfig::from_yaml_file(&path).unwrap().with_env().unwrap();

    assert_eq!(config.workspace, PathBuf::from("/srv/sweep"));
    assert_eq!(config.execution_timeout_secs, 120);
    assert_eq!(config.kernels, vec!["python3", "ir"]);
    assert_eq!(config.on_sync_failure, SyncFailurePolicy::Skip);
    // Untouched keys keep their defaults.
    assert_eq!(config.document_extension, ".ipynb");
    assert_eq!(config.engine_command, "papermill");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_env_overrides_yaml() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_yaml(&dir, "execution_timeout_secs: 120\non_sync_failure: skip\n");
    unsafe {
        std::env::set_var("NBSWEEP_EXECUTION_TIMEOUT_SECS", "60");
        std::env::set_var("NBSWEEP_ON_SYNC_FAILURE", "ABORT");
        std::env::set_var("GITHUB_TOKEN", "ghp_test");
    }

    let config = HarnessConfig::from_yaml_file(&path).unwrap().with_env().unwrap();
    clear_env();

    assert_eq!(config.execution_timeout_secs, 60);
    assert_eq!(config.on_sync_failure, SyncFailurePolicy::Abort);
    assert_eq!(config.forge_token.as_deref(), Some("ghp_test"));
}

#[test]
#[serial]
fn test_invalid_env_values_are_rejected() {
    clear_env();
    unsafe { std::env::set_var("NBSWEEP_ON_SYNC_FAILURE", "retry") };
    let err = HarnessConfig::from_env().unwrap_err();
    clear_env();
    assert!(matches!(err, ConfigError::Invalid { .. }));

    unsafe { std::env::set_var("NBSWEEP_EXECUTION_TIMEOUT_SECS", "soon") };
    let err = HarnessConfig::from_env().unwrap_err();
    clear_env();
    assert!(err.to_string().contains("NBSWEEP_EXECUTION_TIMEOUT_SECS"));
}

#[test]
#[serial]
fn test_token_is_never_serialized() {
    clear_env();
    let config = HarnessConfig {
        forge_token: Some("ghp_secret".to_string()),
        ..Default::default()
    };
    let yaml = serde_yaml::to_string(&config).unwrap();
    assert!(!yaml.contains("ghp_secret"));
}

#[test]
fn test_missing_and_malformed_files() {
    let dir = TempDir::new().unwrap();
    let missing = HarnessConfig::from_yaml_file(&dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Read { .. }));

    let path = write_yaml(&dir, "execution_timeout_secs: [not, a, number]\n");
    let malformed = HarnessConfig::from_yaml_file(&path).unwrap_err();
    assert!(matches!(malformed, ConfigError::Parse { .. }));
}
