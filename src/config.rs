//! Run-wide configuration, loaded once per invocation from a TOML file.
//!
//! This is deliberately narrower than a full Kyuafile: it carries only the
//! runner's own defaults (timeout, where results are kept, how much output
//! to retain). Test-program discovery is the loader's concern, not this
//! module's.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    #[serde(default = "default_result_dir")]
    pub result_dir: PathBuf,

    /// Whether to keep a test case's control directory when it does not
    /// pass (the runner's debug-retention flag).
    #[serde(default = "default_save_results_on_failure")]
    pub save_results_on_failure: bool,

    #[serde(default = "default_max_captured_bytes")]
    pub max_captured_bytes: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            result_dir: default_result_dir(),
            save_results_on_failure: default_save_results_on_failure(),
            max_captured_bytes: default_max_captured_bytes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_result_dir() -> PathBuf {
    PathBuf::from("test-results")
}

fn default_save_results_on_failure() -> bool {
    true
}

fn default_max_captured_bytes() -> usize {
    1_048_576
}

/// Loads configuration from a TOML file at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    load_config_str(&content)
}

/// Loads configuration from an in-memory TOML string. Used by tests and by
/// [`load_config`].
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_uses_defaults() {
        let config = load_config_str("").unwrap();
        assert_eq!(config.run.default_timeout_secs, 300);
        assert!(config.run.save_results_on_failure);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load_config_str(
            r#"
            [run]
            default_timeout_secs = 60
            result_dir = "out"
            save_results_on_failure = false
            "#,
        )
        .unwrap();
        assert_eq!(config.run.default_timeout_secs, 60);
        assert_eq!(config.run.result_dir, PathBuf::from("out"));
        assert!(!config.run.save_results_on_failure);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(load_config_str("not valid toml =").is_err());
    }
}
