//! Hub configuration loading.

use std::fs;
use std::path::{Path, PathBuf};

use llmswitch_types::{ConfigError, HubConfig};
use validator::Validate;

/// Environment variable naming the default config file.
pub const CONFIG_ENV_VAR: &str = "LLMSWITCH_CONFIG";

/// Load and validate a JSON config file.
pub fn load_config(path: &Path) -> Result<HubConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.display().to_string() });
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::from_io_error(&e))?;
    let config: HubConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;

    validate_config(&config)?;

    tracing::info!("[Config] Loaded hub config from {}", path.display());
    Ok(config)
}

/// Run the `validator` rules, naming the first offending field.
pub fn validate_config(config: &HubConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|e| ConfigError::ValidationError {
        field: e.errors().keys().next().map(|k| k.to_string()).unwrap_or_default(),
        message: e.to_string(),
    })
}

/// Load a config file, using defaults when it does not exist.
///
/// Parse and validation failures are still returned.
pub fn load_config_or_default(path: &Path) -> Result<HubConfig, ConfigError> {
    match load_config(path) {
        Err(ConfigError::NotFound { path }) => {
            tracing::debug!("[Config] {} not found, using defaults", path);
            Ok(HubConfig::default())
        }
        other => other,
    }
}

/// Path from [`CONFIG_ENV_VAR`], if set.
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"signature_cache": {{"ttl_secs": 60, "capacity": 8}}, "tools": {{"harvest_text_tool_calls": false}}}}"#
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.signature_cache.ttl_secs, 60);
        assert_eq!(cfg.signature_cache.capacity, 8);
        assert_eq!(cfg.signature_cache.min_signature_length, 50);
        assert!(!cfg.tools.harvest_text_tool_calls);
        assert!(cfg.tools.strip_thinking_tags);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        assert!(matches!(load_config(&path), Err(ConfigError::NotFound { .. })));
        assert_eq!(load_config_or_default(&path).unwrap(), HubConfig::default());
    }

    #[test]
    fn test_parse_and_validation_errors() {
        let mut bad_json = tempfile::NamedTempFile::new().unwrap();
        write!(bad_json, "{{not json").unwrap();
        assert!(matches!(load_config_or_default(bad_json.path()), Err(ConfigError::ParseError { .. })));

        let mut invalid = tempfile::NamedTempFile::new().unwrap();
        write!(invalid, r#"{{"signature_cache": {{"capacity": 0}}}}"#).unwrap();
        match load_config(invalid.path()) {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "signature_cache"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
