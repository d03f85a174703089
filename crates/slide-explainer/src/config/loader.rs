use std::path::{Path, PathBuf};

use crate::config::schema::AppConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Largest accepted duration setting, one day.
const MAX_DURATION_SECS: f64 = 86_400.0;

/// Environment variables that override path and model settings.
pub const ENV_UPLOADS_DIR: &str = "UPLOADS_DIR";
pub const ENV_OUTPUTS_DIR: &str = "OUTPUTS_DIR";
pub const ENV_DATABASE_PATH: &str = "DATABASE_PATH";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Parses and validates a config document, then applies environment
/// overrides.
pub fn load_config_from_str(content: &str) -> Result<AppConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let mut config: AppConfig = serde_json::from_value(json_value)?;
    apply_env_overrides(&mut config)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads `path` when given, otherwise starts from defaults. Environment
/// overrides apply either way.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = AppConfig::default();
            apply_env_overrides(&mut config)?;
            validate_config(&config)?;
            Ok(config)
        }
    }
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn env_value(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(raw)) => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: raw.to_string_lossy().into_owned(),
        }),
    }
}

pub fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = env_value(ENV_UPLOADS_DIR)? {
        config.storage.uploads_dir = PathBuf::from(dir);
    }
    if let Some(dir) = env_value(ENV_OUTPUTS_DIR)? {
        config.storage.outputs_dir = PathBuf::from(dir);
    }
    if let Some(path) = env_value(ENV_DATABASE_PATH)? {
        config.storage.database_path = PathBuf::from(path);
    }
    if let Some(model) = env_value(ENV_GEMINI_MODEL)? {
        config.gemini.model = model;
    }
    Ok(())
}

fn validate_duration(name: &str, secs: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let in_range = secs.is_finite()
        && secs <= MAX_DURATION_SECS
        && if allow_zero { secs >= 0.0 } else { secs > 0.0 };
    if !in_range {
        return Err(ConfigError::Validation {
            message: format!(
                "{} must be {} and at most {} seconds, got {}",
                name,
                if allow_zero { "non-negative" } else { "positive" },
                MAX_DURATION_SECS,
                secs
            ),
        });
    }
    Ok(())
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.processing.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "processing.batch_size must be at least 1".to_string(),
        });
    }

    validate_duration(
        "processing.inter_batch_delay_secs",
        config.processing.inter_batch_delay_secs,
        true,
    )?;
    validate_duration(
        "processing.request_timeout_secs",
        config.processing.request_timeout_secs,
        false,
    )?;
    validate_duration(
        "processing.poll_interval_secs",
        config.processing.poll_interval_secs,
        false,
    )?;

    if config.gemini.model.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "gemini.model must not be empty".to_string(),
        });
    }

    let storage = &config.storage;
    for (name, path) in [
        ("storage.uploads_dir", &storage.uploads_dir),
        ("storage.outputs_dir", &storage.outputs_dir),
        ("storage.database_path", &storage.database_path),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{} must not be empty", name),
            });
        }
    }
    if storage.uploads_dir == storage.outputs_dir {
        return Err(ConfigError::Validation {
            message: "storage.uploads_dir and storage.outputs_dir must differ".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    fn clear_env() {
        for name in [
            ENV_UPLOADS_DIR,
            ENV_OUTPUTS_DIR,
            ENV_DATABASE_PATH,
            ENV_GEMINI_MODEL,
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_load_minimal_config_uses_defaults() {
        clear_env();
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.processing.batch_size, 3);
        assert_eq!(config.processing.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    #[serial]
    fn test_load_full_config() {
        clear_env();
        let config_json = r#"
        {
            "version": "1.0",
            "storage": {
                "uploads_dir": "/srv/uploads",
                "outputs_dir": "/srv/outputs",
                "database_path": "/srv/jobs.db"
            },
            "gemini": {
                "api_key_file": "/run/secrets/gemini",
                "model": "gemini-1.5-flash"
            },
            "processing": {
                "batch_size": 5,
                "inter_batch_delay_secs": 0.5,
                "request_timeout_secs": 12,
                "poll_interval_secs": 2
            }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.storage.uploads_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.gemini.api_key_file.as_deref(), Some("/run/secrets/gemini"));
        assert_eq!(config.processing.batch_size, 5);
        assert_eq!(config.processing.inter_batch_delay(), Duration::from_millis(500));
        assert_eq!(config.processing.request_timeout(), Duration::from_secs(12));
    }

    #[test]
    #[serial]
    fn test_schema_rejects_unknown_fields_and_bad_values() {
        clear_env();
        let unknown = load_config_from_str(r#"{ "version": "1.0", "workers": 4 }"#);
        assert!(matches!(unknown, Err(ConfigError::SchemaValidation { .. })));

        let zero_batch =
            load_config_from_str(r#"{ "version": "1.0", "processing": { "batch_size": 0 } }"#);
        assert!(matches!(zero_batch, Err(ConfigError::SchemaValidation { .. })));

        let bad_version = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(bad_version, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    #[serial]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    #[serial]
    fn test_semantic_validation() {
        clear_env();
        let same_dirs = load_config_from_str(
            r#"{ "version": "1.0", "storage": { "uploads_dir": "/x", "outputs_dir": "/x" } }"#,
        );
        assert!(matches!(same_dirs, Err(ConfigError::Validation { .. })));

        let huge_delay = load_config_from_str(
            r#"{ "version": "1.0", "processing": { "inter_batch_delay_secs": 1e9 } }"#,
        );
        assert!(matches!(huge_delay, Err(ConfigError::Validation { .. })));
    }

    #[test]
    #[serial]
    fn test_env_overrides_apply_to_file_and_defaults() {
        clear_env();
        std::env::set_var(ENV_UPLOADS_DIR, "/env/uploads");
        std::env::set_var(ENV_GEMINI_MODEL, "gemini-test");

        let from_file = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(from_file.storage.uploads_dir, PathBuf::from("/env/uploads"));
        assert_eq!(from_file.gemini.model, "gemini-test");

        let defaults = load_or_default(None).unwrap();
        assert_eq!(defaults.storage.uploads_dir, PathBuf::from("/env/uploads"));
        assert_eq!(defaults.storage.outputs_dir, PathBuf::from("shared/outputs"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_file() {
        let result = load_config("/nonexistent/config.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
