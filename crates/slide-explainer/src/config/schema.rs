use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::explainer::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            storage: StorageConfig::default(),
            gemini: GeminiConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

/// Where uploads, outputs and the job database live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("shared/uploads")
}

fn default_outputs_dir() -> PathBuf {
    PathBuf::from("shared/outputs")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("shared/explainer.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            outputs_dir: default_outputs_dir(),
            database_path: default_database_path(),
        }
    }
}

/// Generation service settings. The key itself is resolved through
/// [`crate::secrets`]: direct value, then file, then environment variable.
#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_file", &self.api_key_file)
            .field("api_key_env", &self.api_key_env)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_inter_batch_delay_secs")]
    pub inter_batch_delay_secs: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
}

fn default_batch_size() -> usize {
    3
}

fn default_inter_batch_delay_secs() -> f64 {
    3.0
}

fn default_request_timeout_secs() -> f64 {
    30.0
}

fn default_poll_interval_secs() -> f64 {
    10.0
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_secs: default_inter_batch_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ProcessingConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_secs_f64(self.inter_batch_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }
}
