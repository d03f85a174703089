use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job store error: {0}")]
    Store(#[from] crate::jobs::StoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Explainer error: {0}")]
    Explainer(#[from] ExplainerError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Intake error: {0}")]
    Intake(#[from] crate::intake::IntakeError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value for environment variable '{name}': {value}")]
    InvalidEnv { name: String, value: String },
}

/// Raised when a file is not a well-formed slide deck.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a valid PPTX archive: {0}")]
    Archive(String),

    #[error("Missing part '{0}' in presentation")]
    MissingPart(String),

    #[error("XML parsing error in '{part}': {reason}")]
    Xml { part: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize explanations: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures talking to the generation service. These never leave the
/// requester; they are folded into an explanation outcome.
#[derive(Error, Debug)]
pub enum ExplainerError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response contained no text (finish reason: {reason})")]
    EmptyResponse { reason: String },

    #[error("Prompt was blocked: {0}")]
    Blocked(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
