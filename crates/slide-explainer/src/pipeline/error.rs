use std::path::PathBuf;

use thiserror::Error;

/// Reasons a job ends in `failed`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Upload file not found: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("No slides with text in {filename}")]
    NoSlides { filename: String },

    #[error("{0}")]
    Extract(#[from] crate::error::ExtractError),

    #[error("{0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Message stored on the failed job.
    ///
    /// Missing sources and empty decks carry their own wording; everything
    /// else is wrapped with the job id.
    pub fn failure_message(&self, job_id: &str) -> String {
        match self {
            PipelineError::SourceMissing { .. } | PipelineError::NoSlides { .. } => self.to_string(),
            other => format!("Error processing upload {}: {}", job_id, other),
        }
    }
}
