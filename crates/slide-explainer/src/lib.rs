pub mod config;
pub mod db;
pub mod error;
pub mod explainer;
pub mod intake;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod secrets;
pub mod storage;
pub mod worker;

pub use config::{load_config, load_or_default, AppConfig};
pub use db::Database;
pub use error::{AppError, ConfigError, ExplainerError, ExtractError, Result, StorageError};
pub use explainer::{
    DetailLevel, ExplanationOutcome, ExplanationRequester, GeminiClient, GenerationService,
    Language,
};
pub use intake::{
    Intake, IntakeError, StatusReport, SubmitReceipt, UploadHistory, UploadRequest,
};
pub use jobs::{Job, JobStatus, JobStore, StoreError};
pub use pipeline::{BatchScheduler, JobOutcome, JobRunner, PipelineError, SlideExplanation};
pub use processor::{DeckExtractor, PptxExtractor, SlideRecord};
pub use secrets::{resolve_api_key, resolve_secret, KeySource, SecretError};
pub use storage::BlobLayout;
pub use worker::{PollSummary, Poller};
