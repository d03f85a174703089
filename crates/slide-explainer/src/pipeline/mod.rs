pub mod batch;
pub mod error;
pub mod runner;

pub use batch::{
    BatchRun, BatchScheduler, SlideExplanation, SlideOutcome, DEFAULT_BATCH_SIZE,
    DEFAULT_INTER_BATCH_DELAY,
};
pub use error::PipelineError;
pub use runner::{explain_file, extract_slides, JobOutcome, JobRunner};
