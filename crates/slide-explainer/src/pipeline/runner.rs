use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use crate::explainer::{DetailLevel, Language};
use crate::jobs::{Job, JobStore, StoreError};
use crate::processor::{DeckExtractor, SlideRecord};
use crate::storage::BlobLayout;

use super::batch::{BatchRun, BatchScheduler};
use super::error::PipelineError;

/// Terminal result of processing one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        slides: usize,
        failed_slides: usize,
        output_path: PathBuf,
    },
    Failed {
        message: String,
    },
}

/// Runs extraction off the async runtime.
pub async fn extract_slides(
    extractor: Arc<dyn DeckExtractor>,
    path: &Path,
) -> Result<Vec<SlideRecord>, PipelineError> {
    let path = path.to_path_buf();
    let slides = tokio::task::spawn_blocking(move || extractor.extract(&path))
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;
    Ok(slides)
}

/// Extracts a deck and explains every slide with text, without touching
/// the job store.
pub async fn explain_file(
    extractor: Arc<dyn DeckExtractor>,
    scheduler: &BatchScheduler,
    path: &Path,
    level: DetailLevel,
    language: Language,
) -> Result<BatchRun, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::SourceMissing {
            path: path.to_path_buf(),
        });
    }

    let slides = extract_slides(extractor, path).await?;
    if slides.is_empty() {
        return Err(PipelineError::NoSlides {
            filename: display_name(path),
        });
    }

    info!(slides = slides.len(), "Explaining slides");
    Ok(scheduler.run(&slides, level, language).await)
}

/// File name only, so errors never carry local directories.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Drives one job from `created` to a terminal state.
pub struct JobRunner {
    store: JobStore,
    blobs: BlobLayout,
    extractor: Arc<dyn DeckExtractor>,
    scheduler: BatchScheduler,
}

impl JobRunner {
    pub fn new(
        store: JobStore,
        blobs: BlobLayout,
        extractor: Arc<dyn DeckExtractor>,
        scheduler: BatchScheduler,
    ) -> Self {
        Self {
            store,
            blobs,
            extractor,
            scheduler,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Processes a single job.
    ///
    /// Pipeline failures end the job in `failed` and are reported as
    /// [`JobOutcome::Failed`]. Only store errors are returned as `Err`; in
    /// that case the job may still be in `created` or `processing`.
    pub async fn process(&self, job: Job) -> Result<JobOutcome, StoreError> {
        let span = info_span!("job",
            job_id = %job.id,
            filename = %job.filename,
            level = %job.detail_level,
            language = %job.language,
        );

        self.process_in_span(job).instrument(span).await
    }

    async fn process_in_span(&self, mut job: Job) -> Result<JobOutcome, StoreError> {
        self.store.mark_processing(&mut job)?;
        info!("Processing upload");

        match self.run_pipeline(&job).await {
            Ok((run, output_path)) => {
                self.store.mark_completed(&mut job)?;
                let failed_slides = run.failed_count();
                if failed_slides > 0 {
                    warn!(failed_slides, "Some slides could not be explained");
                }
                info!(slides = run.outcomes.len(), "Upload processed");
                Ok(JobOutcome::Completed {
                    slides: run.outcomes.len(),
                    failed_slides,
                    output_path,
                })
            }
            Err(e) => {
                let message = e.failure_message(&job.id);
                match &e {
                    PipelineError::NoSlides { .. } => warn!("{}", message),
                    _ => error!("{}", message),
                }
                self.store.mark_failed(&mut job, message.clone())?;
                Ok(JobOutcome::Failed { message })
            }
        }
    }

    async fn run_pipeline(&self, job: &Job) -> Result<(BatchRun, PathBuf), PipelineError> {
        let input = self.blobs.input_path(&job.id);
        if !input.exists() {
            return Err(PipelineError::SourceMissing { path: input });
        }

        let slides = extract_slides(self.extractor.clone(), &input).await?;
        if slides.is_empty() {
            return Err(PipelineError::NoSlides {
                filename: job.filename.clone(),
            });
        }

        info!(
            slides = slides.len(),
            batch_size = self.scheduler.batch_size(),
            "Found slides, requesting explanations"
        );
        let run = self
            .scheduler
            .run(&slides, job.detail_level, job.language)
            .await;

        let output_path = self.blobs.write_output(&job.id, &run.explanations())?;
        Ok((run, output_path))
    }
}
