//! Bounded-concurrency fan-out of explanation requests.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::explainer::{
    DetailLevel, ExplanationOutcome, ExplanationRequester, FailureReason, Language,
};
use crate::processor::SlideRecord;

pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_INTER_BATCH_DELAY: Duration = Duration::from_secs(3);

/// One entry of a persisted explanation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideExplanation {
    pub slide_number: u32,
    pub explanation: String,
}

impl SlideExplanation {
    pub fn new(slide_number: u32, explanation: impl Into<String>) -> Self {
        Self {
            slide_number,
            explanation: explanation.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideOutcome {
    pub slide_number: u32,
    pub outcome: ExplanationOutcome,
}

/// What a scheduler run produced and how it was paced.
#[derive(Debug, Clone, Default)]
pub struct BatchRun {
    /// One per input slide, ascending by slide number.
    pub outcomes: Vec<SlideOutcome>,
    pub batch_sizes: Vec<usize>,
    pub delays: usize,
}

impl BatchRun {
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.outcome.is_explained())
            .count()
    }

    /// Renders every outcome to the stored text form.
    pub fn explanations(&self) -> Vec<SlideExplanation> {
        self.outcomes
            .iter()
            .map(|o| SlideExplanation::new(o.slide_number, o.outcome.render(o.slide_number)))
            .collect()
    }
}

/// Splits slides into consecutive batches, runs each batch concurrently and
/// waits for all of it before pausing and starting the next.
#[derive(Clone)]
pub struct BatchScheduler {
    requester: ExplanationRequester,
    batch_size: usize,
    inter_batch_delay: Duration,
}

impl BatchScheduler {
    pub fn new(requester: ExplanationRequester) -> Self {
        Self {
            requester,
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay: DEFAULT_INTER_BATCH_DELAY,
        }
    }

    /// A zero batch size is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn run(
        &self,
        slides: &[SlideRecord],
        level: DetailLevel,
        language: Language,
    ) -> BatchRun {
        let mut run = BatchRun::default();
        let total_batches = slides.len().div_ceil(self.batch_size);

        for (index, batch) in slides.chunks(self.batch_size).enumerate() {
            debug!(
                batch = index + 1,
                total_batches,
                size = batch.len(),
                "Starting batch"
            );

            let handles: Vec<_> = batch
                .iter()
                .map(|slide| {
                    let requester = self.requester.clone();
                    let text = slide.text.clone();
                    let handle = tokio::spawn(async move {
                        requester.explain(&text, level, language).await
                    });
                    (slide.slide_number, handle)
                })
                .collect();

            // Barrier: every request of this batch settles before moving on.
            for (slide_number, handle) in handles {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(slide_number, error = %e, "Slide task failed");
                        ExplanationOutcome::Failed(FailureReason::Task(e.to_string()))
                    }
                };
                run.outcomes.push(SlideOutcome {
                    slide_number,
                    outcome,
                });
            }
            run.batch_sizes.push(batch.len());

            if index + 1 < total_batches {
                info!(
                    delay_secs = self.inter_batch_delay.as_secs_f64(),
                    "Waiting before next batch"
                );
                tokio::time::sleep(self.inter_batch_delay).await;
                run.delays += 1;
            }
        }

        run.outcomes.sort_by_key(|o| o.slide_number);
        run
    }
}
