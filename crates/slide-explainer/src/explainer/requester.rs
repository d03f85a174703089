//! Turns one slide's text into an explanation outcome.
//!
//! The requester never returns an error: timeouts and service failures are
//! folded into [`ExplanationOutcome::Failed`] and only rendered to text when
//! the result is persisted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::client::GenerationService;
use super::prompt::{build_prompt, DetailLevel, Language};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a slide could not be explained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    TimedOut,
    Service(String),
    /// The per-slide task itself panicked or was cancelled.
    Task(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplanationOutcome {
    Explained(String),
    Failed(FailureReason),
}

impl ExplanationOutcome {
    pub fn is_explained(&self) -> bool {
        matches!(self, ExplanationOutcome::Explained(_))
    }

    /// Text stored in the explanation result for `slide_number`.
    pub fn render(&self, slide_number: u32) -> String {
        match self {
            ExplanationOutcome::Explained(text) => text.clone(),
            ExplanationOutcome::Failed(FailureReason::TimedOut) => {
                "Error: Gemini API request timed out.".to_string()
            }
            ExplanationOutcome::Failed(FailureReason::Service(desc)) => {
                format!("Error explaining this slide: {}", desc)
            }
            ExplanationOutcome::Failed(FailureReason::Task(desc)) => {
                format!("Error processing slide {}: {}", slide_number, desc)
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TimedOut => f.write_str("timed out"),
            FailureReason::Service(desc) => write!(f, "service error: {}", desc),
            FailureReason::Task(desc) => write!(f, "task error: {}", desc),
        }
    }
}

/// Issues one generation call per slide with a bounded wait.
#[derive(Clone)]
pub struct ExplanationRequester {
    service: Arc<dyn GenerationService>,
    timeout: Duration,
}

impl ExplanationRequester {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self::with_timeout(service, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(service: Arc<dyn GenerationService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn explain(
        &self,
        slide_text: &str,
        level: DetailLevel,
        language: Language,
    ) -> ExplanationOutcome {
        self.explain_with_timeout(slide_text, level, language, self.timeout)
            .await
    }

    /// Same as [`explain`](Self::explain) but takes raw stored values;
    /// unrecognized ones fall back to `comprehensive` and `en`.
    pub async fn explain_raw(
        &self,
        slide_text: &str,
        level: &str,
        language: &str,
    ) -> ExplanationOutcome {
        self.explain(
            slide_text,
            DetailLevel::parse_or_default(level),
            Language::parse_or_default(language),
        )
        .await
    }

    pub async fn explain_with_timeout(
        &self,
        slide_text: &str,
        level: DetailLevel,
        language: Language,
        timeout: Duration,
    ) -> ExplanationOutcome {
        let prompt = build_prompt(slide_text, level, language);

        match tokio::time::timeout(timeout, self.service.generate(&prompt)).await {
            Ok(Ok(text)) => ExplanationOutcome::Explained(text),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Generation request failed");
                ExplanationOutcome::Failed(FailureReason::Service(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Generation request timed out");
                ExplanationOutcome::Failed(FailureReason::TimedOut)
            }
        }
    }
}
