//! Explanation requests against a generative-language service.

pub mod client;
pub mod prompt;
pub mod requester;

pub use client::{GeminiClient, GenerationService, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use prompt::{build_prompt, DetailLevel, Language};
pub use requester::{
    ExplanationOutcome, ExplanationRequester, FailureReason, DEFAULT_REQUEST_TIMEOUT,
};
