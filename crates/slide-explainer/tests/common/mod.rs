//! Shared test utilities for slide-explainer integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with temp upload/output directories
//! - `DeckBuilder` for creating `.pptx` archives in memory
//! - `ScriptedService`, a stand-in for the Gemini endpoint

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
