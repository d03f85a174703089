pub mod pptx;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

pub use pptx::PptxExtractor;

/// Extracted text of one slide, tagged with its 1-based position in the deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRecord {
    pub slide_number: u32,
    pub text: String,
}

impl SlideRecord {
    pub fn new(slide_number: u32, text: impl Into<String>) -> Self {
        Self {
            slide_number,
            text: text.into(),
        }
    }
}

/// Turns a deck on disk into its ordered, non-empty slide records.
pub trait DeckExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<SlideRecord>, ExtractError>;
}

/// Collapses every whitespace run (newlines included) into a single space
/// and trims both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
