//! Builders for test decks and generation services.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use zip::write::SimpleFileOptions;

use slide_explainer::error::ExplainerError;
use slide_explainer::explainer::GenerationService;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

/// Builder for in-memory PowerPoint decks.
///
/// Each slide is a list of shapes, each shape a list of paragraphs.
#[derive(Default)]
pub struct DeckBuilder {
    slides: Vec<Vec<Vec<String>>>,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slide with one text box holding the given paragraphs.
    pub fn slide(mut self, paragraphs: &[&str]) -> Self {
        self.slides
            .push(vec![paragraphs.iter().map(|p| p.to_string()).collect()]);
        self
    }

    /// Add a slide with several text boxes.
    pub fn slide_with_shapes(mut self, shapes: &[&[&str]]) -> Self {
        self.slides.push(
            shapes
                .iter()
                .map(|s| s.iter().map(|p| p.to_string()).collect())
                .collect(),
        );
        self
    }

    /// Add a slide with no text at all.
    pub fn empty_slide(mut self) -> Self {
        self.slides.push(Vec::new());
        self
    }

    /// Add `count` slides titled "Slide N".
    pub fn numbered_slides(mut self, count: usize) -> Self {
        for _ in 0..count {
            let n = self.slides.len() + 1;
            self = self.slide(&[&format!("Slide {}", n)]);
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        writer
            .start_file("[Content_Types].xml", options)
            .expect("Failed to start content types");
        writer
            .write_all(
                br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
            )
            .expect("Failed to write content types");

        let ids: String = (0..self.slides.len())
            .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 10))
            .collect();
        writer
            .start_file("ppt/presentation.xml", options)
            .expect("Failed to start presentation");
        write!(
            writer,
            "<p:presentation {}><p:sldIdLst>{}</p:sldIdLst></p:presentation>",
            NS, ids
        )
        .expect("Failed to write presentation");

        let rels: String = (0..self.slides.len())
            .map(|i| {
                format!(
                    r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
                    i + 10,
                    i + 1
                )
            })
            .collect();
        writer
            .start_file("ppt/_rels/presentation.xml.rels", options)
            .expect("Failed to start relationships");
        write!(
            writer,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            rels
        )
        .expect("Failed to write relationships");

        for (i, shapes) in self.slides.iter().enumerate() {
            writer
                .start_file(format!("ppt/slides/slide{}.xml", i + 1), options)
                .expect("Failed to start slide");
            writer
                .write_all(slide_xml(shapes).as_bytes())
                .expect("Failed to write slide");
        }

        writer
            .finish()
            .expect("Failed to finish archive")
            .into_inner()
    }
}

fn slide_xml(shapes: &[Vec<String>]) -> String {
    let body: String = shapes
        .iter()
        .enumerate()
        .map(|(i, paragraphs)| {
            let paras: String = paragraphs
                .iter()
                .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", escape(p)))
                .collect();
            format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="Box"/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>"#,
                i + 2,
                paras
            )
        })
        .collect();

    format!(
        "<p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr/><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>",
        NS, body
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Scripted generation service.
///
/// Answers `Explained: <slide text>` and tracks how many requests are in
/// flight at once. Slide text containing a configured marker fails.
pub struct ScriptedService {
    latency: Duration,
    fail_marker: Option<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            fail_marker: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock poisoned").clone()
    }
}

/// Slide text embedded in a prompt.
pub fn slide_text_of(prompt: &str) -> &str {
    prompt
        .rsplit_once("Slide content: ")
        .map(|(_, text)| text)
        .unwrap_or(prompt)
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(&self, prompt: &str) -> Result<String, ExplainerError> {
        self.prompts
            .lock()
            .expect("prompts lock poisoned")
            .push(prompt.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = slide_text_of(prompt);
        match &self.fail_marker {
            Some(marker) if text.contains(marker.as_str()) => Err(ExplainerError::Status {
                status: 500,
                body: "internal".to_string(),
            }),
            _ => Ok(format!("Explained: {}", text)),
        }
    }
}
