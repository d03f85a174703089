//! Test harness for isolated end-to-end runs.
//!
//! The `TestHarness` owns a temporary directory holding the upload and
//! output folders plus a file-backed job database, and wires intake, runner
//! and poller against a `ScriptedService`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use slide_explainer::explainer::ExplanationRequester;
use slide_explainer::intake::{Intake, StatusReport, SubmitReceipt, UploadRequest};
use slide_explainer::jobs::JobStore;
use slide_explainer::pipeline::{BatchScheduler, JobRunner};
use slide_explainer::processor::PptxExtractor;
use slide_explainer::storage::BlobLayout;
use slide_explainer::worker::Poller;
use slide_explainer::Database;

use super::builders::ScriptedService;

pub struct TestHarness {
    temp_dir: TempDir,
    pub blobs: BlobLayout,
    pub store: JobStore,
    pub intake: Intake,
    pub service: Arc<ScriptedService>,
    pub shutdown: Arc<AtomicBool>,
}

impl TestHarness {
    /// Harness with an instant, always-successful service.
    pub fn new() -> Self {
        Self::with_service(ScriptedService::new())
    }

    pub fn with_service(service: ScriptedService) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let blobs = BlobLayout::new(base.join("uploads"), base.join("outputs"));
        blobs.ensure_dirs().expect("Failed to create blob directories");

        let db = Database::open(&base.join("explainer.db")).expect("Failed to open database");
        let store = JobStore::new(db);
        let intake = Intake::new(store.clone(), blobs.clone());

        Self {
            temp_dir,
            blobs,
            store,
            intake,
            service: Arc::new(service),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Scheduler with no pause between batches.
    pub fn scheduler(&self) -> BatchScheduler {
        BatchScheduler::new(ExplanationRequester::new(self.service.clone()))
            .with_inter_batch_delay(Duration::ZERO)
    }

    pub fn runner(&self) -> JobRunner {
        JobRunner::new(
            self.store.clone(),
            self.blobs.clone(),
            Arc::new(PptxExtractor::new()),
            self.scheduler(),
        )
    }

    pub fn poller(&self) -> Poller {
        Poller::new(
            self.runner(),
            Duration::from_millis(20),
            Arc::clone(&self.shutdown),
        )
    }

    /// Submit a deck with default level and language.
    pub fn submit(&self, filename: &str, deck: Vec<u8>) -> SubmitReceipt {
        self.intake
            .submit(UploadRequest {
                filename: filename.to_string(),
                content: deck,
                summary_level: None,
                language: None,
                email: None,
            })
            .expect("Submission failed")
    }

    pub fn status(&self, uid: &str) -> StatusReport {
        self.intake.status(uid).expect("Status query failed")
    }

    /// Write a file outside the managed folders.
    pub fn write_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.temp_path().join(name);
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }
}
