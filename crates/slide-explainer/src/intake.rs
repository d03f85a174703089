//! Upload and status boundary.
//!
//! `submit` validates an upload and queues it as a `created` job;
//! `status` reports a job's state and, once completed, its explanations.
//! Submitters who gave an email can also look uploads up by filename and
//! list their history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use validator::Validate;

use crate::db::{user_repo, DatabaseError};
use crate::error::StorageError;
use crate::explainer::{DetailLevel, Language};
use crate::jobs::{Job, JobStatus, JobStore, StoreError};
use crate::pipeline::SlideExplanation;
use crate::storage::BlobLayout;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<DatabaseError> for IntakeError {
    fn from(e: DatabaseError) -> Self {
        IntakeError::Store(StoreError::Database(e))
    }
}

/// An upload as received from a client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content: Vec<u8>,
    pub summary_level: Option<String>,
    pub language: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub uid: String,
    pub summary_level: DetailLevel,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub status: JobStatus,
    /// `created` and `processing` both report as pending.
    pub pending: bool,
    pub uid: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub summary_level: DetailLevel,
    pub language: Language,
    pub upload_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Vec<SlideExplanation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadHistory {
    pub email: String,
    pub uploads: Vec<JobStatusView>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    NotFound,
    Found(JobStatusView),
}

/// Queues uploads and answers status queries.
#[derive(Clone)]
pub struct Intake {
    store: JobStore,
    blobs: BlobLayout,
}

impl Intake {
    pub fn new(store: JobStore, blobs: BlobLayout) -> Self {
        Self { store, blobs }
    }

    pub fn submit(&self, request: UploadRequest) -> Result<SubmitReceipt, IntakeError> {
        let filename = validate_filename(&request.filename)?;
        let summary_level = parse_choice(
            request.summary_level.as_deref(),
            "summary_level",
            DetailLevel::parse,
            DetailLevel::default(),
        )?;
        let language = parse_choice(
            request.language.as_deref(),
            "language",
            Language::parse,
            Language::default(),
        )?;
        let email = match request.email.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(email) => Some(validate_email(email)?),
        };

        let user_id = email
            .as_deref()
            .map(|e| user_repo::find_or_create(self.store.database(), e))
            .transpose()?;

        let job = Job::new(filename, summary_level, language, user_id);
        self.blobs.store_upload(&job.id, &request.content)?;

        // The poller must never see a job whose file is not yet in place.
        if let Err(e) = self.store.insert(&job) {
            if let Err(cleanup) = self.blobs.remove_upload(&job.id) {
                log::warn!("Failed to remove upload for rejected job {}: {}", job.id, cleanup);
            }
            return Err(e.into());
        }

        log::info!(
            "Accepted upload {} ({}, level {}, language {})",
            job.id,
            job.filename,
            summary_level,
            language
        );

        Ok(SubmitReceipt {
            uid: job.id,
            summary_level,
            language,
        })
    }

    pub fn status(&self, uid: &str) -> Result<StatusReport, IntakeError> {
        let uid = uid.trim();
        if uuid::Uuid::parse_str(uid).is_err() {
            return Ok(StatusReport::NotFound);
        }

        match self.store.find_by_id(uid)? {
            Some(job) => Ok(StatusReport::Found(self.view(job, true)?)),
            None => Ok(StatusReport::NotFound),
        }
    }

    /// Status of the latest upload a submitter made under `filename`.
    pub fn status_by_email_filename(
        &self,
        email: &str,
        filename: &str,
    ) -> Result<StatusReport, IntakeError> {
        let email = validate_email(email.trim())?;
        let Some(user_id) = user_repo::find_by_email(self.store.database(), &email)? else {
            return Ok(StatusReport::NotFound);
        };

        match self.store.find_latest_for_user(user_id, filename.trim())? {
            Some(job) => Ok(StatusReport::Found(self.view(job, true)?)),
            None => Ok(StatusReport::NotFound),
        }
    }

    /// Every upload of a submitter, newest first, without explanations.
    /// An unknown email has an empty history.
    pub fn history(&self, email: &str) -> Result<UploadHistory, IntakeError> {
        let email = validate_email(email.trim())?;
        let uploads = match user_repo::find_by_email(self.store.database(), &email)? {
            Some(user_id) => self
                .store
                .list_for_user(user_id)?
                .into_iter()
                .map(|job| self.view(job, false))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(UploadHistory { email, uploads })
    }

    fn view(&self, job: Job, with_explanation: bool) -> Result<JobStatusView, IntakeError> {
        let explanation = if with_explanation && job.status == JobStatus::Completed {
            self.blobs.read_output(&job.id)?
        } else {
            None
        };
        let email = match job.user_id {
            Some(id) => user_repo::find_email(self.store.database(), id)?,
            None => None,
        };

        Ok(JobStatusView {
            status: job.status,
            pending: job.status.is_pending(),
            uid: job.id,
            filename: job.filename,
            email,
            summary_level: job.detail_level,
            language: job.language,
            upload_time: job.created_at,
            finish_time: job.completed_at,
            error_message: job.error,
            explanation,
        })
    }
}

fn validate_filename(filename: &str) -> Result<String, IntakeError> {
    let name = std::path::Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    if name.is_empty() {
        return Err(IntakeError::Validation("No file selected".to_string()));
    }

    let is_pptx = std::path::Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pptx"));
    if !is_pptx {
        return Err(IntakeError::Validation(
            "Only PowerPoint (.pptx) files are allowed".to_string(),
        ));
    }

    Ok(name)
}

fn parse_choice<T>(
    raw: Option<&str>,
    field: &str,
    parse: fn(&str) -> Option<T>,
    default: T,
) -> Result<T, IntakeError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => parse(value)
            .ok_or_else(|| IntakeError::Validation(format!("Invalid {}: {}", field, value))),
    }
}

#[derive(Validate)]
struct SubmitterEmail {
    #[validate(email)]
    address: String,
}

/// Emails are matched case-insensitively, so they are stored lowercased.
fn validate_email(email: &str) -> Result<String, IntakeError> {
    let candidate = SubmitterEmail {
        address: email.to_string(),
    };
    candidate
        .validate()
        .map_err(|_| IntakeError::Validation(format!("Invalid email: {}", email)))?;
    Ok(candidate.address.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    fn intake(dir: &TempDir) -> Intake {
        Intake::new(
            JobStore::new(Database::open_in_memory().unwrap()),
            BlobLayout::new(dir.path().join("uploads"), dir.path().join("outputs")),
        )
    }

    fn upload(filename: &str) -> UploadRequest {
        UploadRequest {
            filename: filename.to_string(),
            content: b"PK\x03\x04".to_vec(),
            summary_level: None,
            language: None,
            email: None,
        }
    }

    #[test]
    fn test_submit_defaults_and_writes_file() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);

        let receipt = intake.submit(upload("Quarterly.PPTX")).unwrap();
        assert_eq!(receipt.summary_level, DetailLevel::Comprehensive);
        assert_eq!(receipt.language, Language::En);
        assert!(intake.blobs.input_path(&receipt.uid).exists());

        let job = intake.store.find_by_id(&receipt.uid).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.filename, "Quarterly.PPTX");
    }

    #[test]
    fn test_submit_rejects_wrong_extension_without_creating_job() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);

        let err = intake.submit(upload("notes.pdf")).unwrap_err();
        assert!(matches!(err, IntakeError::Validation(_)));
        assert_eq!(intake.store.count(JobStatus::Created).unwrap(), 0);
    }

    #[test]
    fn test_submit_is_strict_about_level_and_language() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);

        let mut bad_level = upload("a.pptx");
        bad_level.summary_level = Some("expert".into());
        assert!(matches!(
            intake.submit(bad_level),
            Err(IntakeError::Validation(msg)) if msg.contains("summary_level")
        ));

        let mut bad_language = upload("a.pptx");
        bad_language.language = Some("fr".into());
        assert!(matches!(intake.submit(bad_language), Err(IntakeError::Validation(_))));

        let mut ok = upload("a.pptx");
        ok.summary_level = Some(" Executive ".into());
        ok.language = Some("HE".into());
        let receipt = intake.submit(ok).unwrap();
        assert_eq!(receipt.summary_level, DetailLevel::Executive);
        assert_eq!(receipt.language, Language::He);
    }

    #[test]
    fn test_submit_with_email_reuses_user() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);

        let mut first = upload("a.pptx");
        first.email = Some("Ada@Example.com".into());
        let mut second = upload("b.pptx");
        second.email = Some("ada@example.com".into());

        let a = intake.submit(first).unwrap();
        let b = intake.submit(second).unwrap();
        let user_a = intake.store.find_by_id(&a.uid).unwrap().unwrap().user_id;
        let user_b = intake.store.find_by_id(&b.uid).unwrap().unwrap().user_id;
        assert!(user_a.is_some());
        assert_eq!(user_a, user_b);

        let mut bad = upload("c.pptx");
        bad.email = Some("not-an-email".into());
        assert!(matches!(intake.submit(bad), Err(IntakeError::Validation(_))));
    }

    #[test]
    fn test_malformed_emails_are_rejected() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);

        for email in [
            "a@b..com",
            "a,b;c@x.com",
            "<x>@y.z",
            "a@-.com",
            "a\"@x.com",
            "two@@example.com",
            "spaced out@example.com",
        ] {
            let mut request = upload("deck.pptx");
            request.email = Some(email.into());
            assert!(
                matches!(intake.submit(request), Err(IntakeError::Validation(_))),
                "{email} should be rejected"
            );
        }
        assert!(intake.store.list_pending_oldest_first().unwrap().is_empty());

        assert_eq!(
            validate_email("Grace.Hopper+decks@Navy.Example.org").unwrap(),
            "grace.hopper+decks@navy.example.org"
        );
    }

    #[test]
    fn test_status_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);

        assert_eq!(intake.status("garbage").unwrap(), StatusReport::NotFound);
        assert_eq!(
            intake
                .status(&uuid::Uuid::new_v4().to_string())
                .unwrap(),
            StatusReport::NotFound
        );
    }

    #[test]
    fn test_status_of_pending_and_completed_jobs() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);
        let receipt = intake.submit(upload("a.pptx")).unwrap();

        match intake.status(&receipt.uid).unwrap() {
            StatusReport::Found(view) => {
                assert_eq!(view.status, JobStatus::Created);
                assert!(view.pending);
                assert!(view.email.is_none());
                assert!(view.finish_time.is_none());
                assert!(view.explanation.is_none());
            }
            StatusReport::NotFound => panic!("job should exist"),
        }

        let mut job = intake.store.find_by_id(&receipt.uid).unwrap().unwrap();
        intake.store.mark_processing(&mut job).unwrap();
        intake
            .blobs
            .write_output(&job.id, &[SlideExplanation::new(1, "done")])
            .unwrap();
        intake.store.mark_completed(&mut job).unwrap();

        match intake.status(&receipt.uid).unwrap() {
            StatusReport::Found(view) => {
                assert_eq!(view.status, JobStatus::Completed);
                assert!(!view.pending);
                assert!(view.finish_time.is_some());
                assert_eq!(view.explanation.unwrap()[0].explanation, "done");
            }
            StatusReport::NotFound => panic!("job should exist"),
        }
    }

    #[test]
    fn test_lookup_by_email_and_filename() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);

        let mut first = upload("deck.pptx");
        first.email = Some("ada@example.com".into());
        let mut second = upload("deck.pptx");
        second.email = Some("ada@example.com".into());
        let mut other = upload("other.pptx");
        other.email = Some("grace@example.com".into());

        intake.submit(first).unwrap();
        let latest = intake.submit(second).unwrap();
        intake.submit(other).unwrap();

        match intake
            .status_by_email_filename(" Ada@Example.com ", "deck.pptx")
            .unwrap()
        {
            StatusReport::Found(view) => assert_eq!(view.uid, latest.uid),
            StatusReport::NotFound => panic!("upload should be found"),
        }

        assert_eq!(
            intake
                .status_by_email_filename("ada@example.com", "other.pptx")
                .unwrap(),
            StatusReport::NotFound
        );
        assert_eq!(
            intake
                .status_by_email_filename("nobody@example.com", "deck.pptx")
                .unwrap(),
            StatusReport::NotFound
        );
        assert!(matches!(
            intake.status_by_email_filename("nope", "deck.pptx"),
            Err(IntakeError::Validation(_))
        ));
    }

    #[test]
    fn test_history_lists_newest_first() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir);

        let mut uids = Vec::new();
        for name in ["a.pptx", "b.pptx"] {
            let mut request = upload(name);
            request.email = Some("ada@example.com".into());
            uids.push(intake.submit(request).unwrap().uid);
        }
        intake.submit(upload("anonymous.pptx")).unwrap();

        let history = intake.history("ADA@example.com").unwrap();
        assert_eq!(history.email, "ada@example.com");
        let listed: Vec<&str> = history.uploads.iter().map(|v| v.uid.as_str()).collect();
        assert_eq!(listed, vec![uids[1].as_str(), uids[0].as_str()]);
        assert!(history.uploads.iter().all(|v| v.explanation.is_none()));

        assert!(intake
            .history("nobody@example.com")
            .unwrap()
            .uploads
            .is_empty());
    }
}
