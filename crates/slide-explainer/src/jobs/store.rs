//! Durable job store enforcing the job state machine.

use chrono::Utc;

use super::model::{Job, JobStatus};
use crate::db::{job_repo, Database, DatabaseError};
use crate::explainer::{DetailLevel, Language};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Illegal transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {id} violates an invariant: {reason}")]
    Invariant { id: String, reason: String },

    #[error("Job {id} was modified concurrently")]
    Conflict { id: String },
}

/// Owns all mutation of job records.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates and persists a new job in `created`.
    pub fn create(
        &self,
        filename: &str,
        detail_level: DetailLevel,
        language: Language,
        user_id: Option<i64>,
    ) -> Result<Job, StoreError> {
        let job = Job::new(filename, detail_level, language, user_id);
        self.insert(&job)?;
        Ok(job)
    }

    /// Persists a job built by the caller. It must still be in `created`.
    pub fn insert(&self, job: &Job) -> Result<(), StoreError> {
        if job.status != JobStatus::Created {
            return Err(StoreError::Invariant {
                id: job.id.clone(),
                reason: format!("new jobs must be created, not {}", job.status),
            });
        }
        job.check_invariants().map_err(|reason| StoreError::Invariant {
            id: job.id.clone(),
            reason,
        })?;

        job_repo::insert(&self.db, &job.to_row())?;
        log::debug!("Inserted job {} ({})", job.id, job.filename);
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Job>, StoreError> {
        job_repo::find_by_id(&self.db, id)?
            .map(Job::from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Jobs still in `created`, oldest first.
    pub fn list_pending_oldest_first(&self) -> Result<Vec<Job>, StoreError> {
        job_repo::list_by_status_oldest_first(&self.db, JobStatus::Created.as_str())?
            .into_iter()
            .map(|row| Job::from_row(row).map_err(StoreError::from))
            .collect()
    }

    /// The user's most recent job for `filename`.
    pub fn find_latest_for_user(
        &self,
        user_id: i64,
        filename: &str,
    ) -> Result<Option<Job>, StoreError> {
        job_repo::find_latest_for_user(&self.db, user_id, filename)?
            .map(Job::from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Every job of a user, newest first.
    pub fn list_for_user(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        job_repo::list_for_user_newest_first(&self.db, user_id)?
            .into_iter()
            .map(|row| Job::from_row(row).map_err(StoreError::from))
            .collect()
    }

    pub fn count(&self, status: JobStatus) -> Result<u64, StoreError> {
        Ok(job_repo::count_by_status(&self.db, status.as_str())?)
    }

    /// Moves `job` to `next`, lets `apply` set the error and timestamp
    /// fields, and persists the result in one guarded write.
    ///
    /// Legality is judged from the status the caller holds, and the write
    /// only lands if the stored row still has that status. When it does not,
    /// the row is re-read: a row that can no longer reach `next` (for
    /// example a second claim of a job already `processing`) is an
    /// [`StoreError::InvalidTransition`], anything else a
    /// [`StoreError::Conflict`].
    pub fn update(
        &self,
        job: &mut Job,
        next: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<(), StoreError> {
        if !job.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                id: job.id.clone(),
                from: job.status,
                to: next,
            });
        }

        let mut updated = job.clone();
        updated.status = next;
        apply(&mut updated);
        updated
            .check_invariants()
            .map_err(|reason| StoreError::Invariant {
                id: job.id.clone(),
                reason,
            })?;

        if !job_repo::update_if_status(&self.db, &updated.to_row(), job.status.as_str())? {
            let stored = self
                .find_by_id(&job.id)?
                .ok_or_else(|| StoreError::NotFound(job.id.clone()))?;
            if stored.status.can_transition_to(next) {
                return Err(StoreError::Conflict { id: job.id.clone() });
            }
            return Err(StoreError::InvalidTransition {
                id: job.id.clone(),
                from: stored.status,
                to: next,
            });
        }

        *job = updated;
        Ok(())
    }

    /// `created → processing`, committed before any work starts.
    pub fn mark_processing(&self, job: &mut Job) -> Result<(), StoreError> {
        self.update(job, JobStatus::Processing, |_| {})
    }

    /// `processing → completed`; status and completion time in one write.
    pub fn mark_completed(&self, job: &mut Job) -> Result<(), StoreError> {
        self.update(job, JobStatus::Completed, |j| {
            j.error = None;
            j.completed_at = Some(Utc::now());
        })
    }

    /// `processing → failed` with a human-readable message.
    pub fn mark_failed(&self, job: &mut Job, message: impl Into<String>) -> Result<(), StoreError> {
        let message = message.into();
        self.update(job, JobStatus::Failed, |j| {
            j.error = Some(message);
            j.completed_at = Some(Utc::now());
        })
    }
}
