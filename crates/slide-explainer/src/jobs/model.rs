use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::db::job_repo::JobRow;
use crate::db::DatabaseError;
use crate::explainer::{DetailLevel, Language};

/// Lifecycle state of a job.
///
/// `created → processing → {completed | failed}`; terminal states never
/// change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(JobStatus::Created),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Pending for reporting purposes.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Created | JobStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Created, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded deck and its processing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub filename: String,
    pub detail_level: DetailLevel,
    pub language: Language,
    pub status: JobStatus,
    pub error: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A fresh job in `created` with a new v4 id.
    pub fn new(
        filename: impl Into<String>,
        detail_level: DetailLevel,
        language: Language,
        user_id: Option<i64>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            detail_level,
            language,
            status: JobStatus::Created,
            error: None,
            user_id,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Checks the field invariants that hold in every state.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.status.is_terminal() != self.completed_at.is_some() {
            return Err(format!(
                "completion timestamp must be set exactly when the job is terminal (status {})",
                self.status
            ));
        }
        if (self.status == JobStatus::Failed) != self.error.is_some() {
            return Err(format!(
                "error message must be set exactly when the job failed (status {})",
                self.status
            ));
        }
        Ok(())
    }

    pub(crate) fn to_row(&self) -> JobRow {
        JobRow {
            id: self.id.clone(),
            filename: self.filename.clone(),
            detail_level: self.detail_level.as_str().to_string(),
            language: self.language.as_str().to_string(),
            status: self.status.as_str().to_string(),
            error: self.error.clone(),
            user_id: self.user_id,
            created_at: format_timestamp(self.created_at),
            completed_at: self.completed_at.map(format_timestamp),
        }
    }

    pub(crate) fn from_row(row: JobRow) -> Result<Self, DatabaseError> {
        let status = JobStatus::parse(&row.status).ok_or_else(|| DatabaseError::CorruptValue {
            column: "status",
            value: row.status.clone(),
        })?;

        // Rows written by other tools may carry values outside the known set.
        let detail_level = DetailLevel::parse(&row.detail_level).unwrap_or_else(|| {
            log::warn!(
                "Unknown detail level '{}' for job {}, using {}",
                row.detail_level,
                row.id,
                DetailLevel::default()
            );
            DetailLevel::default()
        });
        let language = Language::parse(&row.language).unwrap_or_else(|| {
            log::warn!(
                "Unknown language '{}' for job {}, using {}",
                row.language,
                row.id,
                Language::default()
            );
            Language::default()
        });

        Ok(Self {
            created_at: parse_timestamp(&row.created_at, "created_at")?,
            completed_at: row
                .completed_at
                .as_deref()
                .map(|s| parse_timestamp(s, "completed_at"))
                .transpose()?,
            id: row.id,
            filename: row.filename,
            detail_level,
            language,
            status,
            error: row.error,
            user_id: row.user_id,
        })
    }
}

/// RFC 3339 with microseconds; lexicographic order matches time order.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, column: &'static str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::CorruptValue {
            column,
            value: value.to_string(),
        })
}
