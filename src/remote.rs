//! Narrow capabilities the engine needs from the outside world.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::EntryValidationError;
use crate::models::{Holiday, LoggedTime, TaskId, TimeAllocation};

#[derive(Debug, Error)]
pub(crate) enum RemoteError {
    /// Rejected locally before the request was sent.
    #[error(transparent)]
    Invalid(#[from] EntryValidationError),
    #[error("API not configured: {0}")]
    NotConfigured(&'static str),
    /// The service answered with a structured list of errors.
    #[error("rejected with status {status}: {}", errors.join(", "))]
    Rejected { status: u16, errors: Vec<String> },
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Source of authoritative public holidays.
#[async_trait]
pub(crate) trait HolidaySource: Send + Sync {
    async fn fetch_holidays(&self, year: i32) -> Result<Vec<Holiday>, RemoteError>;
}

/// The time-logging side of the project management service.
#[async_trait]
pub(crate) trait TimeLogService: Send + Sync {
    /// Minutes already logged in a month, as a flat list of per-day rows.
    async fn fetch_logged_time(&self, month: u32, year: i32)
        -> Result<Vec<LoggedTime>, RemoteError>;

    /// Creates one time entry, returning the remote id when the response carries one.
    async fn submit_time_entry(
        &self,
        task_id: TaskId,
        entry: &TimeAllocation,
    ) -> Result<Option<i64>, RemoteError>;

    async fn delete_time_entry(&self, entry_id: i64) -> Result<(), RemoteError>;
}
