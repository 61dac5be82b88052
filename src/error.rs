use chrono::NaiveDate;
use thiserror::Error;

use crate::models::TaskId;
use crate::remote::RemoteError;

/// Broad category of an [`Error`], used to decide how a caller reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Malformed input, detected before any I/O. Never retried.
    Validation,
    /// A well formed request that has nothing to work on. User-correctable.
    EmptyResult,
    Remote,
}

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid month {0}, expected 1-12")]
    InvalidMonth(u32),
    #[error("invalid range: end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("no working days between {start} and {end}")]
    NoWorkingDays { start: NaiveDate, end: NaiveDate },
    #[error("no work days supplied for submission")]
    NoWorkDays,
    #[error("no submission results were produced")]
    NoResults,
    #[error("no logged time found for {month:02}/{year}")]
    NoLoggedTime { month: u32, year: i32 },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDate(_) | Self::InvalidMonth(_) | Self::InvalidRange { .. } => {
                ErrorKind::Validation
            }
            Self::NoWorkingDays { .. }
            | Self::NoWorkDays
            | Self::NoResults
            | Self::NoLoggedTime { .. } => ErrorKind::EmptyResult,
            Self::Remote(RemoteError::Invalid(_)) => ErrorKind::Validation,
            Self::Remote(_) => ErrorKind::Remote,
        }
    }
}

/// Reasons a single allocation cannot be submitted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub(crate) enum EntryValidationError {
    #[error("invalid task ID: {0}")]
    TaskId(TaskId),
    #[error("minutes must be greater than zero: {0}")]
    Minutes(i64),
    #[error("no date set for the entry")]
    MissingDate,
}
