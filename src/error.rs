//! Error types for the attendance core.

use crate::calendar::BlockedReason;
use crate::models::StudentId;
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Blocked(BlockedReason),

    #[error("Attendance closed. Changes are locked one hour after the first save (limit: {})", crate::lock::local_clock_time(*lock_at))]
    Locked { lock_at: NaiveDateTime },

    #[error("Only today's attendance ({today}) can be edited, not {date}")]
    NotToday { date: NaiveDate, today: NaiveDate },

    #[error("This attendance sheet is read-only")]
    ReadOnly,

    #[error("Student {0} is not part of this attendance sheet")]
    UnknownStudent(StudentId),

    #[error("Invalid justification: {0}")]
    InvalidJustification(String),

    #[error("Your session has expired. Please sign in again")]
    SessionExpired,

    #[error("No user is signed in")]
    NotSignedIn,

    #[error("Invalid calendar event: {0}")]
    InvalidEvent(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),

    #[error("A newer attendance sheet was requested")]
    StaleSession,
}

impl Error {
    /// Whether this error means the signed-in identity is no longer valid, in which case the
    /// caller should send the user back to sign-in rather than showing a normal error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::SessionExpired | Error::NotSignedIn)
    }
}
