//! A single classified error type shared by every crate in the workspace.
//!
//! The HTTP boundary (`wms-daemon`) is the only place that turns a
//! [`WmsError`]'s class into a status code; every other crate just raises
//! one of these and lets it propagate with `?`.

use std::fmt;

/// The coarse error classes the HTTP layer maps to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Invalid,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorClass {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorClass::Invalid => 400,
            ErrorClass::Unauthorized => 401,
            ErrorClass::Forbidden => 403,
            ErrorClass::NotFound => 404,
            ErrorClass::Conflict => 409,
            ErrorClass::Internal => 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WmsError {
    pub class: ErrorClass,
    pub message: String,
    /// Optional structured detail surfaced to the client as `details`.
    pub details: Option<serde_json::Value>,
}

impl WmsError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Invalid, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, message)
    }
}

impl fmt::Display for WmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.class, self.message)
    }
}

impl std::error::Error for WmsError {}

pub type WmsResult<T> = Result<T, WmsError>;

/// Collapse a database error to `Internal` unless it's a row-not-found,
/// which the caller almost always wants surfaced as `NotFound` instead.
impl From<sqlx::Error> for WmsError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => WmsError::not_found("row not found"),
            other => WmsError::internal(other.to_string()),
        }
    }
}

/// Named-constraint detection for cases the caller must branch on
/// explicitly instead of collapsing to `Internal` (e.g. a duplicate
/// `event_key` racing past the `ON CONFLICT DO NOTHING` check).
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
