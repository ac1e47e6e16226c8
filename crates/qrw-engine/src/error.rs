//! Error types for the workflow engine
//!
//! The variants map onto the caller-facing taxonomy: `InvalidArgument` is a
//! 4xx-equivalent, `NotFound` a 404, `Conflict` a 409, and
//! `Unauthorized`/`Forbidden` are kept distinct from validation failures.

use qrw_model::PhaseKeyError;
use qrw_store::StoreError;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input: bad enum value, empty required text, out-of-range phase
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or state conflict
    #[error("conflict: {0}")]
    Conflict(String),

    /// No authenticated actor where one is required
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated actor lacks the required assignment
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Phase key failed validation
    #[error("invalid phase key: {0}")]
    PhaseKey(#[from] PhaseKeyError),

    /// Propagated store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the error reports a missing entity (404-equivalent)
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Store(StoreError::NotFound { .. })
                | Self::Store(StoreError::TemplateMissing)
        )
    }

    /// Whether the error reports malformed input (400-equivalent)
    #[inline]
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::PhaseKey(_))
    }

    /// Whether the error reports a uniqueness/state conflict (409-equivalent)
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
