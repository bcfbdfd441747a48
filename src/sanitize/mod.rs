//! Data Sanitization
//!
//! Record validation for the ingestion boundary.
//!
//! The unchecked store mutations deliberately accept anything (malformed
//! records are the caller's programmer error, not an engine failure); the
//! engine's `try_add_*` methods run these checks first so a validating
//! caller never has to duplicate them.

use thiserror::Error;

/// Rejection reasons for the validated ingestion path
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValidationError {
    /// Rating value is NaN or infinite
    #[error("rating value {value} is not finite")]
    NonFiniteRating { value: f64 },
    /// Rating value outside the [1, scale] range
    #[error("rating value {value} is outside the [1, {scale}] scale")]
    RatingOutOfRange { value: f64, scale: f64 },
    /// Rating references a user the store has never seen
    #[error("unknown user id: {0}")]
    UnknownUser(String),
    /// Rating references a movie the store has never seen
    #[error("unknown movie id: {0}")]
    UnknownMovie(String),
    /// A record with this id already exists
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    /// Record id is empty
    #[error("empty record id")]
    EmptyId,
}

/// Check whether a slice contains invalid values (NaN or Inf)
pub fn has_invalid_values(arr: &[f64]) -> bool {
    arr.iter().any(|&x| x.is_nan() || x.is_infinite())
}

/// Validate a record id
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyId);
    }
    Ok(())
}

/// Validate a rating value against the configured scale
///
/// Values must be finite and within [1, scale]; anything below 1 would
/// collide with the 0.0 "unrated" sentinel in dense rating vectors.
pub fn validate_rating_value(value: f64, scale: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteRating { value });
    }
    if !(1.0..=scale).contains(&value) {
        return Err(ValidationError::RatingOutOfRange { value, scale });
    }
    Ok(())
}
