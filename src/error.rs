//! Error types for the store and solver seams and for taxonomy validation.
//!
//! None of these ever escape the engine as a crash: retrieval records them per
//! query, the estimator turns them into `Diagnosis::Unavailable`, and the HTTP
//! layer maps taxonomy errors to 400 responses.

use std::time::Duration;

use thiserror::Error;

/// Failures of a single document-store round-trip.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
  /// The "value is one of" list exceeded what the store accepts in one query.
  #[error("in-list too long: {len} values (limit {limit})")]
  InListTooLong { len: usize, limit: usize },

  /// The query did not settle within the configured bound.
  #[error("store query timed out after {0:?}")]
  Timeout(Duration),

  /// Anything the backend itself reports.
  #[error("store backend error: {0}")]
  Backend(String),
}

/// Failures of the regression solve.
#[derive(Error, Debug)]
pub enum SolverError {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("regression service HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("regression service returned {got} weights for {expected} columns")]
  Shape { expected: usize, got: usize },

  #[error("regression solve timed out after {0:?}")]
  Timeout(Duration),

  /// The local solver only handles one-hot designs.
  #[error("unsupported design matrix: {0}")]
  Unsupported(String),
}

/// A filter label that does not exist in the topic registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
  #[error("unknown major topic: {0}")]
  UnknownMajorTopic(String),

  #[error("unknown minor topic: {0}")]
  UnknownMinorTopic(String),

  #[error("minor topic {minor} belongs to {major}, which is not selected")]
  MinorOutsideSelection { minor: String, major: String },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_display() {
    let err = StoreError::InListTooLong { len: 12, limit: 10 };
    assert_eq!(err.to_string(), "in-list too long: 12 values (limit 10)");

    let err = SolverError::Shape { expected: 3, got: 2 };
    assert!(err.to_string().contains("2 weights for 3 columns"));

    let err = TaxonomyError::UnknownMinorTopic("운동과 충돌?".into());
    assert_eq!(err.to_string(), "unknown minor topic: 운동과 충돌?");
  }
}
