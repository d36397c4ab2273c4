// ==============================================================================
// error.rs - Pipeline Error Taxonomy
// ==============================================================================
// Description: Recoverable and fatal error classes shared by all stages
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Recoverable errors (MissingInput, MalformedRecord, StatisticalDomain) are
// handled at record/row scope and surfaced through the run log. Configuration
// errors abort the run before any artifact is written.
// ==============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the counting, combining and candidate stages
#[derive(Error, Debug)]
pub enum GraspError {
    #[error("Missing input: {path}")]
    MissingInput { path: PathBuf },

    #[error("Malformed record in {source_name} at row {row}: {details}")]
    MalformedRecord {
        source_name: String,
        /// 1-based row; 0 means the file as a whole was rejected
        row: usize,
        details: String,
    },

    #[error("Statistical domain error for {variant_key}: {details}")]
    StatisticalDomain { variant_key: String, details: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraspError {
    /// Whether the run may continue after logging this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GraspError::MissingInput { .. }
                | GraspError::MalformedRecord { .. }
                | GraspError::StatisticalDomain { .. }
        )
    }

    pub fn config(details: impl Into<String>) -> Self {
        GraspError::Configuration(details.into())
    }

    pub fn domain(variant_key: impl Into<String>, details: impl Into<String>) -> Self {
        GraspError::StatisticalDomain {
            variant_key: variant_key.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classes() {
        assert!(GraspError::MissingInput { path: PathBuf::from("x.csv") }.is_recoverable());
        assert!(GraspError::domain("BRCA1_c.1A>G", "zero cohort size").is_recoverable());
        assert!(GraspError::MalformedRecord {
            source_name: "s1.csv".to_string(),
            row: 3,
            details: "missing Gene".to_string(),
        }
        .is_recoverable());

        assert!(!GraspError::config("empty cohort list").is_recoverable());
        assert!(!GraspError::Report("disk full".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = GraspError::domain("TP53_c.215C>G", "cohort size is zero");
        assert_eq!(
            err.to_string(),
            "Statistical domain error for TP53_c.215C>G: cohort size is zero"
        );
    }
}
