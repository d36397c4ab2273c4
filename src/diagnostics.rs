// ==============================================================================
// diagnostics.rs - Recoverable Error Ledger
// ==============================================================================
// Description: Collects recoverable errors raised during a run so they are
//              logged once and summarised in the structured report
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GraspError;

/// Per-run counters for skipped inputs, records and rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub missing_inputs: usize,
    pub malformed_records: usize,
    pub domain_errors: usize,
    /// Messages in the order they were raised; run log only, never serialized
    #[serde(skip)]
    pub messages: Vec<String>,
}

impl RunDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a recoverable error and count it
    ///
    /// Fatal errors are handed back to the caller unchanged.
    pub fn record(&mut self, error: GraspError) -> Result<(), GraspError> {
        match &error {
            GraspError::MissingInput { .. } => self.missing_inputs += 1,
            GraspError::MalformedRecord { .. } => self.malformed_records += 1,
            GraspError::StatisticalDomain { .. } => self.domain_errors += 1,
            _ => return Err(error),
        }
        warn!("{}", error);
        self.messages.push(error.to_string());
        Ok(())
    }

    pub fn total(&self) -> usize {
        self.missing_inputs + self.malformed_records + self.domain_errors
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}
