// ==============================================================================
// candidate.rs - Candidate Variant Selection
// ==============================================================================
// Description: Scores every combined row by case-vs-control proportional
//              difference, gates it with Fisher's exact test and ranks the
//              survivors
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Selection (per row):
//   diff = case/case_size - sum(controls)/sum(control_sizes)
//   diff > difference threshold  AND  two-sided Fisher p < significance threshold
// Both comparisons use unrounded values; the stored record is rounded
// (difference to 4 places, p-value to 5).
//
// Ranking: severity rank ascending (unknown labels last), unrounded
// difference descending, VariantKey ascending.
// ==============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::{CohortPartition, PipelineConfig, Thresholds};
use crate::diagnostics::RunDiagnostics;
use crate::error::GraspError;
use crate::models::{CandidateRecord, CohortId, CombinedRow, CombinedTable};
use crate::stats::{fisher_exact_two_sided, proportional_difference, round_to, ContingencyTable};

const DIFFERENCE_DECIMALS: i32 = 4;
const P_VALUE_DECIMALS: i32 = 5;

/// Scores combined rows against a fixed case/control partition
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    partition: CohortPartition,
    sizes: BTreeMap<CohortId, u32>,
    thresholds: Thresholds,
}

impl CandidateSelector {
    /// Build a selector; every case and control cohort needs a configured size
    pub fn new(
        partition: CohortPartition,
        sizes: BTreeMap<CohortId, u32>,
        thresholds: Thresholds,
    ) -> Result<Self, GraspError> {
        if partition.controls.is_empty() {
            return Err(GraspError::config("control cohort set is empty"));
        }
        for cohort in std::iter::once(&partition.case).chain(&partition.controls) {
            if !sizes.contains_key(cohort) {
                return Err(GraspError::config(format!(
                    "cohort '{}' has no configured size",
                    cohort
                )));
            }
        }
        if partition.controls.contains(&partition.case) {
            return Err(GraspError::config(format!(
                "cohort '{}' cannot be both case and control",
                partition.case
            )));
        }

        Ok(Self {
            partition,
            sizes,
            thresholds,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, GraspError> {
        Self::new(config.partition(), config.cohort_sizes(), config.thresholds())
    }

    /// Evaluate one row
    ///
    /// # Returns
    /// * `Ok(Some(record))` - row passed both gates
    /// * `Ok(None)` - row did not qualify
    /// * `Err(GraspError::StatisticalDomain)` - the test is undefined for this row
    pub fn evaluate_row(
        &self,
        table: &CombinedTable,
        row: &CombinedRow,
    ) -> Result<Option<CandidateRecord>, GraspError> {
        let key = row.variant_key.as_str();
        let count_of = |cohort: &CohortId| -> Result<u64, GraspError> {
            table
                .count(row, cohort)
                .map(u64::from)
                .ok_or_else(|| GraspError::domain(key, format!("no count column for cohort '{}'", cohort)))
        };

        let case_count = count_of(&self.partition.case)?;
        let case_size = u64::from(self.sizes[&self.partition.case]);

        let mut control_count = 0u64;
        let mut control_size = 0u64;
        for control in &self.partition.controls {
            control_count += count_of(control)?;
            control_size += u64::from(self.sizes[control]);
        }

        let difference = proportional_difference(case_count, case_size, control_count, control_size)
            .map_err(|e| GraspError::domain(key, e.to_string()))?;

        // The table is built even for rows that fail the difference gate so
        // counts above a cohort's size are always flagged
        let contingency = ContingencyTable::from_counts(case_count, case_size, control_count, control_size)
            .map_err(|e| GraspError::domain(key, e.to_string()))?;

        if difference <= self.thresholds.difference {
            return Ok(None);
        }

        let p_value = fisher_exact_two_sided(&contingency).map_err(|e| GraspError::domain(key, e.to_string()))?;
        debug!(
            "{} {}: diff={:.6} table={:?} p={:.3e}",
            table.classification, key, difference, contingency, p_value
        );

        if p_value >= self.thresholds.significance {
            return Ok(None);
        }

        Ok(Some(CandidateRecord {
            variant_key: row.variant_key.clone(),
            classification: table.classification.clone(),
            counts: table
                .cohorts
                .iter()
                .cloned()
                .zip(row.counts.iter().copied())
                .collect(),
            proportional_difference: round_to(difference, DIFFERENCE_DECIMALS),
            p_value: round_to(p_value, P_VALUE_DECIMALS),
            raw_difference: difference,
        }))
    }

    /// Select and rank candidates across all classification tables
    ///
    /// Row-scoped statistical errors are recorded in `diagnostics` and the
    /// row is excluded; other rows are unaffected.
    pub fn select(
        &self,
        tables: &[CombinedTable],
        diagnostics: &mut RunDiagnostics,
    ) -> Result<Vec<CandidateRecord>, GraspError> {
        let mut candidates = Vec::new();

        for table in tables {
            let partition_gaps: Vec<&str> = std::iter::once(&self.partition.case)
                .chain(&self.partition.controls)
                .filter(|c| table.not_assessed.contains(*c))
                .map(|c| c.as_str())
                .collect();
            if !partition_gaps.is_empty() {
                warn!(
                    "{}: cohorts {:?} were not assessed; their zero counts are assumed, not observed",
                    table.classification, partition_gaps
                );
            }

            let before = candidates.len();
            for row in &table.rows {
                match self.evaluate_row(table, row) {
                    Ok(Some(candidate)) => candidates.push(candidate),
                    Ok(None) => {}
                    Err(e) => diagnostics.record(e)?,
                }
            }
            info!(
                "{}: {} of {} variants selected as candidates",
                table.classification,
                candidates.len() - before,
                table.rows.len()
            );
        }

        rank_candidates(&mut candidates);
        info!("Candidate selection complete: {} candidates", candidates.len());
        Ok(candidates)
    }
}

/// Sort by severity, then difference (descending), then VariantKey
pub fn rank_candidates(candidates: &mut [CandidateRecord]) {
    candidates.sort_by(compare_candidates);
}

fn compare_candidates(a: &CandidateRecord, b: &CandidateRecord) -> Ordering {
    a.classification
        .severity_rank()
        .cmp(&b.classification.severity_rank())
        .then_with(|| b.raw_difference.total_cmp(&a.raw_difference))
        .then_with(|| a.variant_key.cmp(&b.variant_key))
}
