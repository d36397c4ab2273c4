// ==============================================================================
// combiner.rs - Cross-Cohort Table Combination
// ==============================================================================
// Description: Merges per-cohort count tables into one table per
//              classification with a zero-filled count column per cohort
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// A cohort whose table is missing contributes zeros, exactly like a cohort
// with no variants of that classification. The two cases are told apart only
// through `CombinedTable::not_assessed`, which the selector and the report
// surface.
// ==============================================================================

use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::diagnostics::RunDiagnostics;
use crate::error::GraspError;
use crate::models::{Classification, CohortId, CombinedRow, CombinedTable, PerCohortCount, VariantKey};
use crate::store::TableStore;

/// Merges per-cohort tables for every tracked classification
pub struct Combiner {
    classifications: Vec<Classification>,
    cohorts: Vec<CohortId>,
    strict_inputs: bool,
}

impl Combiner {
    pub fn new(classifications: Vec<Classification>, cohorts: Vec<CohortId>) -> Self {
        Self {
            classifications,
            cohorts,
            strict_inputs: false,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.classifications.clone(), config.cohort_ids()).strict(config.strict_inputs)
    }

    /// Fail on a missing per-cohort table instead of zero-filling it
    pub fn strict(mut self, strict_inputs: bool) -> Self {
        self.strict_inputs = strict_inputs;
        self
    }

    /// Merge one classification's per-cohort tables
    ///
    /// `tables` holds one entry per cohort; `None` marks a cohort whose
    /// table was not available. Cohorts absent from `tables` altogether are
    /// treated the same way.
    pub fn merge(&self, classification: &Classification, tables: &[(CohortId, Option<PerCohortCount>)]) -> CombinedTable {
        let mut combined = CombinedTable::new(classification.clone(), self.cohorts.clone());
        let mut index: HashMap<VariantKey, usize> = HashMap::new();

        for (col, cohort) in self.cohorts.iter().enumerate() {
            let table = tables
                .iter()
                .find(|(id, _)| id == cohort)
                .and_then(|(_, table)| table.as_ref());

            let Some(table) = table else {
                combined.not_assessed.insert(cohort.clone());
                continue;
            };

            for count in &table.rows {
                let row_idx = match index.get(&count.variant_key) {
                    Some(idx) => *idx,
                    None => {
                        combined.rows.push(CombinedRow {
                            variant_key: count.variant_key.clone(),
                            counts: vec![0; self.cohorts.len()],
                        });
                        index.insert(count.variant_key.clone(), combined.rows.len() - 1);
                        combined.rows.len() - 1
                    }
                };
                combined.rows[row_idx].counts[col] = count.sample_count;
            }
        }

        combined
    }

    /// Read every cohort's tables from `store`, merge, and write the results back
    pub fn combine(
        &self,
        store: &mut dyn TableStore,
        diagnostics: &mut RunDiagnostics,
    ) -> Result<Vec<CombinedTable>, GraspError> {
        let mut results = Vec::with_capacity(self.classifications.len());

        for classification in &self.classifications {
            let mut tables = Vec::with_capacity(self.cohorts.len());
            for cohort in &self.cohorts {
                let table = match store.read_cohort_counts(cohort, classification, diagnostics) {
                    Ok(table) => table,
                    Err(e) if e.is_recoverable() => {
                        diagnostics.record(e)?;
                        None
                    }
                    Err(e) => return Err(e),
                };

                if table.is_none() {
                    let path = store.cohort_counts_location(cohort, classification);
                    if self.strict_inputs {
                        return Err(GraspError::MissingInput { path });
                    }
                    diagnostics.record(GraspError::MissingInput { path })?;
                }
                tables.push((cohort.clone(), table));
            }

            let combined = self.merge(classification, &tables);
            if !combined.not_assessed.is_empty() {
                warn!(
                    "{}: cohorts {:?} not assessed, counted as zero",
                    classification,
                    combined.not_assessed.iter().map(|c| c.as_str()).collect::<Vec<_>>()
                );
            }
            store.write_combined(&combined)?;
            info!("{}: {} variants combined across {} cohorts", classification, combined.rows.len(), self.cohorts.len());
            results.push(combined);
        }

        Ok(results)
    }
}
