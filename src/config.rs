// ==============================================================================
// config.rs - Pipeline Configuration
// ==============================================================================
// Description: Cohort sizes, classification set, case/control partition and
//              selection thresholds, loaded from JSON and validated up front
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Example (grasp.json):
//   {
//     "cohorts": [{"id": "Cohort_1", "size": 18}, {"id": "Cohort_5", "size": 23}],
//     "case_cohort": "Cohort_5",
//     "control_cohorts": ["Cohort_1"]
//   }
// Omitted fields take the defaults below.
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::error::GraspError;
use crate::models::{Classification, CohortId, DEFAULT_KEY_SEPARATOR};

pub const DEFAULT_DIFFERENCE_THRESHOLD: f64 = 0.3;
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// A cohort and its total number of assessed samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortConfig {
    pub id: CohortId,
    pub size: u32,
}

/// Run-wide configuration passed explicitly to every stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ordered cohort list; this order fixes the combined-table columns
    pub cohorts: Vec<CohortConfig>,
    /// Classifications tracked through counting, combining and selection
    pub classifications: Vec<Classification>,
    pub case_cohort: CohortId,
    pub control_cohorts: Vec<CohortId>,
    /// Candidates need a proportional difference strictly above this
    pub difference_threshold: f64,
    /// Candidates need a p-value strictly below this
    pub significance_threshold: f64,
    pub key_separator: String,
    /// Treat a missing per-cohort table as fatal instead of zero
    pub strict_inputs: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let sizes = [18, 15, 15, 13, 23];
        Self {
            cohorts: sizes
                .iter()
                .enumerate()
                .map(|(idx, size)| CohortConfig {
                    id: CohortId::new(format!("Cohort_{}", idx + 1)),
                    size: *size,
                })
                .collect(),
            classifications: Classification::KNOWN.to_vec(),
            case_cohort: CohortId::from("Cohort_5"),
            control_cohorts: vec![CohortId::from("Cohort_1"), CohortId::from("Cohort_3")],
            difference_threshold: DEFAULT_DIFFERENCE_THRESHOLD,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            key_separator: DEFAULT_KEY_SEPARATOR.to_string(),
            strict_inputs: false,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraspError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GraspError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&contents)
            .map_err(|e| GraspError::config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;

        info!(
            "Loaded configuration from {:?}: {} cohorts, {} classifications",
            path,
            config.cohorts.len(),
            config.classifications.len()
        );
        Ok(config)
    }

    /// Write this configuration as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GraspError> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), GraspError> {
        if self.cohorts.is_empty() {
            return Err(GraspError::config("cohort list is empty"));
        }
        if self.classifications.is_empty() {
            return Err(GraspError::config("classification list is empty"));
        }

        let mut seen = HashSet::new();
        for cohort in &self.cohorts {
            if cohort.id.as_str().trim().is_empty() {
                return Err(GraspError::config("cohort id must not be empty"));
            }
            if !seen.insert(&cohort.id) {
                return Err(GraspError::config(format!("duplicate cohort '{}'", cohort.id)));
            }
        }

        let mut seen_classes = HashSet::new();
        for classification in &self.classifications {
            if !seen_classes.insert(classification) {
                return Err(GraspError::config(format!(
                    "duplicate classification '{}'",
                    classification
                )));
            }
        }

        if !seen.contains(&self.case_cohort) {
            return Err(GraspError::config(format!(
                "case cohort '{}' has no configured size",
                self.case_cohort
            )));
        }
        if self.control_cohorts.is_empty() {
            return Err(GraspError::config("control cohort set is empty"));
        }
        for control in &self.control_cohorts {
            if control == &self.case_cohort {
                return Err(GraspError::config(format!(
                    "cohort '{}' cannot be both case and control",
                    control
                )));
            }
            if !seen.contains(control) {
                return Err(GraspError::config(format!(
                    "control cohort '{}' has no configured size",
                    control
                )));
            }
        }

        if !(self.difference_threshold > -1.0 && self.difference_threshold < 1.0) {
            return Err(GraspError::config(format!(
                "difference threshold {} outside (-1, 1)",
                self.difference_threshold
            )));
        }
        if !(self.significance_threshold > 0.0 && self.significance_threshold <= 1.0) {
            return Err(GraspError::config(format!(
                "significance threshold {} outside (0, 1]",
                self.significance_threshold
            )));
        }

        Ok(())
    }

    pub fn cohort_ids(&self) -> Vec<CohortId> {
        self.cohorts.iter().map(|c| c.id.clone()).collect()
    }

    pub fn cohort_sizes(&self) -> BTreeMap<CohortId, u32> {
        self.cohorts.iter().map(|c| (c.id.clone(), c.size)).collect()
    }

    pub fn partition(&self) -> CohortPartition {
        CohortPartition {
            case: self.case_cohort.clone(),
            controls: self.control_cohorts.clone(),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            difference: self.difference_threshold,
            significance: self.significance_threshold,
        }
    }
}

/// Case cohort tested against the pooled control cohorts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortPartition {
    pub case: CohortId,
    pub controls: Vec<CohortId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub difference: f64,
    pub significance: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            difference: DEFAULT_DIFFERENCE_THRESHOLD,
            significance: DEFAULT_SIGNIFICANCE_THRESHOLD,
        }
    }
}
