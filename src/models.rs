// ==============================================================================
// models.rs - Cohort Variant Data Models
// ==============================================================================
// Description: Data structures for per-cohort counts, combined cross-cohort
//              tables and ranked candidate variants
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Severity rank given to labels outside the known classification set
pub const UNKNOWN_SEVERITY_RANK: u8 = 99;

/// Default separator between gene and nucleotide change in a VariantKey
pub const DEFAULT_KEY_SEPARATOR: &str = "_";

/// Clinical classification label assigned to a variant occurrence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    Pathogenic,
    LikelyPathogenic,
    PossiblyPathogenicModerate,
    PossiblyPathogenicLow,
    UncertainSignificance,
    PossiblyBenign,
    LikelyBenign,
    Benign,
    /// Label outside the known set; kept verbatim and ranked last
    Unrecognized(String),
}

impl Classification {
    /// All known labels, most severe first
    pub const KNOWN: [Classification; 8] = [
        Classification::Pathogenic,
        Classification::LikelyPathogenic,
        Classification::PossiblyPathogenicModerate,
        Classification::PossiblyPathogenicLow,
        Classification::UncertainSignificance,
        Classification::PossiblyBenign,
        Classification::LikelyBenign,
        Classification::Benign,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Classification::Pathogenic => "PATHOGENIC",
            Classification::LikelyPathogenic => "LIKELY_PATHOGENIC",
            Classification::PossiblyPathogenicModerate => "POSSIBLY_PATHOGENIC_MODERATE",
            Classification::PossiblyPathogenicLow => "POSSIBLY_PATHOGENIC_LOW",
            Classification::UncertainSignificance => "UNCERTAIN_SIGNIFICANCE",
            Classification::PossiblyBenign => "POSSIBLY_BENIGN",
            Classification::LikelyBenign => "LIKELY_BENIGN",
            Classification::Benign => "BENIGN",
            Classification::Unrecognized(label) => label.as_str(),
        }
    }

    /// Ranking position (1 = PATHOGENIC); unknown labels get the sentinel 99
    pub fn severity_rank(&self) -> u8 {
        match self {
            Classification::Pathogenic => 1,
            Classification::LikelyPathogenic => 2,
            Classification::PossiblyPathogenicModerate => 3,
            Classification::PossiblyPathogenicLow => 4,
            Classification::UncertainSignificance => 5,
            Classification::PossiblyBenign => 6,
            Classification::LikelyBenign => 7,
            Classification::Benign => 8,
            Classification::Unrecognized(_) => UNKNOWN_SEVERITY_RANK,
        }
    }

    /// Map a label to its classification; unknown labels become `Unrecognized`
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Classification::KNOWN
            .iter()
            .find(|c| c.as_str() == label)
            .cloned()
            .unwrap_or_else(|| Classification::Unrecognized(label.to_string()))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Classification::Unrecognized(_))
    }
}

impl FromStr for Classification {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Classification::from_label(s))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Classification {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Classification {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Classification::from_label(&label))
    }
}

/// Named patient cohort (e.g., "Cohort_5")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CohortId(pub String);

impl CohortId {
    pub fn new(id: impl Into<String>) -> Self {
        CohortId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CohortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CohortId {
    fn from(id: &str) -> Self {
        CohortId(id.to_string())
    }
}

/// Variant identity: gene and nucleotide change joined by a separator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantKey(pub String);

impl VariantKey {
    /// Build a key from its parts (e.g., "BRCA2" + "c.7397T>C" -> "BRCA2_c.7397T>C")
    pub fn from_parts(gene: &str, nucleotide: &str, separator: &str) -> Self {
        VariantKey(format!("{}{}{}", gene, separator, nucleotide))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariantKey {
    fn from(key: &str) -> Self {
        VariantKey(key.to_string())
    }
}

/// One cleaned per-sample variant call
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub gene: String,
    pub nucleotide: String,
    pub classification: Classification,
    pub sample_id: String,
}

/// Samples carrying one variant within a cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantCount {
    pub variant_key: VariantKey,
    /// Distinct samples carrying the variant
    pub sample_count: u32,
    pub samples: Vec<String>,
}

/// Per-cohort, per-classification count table, sorted by descending count
#[derive(Debug, Clone, PartialEq)]
pub struct PerCohortCount {
    pub cohort: CohortId,
    pub classification: Classification,
    pub rows: Vec<VariantCount>,
}

impl PerCohortCount {
    pub fn empty(cohort: CohortId, classification: Classification) -> Self {
        Self {
            cohort,
            classification,
            rows: Vec::new(),
        }
    }

    pub fn get(&self, key: &VariantKey) -> Option<&VariantCount> {
        self.rows.iter().find(|r| &r.variant_key == key)
    }
}

/// One variant's counts across all cohorts, aligned with the table's cohort order
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub variant_key: VariantKey,
    pub counts: Vec<u32>,
}

/// Cross-cohort table for a single classification
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedTable {
    pub classification: Classification,
    /// Column order for every row's `counts`
    pub cohorts: Vec<CohortId>,
    pub rows: Vec<CombinedRow>,
    /// Cohorts whose data was absent for this classification (zero-filled)
    pub not_assessed: BTreeSet<CohortId>,
}

impl CombinedTable {
    pub fn new(classification: Classification, cohorts: Vec<CohortId>) -> Self {
        Self {
            classification,
            cohorts,
            rows: Vec::new(),
            not_assessed: BTreeSet::new(),
        }
    }

    /// Column index of a cohort, if the table has one
    pub fn cohort_index(&self, cohort: &CohortId) -> Option<usize> {
        self.cohorts.iter().position(|c| c == cohort)
    }

    pub fn count(&self, row: &CombinedRow, cohort: &CohortId) -> Option<u32> {
        self.cohort_index(cohort).and_then(|idx| row.counts.get(idx).copied())
    }

    pub fn find(&self, key: &VariantKey) -> Option<&CombinedRow> {
        self.rows.iter().find(|r| &r.variant_key == key)
    }
}

/// Combined row that passed candidate selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub variant_key: VariantKey,
    pub classification: Classification,
    /// Raw per-cohort counts in configured cohort order
    pub counts: Vec<(CohortId, u32)>,
    /// Rounded to 4 decimal places
    pub proportional_difference: f64,
    /// Rounded to 5 decimal places
    pub p_value: f64,
    /// Unrounded difference, kept for ranking
    #[serde(skip)]
    pub raw_difference: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_roundtrip_labels() {
        for classification in Classification::KNOWN.iter() {
            let parsed: Classification = classification.as_str().parse().unwrap();
            assert_eq!(&parsed, classification);
        }
    }

    #[test]
    fn test_severity_order() {
        assert_eq!(Classification::Pathogenic.severity_rank(), 1);
        assert_eq!(Classification::Benign.severity_rank(), 8);
        let unknown: Classification = "CONFLICTING".parse().unwrap();
        assert_eq!(unknown, Classification::Unrecognized("CONFLICTING".to_string()));
        assert_eq!(unknown.severity_rank(), UNKNOWN_SEVERITY_RANK);
        assert!(!unknown.is_known());
    }

    #[test]
    fn test_classification_serde() {
        let json = serde_json::to_string(&Classification::LikelyPathogenic).unwrap();
        assert_eq!(json, "\"LIKELY_PATHOGENIC\"");

        let parsed: Classification = serde_json::from_str("\"UNCERTAIN_SIGNIFICANCE\"").unwrap();
        assert_eq!(parsed, Classification::UncertainSignificance);
    }

    #[test]
    fn test_variant_key_from_parts() {
        let key = VariantKey::from_parts("BRCA2", "c.7397T>C", DEFAULT_KEY_SEPARATOR);
        assert_eq!(key.as_str(), "BRCA2_c.7397T>C");
    }

    #[test]
    fn test_combined_table_lookup() {
        let mut table = CombinedTable::new(
            Classification::Pathogenic,
            vec!["Cohort_1".into(), "Cohort_2".into()],
        );
        table.rows.push(CombinedRow {
            variant_key: "GENE_c.1A>G".into(),
            counts: vec![3, 0],
        });

        let row = table.find(&"GENE_c.1A>G".into()).unwrap();
        assert_eq!(table.count(row, &"Cohort_1".into()), Some(3));
        assert_eq!(table.count(row, &"Cohort_2".into()), Some(0));
        assert_eq!(table.count(row, &"Cohort_9".into()), None);
    }
}
