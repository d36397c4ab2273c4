// ==============================================================================
// counter.rs - Per-Cohort Variant Counting
// ==============================================================================
// Description: Groups one cohort's cleaned sample records by classification
//              and VariantKey, producing sample counts and sample lists
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Row order within a table: descending sample count; equal counts keep the
// order in which their VariantKey was first seen. Sample files are fed in
// file-name order, so the tie order is reproducible across runs.
// ==============================================================================

use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::models::{Classification, CohortId, PerCohortCount, SampleRecord, VariantCount, VariantKey};

/// Counts variants for one cohort at a time
pub struct Counter {
    classifications: Vec<Classification>,
    separator: String,
}

/// Grouping state for one classification
#[derive(Default)]
struct Grouping {
    /// Index into `rows` by key, preserving first-seen order in `rows`
    index: HashMap<VariantKey, usize>,
    rows: Vec<VariantCount>,
}

impl Counter {
    pub fn new(classifications: Vec<Classification>, separator: impl Into<String>) -> Self {
        Self {
            classifications,
            separator: separator.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.classifications.clone(), config.key_separator.clone())
    }

    /// Count one cohort's records
    ///
    /// # Returns
    /// One table per tracked classification, in configured order. A
    /// classification with no occurrences yields an empty table.
    pub fn count<I>(&self, cohort: &CohortId, records: I) -> Vec<PerCohortCount>
    where
        I: IntoIterator<Item = SampleRecord>,
    {
        let mut groups: HashMap<&Classification, Grouping> = self
            .classifications
            .iter()
            .map(|c| (c, Grouping::default()))
            .collect();

        let mut seen = 0usize;
        let mut untracked = 0usize;

        for record in records {
            seen += 1;
            let Some(group) = groups.get_mut(&record.classification) else {
                untracked += 1;
                continue;
            };

            let key = VariantKey::from_parts(&record.gene, &record.nucleotide, &self.separator);
            let idx = match group.index.get(&key) {
                Some(idx) => *idx,
                None => {
                    group.rows.push(VariantCount {
                        variant_key: key.clone(),
                        sample_count: 0,
                        samples: Vec::new(),
                    });
                    group.index.insert(key, group.rows.len() - 1);
                    group.rows.len() - 1
                }
            };

            // A sample counts once per variant even if the record repeats
            let row = &mut group.rows[idx];
            if !row.samples.contains(&record.sample_id) {
                row.samples.push(record.sample_id);
                row.sample_count += 1;
            }
        }

        debug!(
            "Cohort {}: {} records read, {} outside tracked classifications",
            cohort, seen, untracked
        );

        let tables: Vec<PerCohortCount> = self
            .classifications
            .iter()
            .map(|classification| {
                let mut rows = groups
                    .remove(classification)
                    .map(|g| g.rows)
                    .unwrap_or_default();
                // Stable: ties keep first-seen order
                rows.sort_by(|a, b| b.sample_count.cmp(&a.sample_count));
                PerCohortCount {
                    cohort: cohort.clone(),
                    classification: classification.clone(),
                    rows,
                }
            })
            .collect();

        info!(
            "Variant counting complete for {}: {} distinct variants across {} classifications",
            cohort,
            tables.iter().map(|t| t.rows.len()).sum::<usize>(),
            tables.len()
        );

        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gene: &str, nuc: &str, class: Classification, sample: &str) -> SampleRecord {
        SampleRecord {
            gene: gene.to_string(),
            nucleotide: nuc.to_string(),
            classification: class,
            sample_id: sample.to_string(),
        }
    }

    fn counter() -> Counter {
        Counter::new(
            vec![Classification::Pathogenic, Classification::UncertainSignificance],
            "_",
        )
    }

    #[test]
    fn test_groups_by_classification_and_key() {
        let records = vec![
            record("BRCA1", "c.1A>G", Classification::Pathogenic, "S1"),
            record("BRCA1", "c.1A>G", Classification::Pathogenic, "S2"),
            record("TP53", "c.2C>T", Classification::Pathogenic, "S2"),
            record("LDLR", "c.3G>A", Classification::UncertainSignificance, "S1"),
        ];

        let tables = counter().count(&"Cohort_1".into(), records);
        assert_eq!(tables.len(), 2);

        let pathogenic = &tables[0];
        assert_eq!(pathogenic.classification, Classification::Pathogenic);
        assert_eq!(pathogenic.rows.len(), 2);
        assert_eq!(pathogenic.rows[0].variant_key.as_str(), "BRCA1_c.1A>G");
        assert_eq!(pathogenic.rows[0].sample_count, 2);
        assert_eq!(pathogenic.rows[0].samples, vec!["S1", "S2"]);

        let vus = &tables[1];
        assert_eq!(vus.rows.len(), 1);
        assert_eq!(vus.rows[0].variant_key.as_str(), "LDLR_c.3G>A");
    }

    #[test]
    fn test_sorted_by_descending_count_with_stable_ties() {
        let records = vec![
            record("A", "c.1", Classification::Pathogenic, "S1"),
            record("B", "c.2", Classification::Pathogenic, "S1"),
            record("C", "c.3", Classification::Pathogenic, "S1"),
            record("C", "c.3", Classification::Pathogenic, "S2"),
        ];

        let tables = counter().count(&"Cohort_1".into(), records);
        let keys: Vec<&str> = tables[0].rows.iter().map(|r| r.variant_key.as_str()).collect();
        assert_eq!(keys, vec!["C_c.3", "A_c.1", "B_c.2"]);
    }

    #[test]
    fn test_untracked_classifications_dropped() {
        let records = vec![
            record("A", "c.1", Classification::Benign, "S1"),
            record("B", "c.2", Classification::Unrecognized("ARTEFACT".into()), "S1"),
        ];

        let tables = counter().count(&"Cohort_1".into(), records);
        assert!(tables.iter().all(|t| t.rows.is_empty()));
    }

    #[test]
    fn test_empty_classification_still_yields_table() {
        let tables = counter().count(&"Cohort_2".into(), Vec::new());
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].classification, Classification::UncertainSignificance);
        assert!(tables[1].rows.is_empty());
        assert_eq!(tables[1].cohort.as_str(), "Cohort_2");
    }

    #[test]
    fn test_repeated_sample_counted_once() {
        let records = vec![
            record("A", "c.1", Classification::Pathogenic, "S1"),
            record("A", "c.1", Classification::Pathogenic, "S1"),
        ];

        let tables = counter().count(&"Cohort_1".into(), records);
        assert_eq!(tables[0].rows[0].sample_count, 1);
        assert_eq!(tables[0].rows[0].samples, vec!["S1"]);
    }
}
