// ==============================================================================
// store.rs - Intermediate Table Storage
// ==============================================================================
// Description: Read/write boundary for per-cohort count tables and combined
//              cross-cohort tables (CSV on disk, or in memory for tests)
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// On-disk layout (FsTableStore):
//   <root>/<cohort>/<cohort>_<CLASS>_gene_nucleotide.csv
//       Gene_Nucleotide,Sample_Count,Samples
//   <root>/all_cohorts/combined_cohorts_<CLASS>_gene_nucleotide.csv
//       Gene_Nucleotide,<cohort 1>,<cohort 2>,...
// ==============================================================================

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::diagnostics::RunDiagnostics;
use crate::error::GraspError;
use crate::models::{
    Classification, CohortId, CombinedRow, CombinedTable, PerCohortCount, VariantCount, VariantKey,
};

pub const KEY_COLUMN: &str = "Gene_Nucleotide";
pub const COUNT_COLUMN: &str = "Sample_Count";
pub const SAMPLES_COLUMN: &str = "Samples";
pub const SAMPLE_DELIMITER: &str = ", ";
pub const COMBINED_DIR: &str = "all_cohorts";

/// Storage for the pipeline's intermediate tables
///
/// `read_*` returns `Ok(None)` when the table does not exist; rows that fail
/// to parse are recorded in `diagnostics` and skipped.
pub trait TableStore {
    fn write_cohort_counts(&mut self, table: &PerCohortCount) -> Result<(), GraspError>;

    /// Drop a previously written per-cohort table, if any
    fn remove_cohort_counts(&mut self, cohort: &CohortId, classification: &Classification) -> Result<(), GraspError>;

    fn read_cohort_counts(
        &self,
        cohort: &CohortId,
        classification: &Classification,
        diagnostics: &mut RunDiagnostics,
    ) -> Result<Option<PerCohortCount>, GraspError>;

    fn write_combined(&mut self, table: &CombinedTable) -> Result<(), GraspError>;

    /// Read a combined table, aligning its columns to `cohorts`
    fn read_combined(
        &self,
        classification: &Classification,
        cohorts: &[CohortId],
        diagnostics: &mut RunDiagnostics,
    ) -> Result<Option<CombinedTable>, GraspError>;

    /// Human-readable location of a per-cohort table, used in warnings
    fn cohort_counts_location(&self, cohort: &CohortId, classification: &Classification) -> PathBuf;
}

/// CSV-backed store rooted at a working directory
#[derive(Debug, Clone)]
pub struct FsTableStore {
    root: PathBuf,
}

impl FsTableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cohort_counts_path(&self, cohort: &CohortId, classification: &Classification) -> PathBuf {
        self.root
            .join(cohort.as_str())
            .join(format!("{}_{}_gene_nucleotide.csv", cohort, classification))
    }

    pub fn combined_path(&self, classification: &Classification) -> PathBuf {
        self.root
            .join(COMBINED_DIR)
            .join(format!("combined_cohorts_{}_gene_nucleotide.csv", classification))
    }
}

impl TableStore for FsTableStore {
    fn write_cohort_counts(&mut self, table: &PerCohortCount) -> Result<(), GraspError> {
        let path = self.cohort_counts_path(&table.cohort, &table.classification);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = WriterBuilder::new().from_path(&path)?;
        writer.write_record([KEY_COLUMN, COUNT_COLUMN, SAMPLES_COLUMN])?;
        for row in &table.rows {
            writer.write_record([
                row.variant_key.as_str(),
                row.sample_count.to_string().as_str(),
                row.samples.join(SAMPLE_DELIMITER).as_str(),
            ])?;
        }
        writer.flush()?;

        debug!("Wrote {} rows to {:?}", table.rows.len(), path);
        Ok(())
    }

    fn remove_cohort_counts(&mut self, cohort: &CohortId, classification: &Classification) -> Result<(), GraspError> {
        let path = self.cohort_counts_path(cohort, classification);
        if path.exists() {
            std::fs::remove_file(&path)?;
            debug!("Removed stale table {:?}", path);
        }
        Ok(())
    }

    fn read_cohort_counts(
        &self,
        cohort: &CohortId,
        classification: &Classification,
        diagnostics: &mut RunDiagnostics,
    ) -> Result<Option<PerCohortCount>, GraspError> {
        let path = self.cohort_counts_path(cohort, classification);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_path(&path)?;
        let headers = reader.headers()?.clone();
        let source_name = path.display().to_string();
        let key_idx = column_index(&headers, KEY_COLUMN, &source_name)?;
        let count_idx = column_index(&headers, COUNT_COLUMN, &source_name)?;
        let samples_idx = headers.iter().position(|h| h == SAMPLES_COLUMN);

        let mut table = PerCohortCount::empty(cohort.clone(), classification.clone());
        for (idx, result) in reader.records().enumerate() {
            let row = idx + 2;
            let parsed = result
                .map_err(|e| e.to_string())
                .and_then(|record| parse_count_row(&record, key_idx, count_idx, samples_idx));
            match parsed {
                Ok(count) => table.rows.push(count),
                Err(details) => diagnostics.record(GraspError::MalformedRecord {
                    source_name: source_name.clone(),
                    row,
                    details,
                })?,
            }
        }

        Ok(Some(table))
    }

    fn write_combined(&mut self, table: &CombinedTable) -> Result<(), GraspError> {
        let path = self.combined_path(&table.classification);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = WriterBuilder::new().from_path(&path)?;
        let mut header = vec![KEY_COLUMN.to_string()];
        header.extend(table.cohorts.iter().map(|c| c.to_string()));
        writer.write_record(&header)?;

        for row in &table.rows {
            let mut record = vec![row.variant_key.to_string()];
            record.extend(row.counts.iter().map(|c| c.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;

        info!("Combined data written for {}: {:?}", table.classification, path);
        Ok(())
    }

    fn read_combined(
        &self,
        classification: &Classification,
        cohorts: &[CohortId],
        diagnostics: &mut RunDiagnostics,
    ) -> Result<Option<CombinedTable>, GraspError> {
        let path = self.combined_path(classification);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_path(&path)?;
        let headers = reader.headers()?.clone();
        let source_name = path.display().to_string();
        let key_idx = column_index(&headers, KEY_COLUMN, &source_name)?;

        let mut table = CombinedTable::new(classification.clone(), cohorts.to_vec());
        let positions: Vec<Option<usize>> = cohorts
            .iter()
            .map(|cohort| headers.iter().position(|h| h == cohort.as_str()))
            .collect();
        for (cohort, pos) in cohorts.iter().zip(&positions) {
            if pos.is_none() {
                table.not_assessed.insert(cohort.clone());
                diagnostics.record(GraspError::MissingInput {
                    path: PathBuf::from(format!("{} (column {})", source_name, cohort)),
                })?;
            }
        }

        for (idx, result) in reader.records().enumerate() {
            let row = idx + 2;
            let parsed = result
                .map_err(|e| e.to_string())
                .and_then(|record| parse_combined_row(&record, key_idx, &positions, cohorts));
            match parsed {
                Ok(combined) => table.rows.push(combined),
                Err(details) => diagnostics.record(GraspError::MalformedRecord {
                    source_name: source_name.clone(),
                    row,
                    details,
                })?,
            }
        }

        Ok(Some(table))
    }

    fn cohort_counts_location(&self, cohort: &CohortId, classification: &Classification) -> PathBuf {
        self.cohort_counts_path(cohort, classification)
    }
}

fn column_index(headers: &StringRecord, name: &str, source_name: &str) -> Result<usize, GraspError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| GraspError::MalformedRecord {
            source_name: source_name.to_string(),
            row: 1,
            details: format!("missing column {}", name),
        })
}

fn parse_count_row(
    record: &StringRecord,
    key_idx: usize,
    count_idx: usize,
    samples_idx: Option<usize>,
) -> Result<VariantCount, String> {
    let key = record
        .get(key_idx)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| format!("missing {}", KEY_COLUMN))?;
    let raw_count = record.get(count_idx).unwrap_or("").trim();
    let sample_count: u32 = raw_count
        .parse()
        .map_err(|_| format!("non-numeric {} '{}'", COUNT_COLUMN, raw_count))?;

    let samples: Vec<String> = match samples_idx.and_then(|idx| record.get(idx)) {
        Some(list) if !list.trim().is_empty() => list
            .split(SAMPLE_DELIMITER.trim())
            .map(|s| s.trim().to_string())
            .collect(),
        _ => Vec::new(),
    };

    if samples_idx.is_some() && samples.len() != sample_count as usize {
        return Err(format!(
            "{} is {} but {} samples are listed",
            COUNT_COLUMN,
            sample_count,
            samples.len()
        ));
    }

    Ok(VariantCount {
        variant_key: VariantKey::from(key),
        sample_count,
        samples,
    })
}

fn parse_combined_row(
    record: &StringRecord,
    key_idx: usize,
    positions: &[Option<usize>],
    cohorts: &[CohortId],
) -> Result<CombinedRow, String> {
    let key = record
        .get(key_idx)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| format!("missing {}", KEY_COLUMN))?;

    let mut counts = Vec::with_capacity(positions.len());
    for (cohort, pos) in cohorts.iter().zip(positions) {
        let count = match pos {
            None => 0,
            Some(idx) => {
                let raw = record.get(*idx).unwrap_or("").trim();
                raw.parse::<u32>()
                    .map_err(|_| format!("non-numeric count '{}' for {}", raw, cohort))?
            }
        };
        counts.push(count);
    }

    Ok(CombinedRow {
        variant_key: VariantKey::from(key),
        counts,
    })
}

/// In-memory store; lets the stages run without touching the filesystem
#[derive(Debug, Clone, Default)]
pub struct MemoryTableStore {
    cohort_tables: BTreeMap<(CohortId, Classification), PerCohortCount>,
    combined_tables: BTreeMap<Classification, CombinedTable>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cohort_table_count(&self) -> usize {
        self.cohort_tables.len()
    }
}

impl TableStore for MemoryTableStore {
    fn write_cohort_counts(&mut self, table: &PerCohortCount) -> Result<(), GraspError> {
        self.cohort_tables.insert(
            (table.cohort.clone(), table.classification.clone()),
            table.clone(),
        );
        Ok(())
    }

    fn remove_cohort_counts(&mut self, cohort: &CohortId, classification: &Classification) -> Result<(), GraspError> {
        self.cohort_tables.remove(&(cohort.clone(), classification.clone()));
        Ok(())
    }

    fn read_cohort_counts(
        &self,
        cohort: &CohortId,
        classification: &Classification,
        _diagnostics: &mut RunDiagnostics,
    ) -> Result<Option<PerCohortCount>, GraspError> {
        Ok(self
            .cohort_tables
            .get(&(cohort.clone(), classification.clone()))
            .cloned())
    }

    fn write_combined(&mut self, table: &CombinedTable) -> Result<(), GraspError> {
        self.combined_tables.insert(table.classification.clone(), table.clone());
        Ok(())
    }

    fn read_combined(
        &self,
        classification: &Classification,
        cohorts: &[CohortId],
        _diagnostics: &mut RunDiagnostics,
    ) -> Result<Option<CombinedTable>, GraspError> {
        let Some(stored) = self.combined_tables.get(classification) else {
            return Ok(None);
        };

        // Realign stored columns to the requested cohort order
        let mut table = CombinedTable::new(classification.clone(), cohorts.to_vec());
        table.not_assessed = stored.not_assessed.clone();
        let positions: Vec<Option<usize>> = cohorts.iter().map(|c| stored.cohort_index(c)).collect();
        for (cohort, pos) in cohorts.iter().zip(&positions) {
            if pos.is_none() {
                table.not_assessed.insert(cohort.clone());
            }
        }
        table.rows = stored
            .rows
            .iter()
            .map(|row| CombinedRow {
                variant_key: row.variant_key.clone(),
                counts: positions
                    .iter()
                    .map(|pos| pos.and_then(|idx| row.counts.get(idx).copied()).unwrap_or(0))
                    .collect(),
            })
            .collect();
        Ok(Some(table))
    }

    fn cohort_counts_location(&self, cohort: &CohortId, classification: &Classification) -> PathBuf {
        PathBuf::from(format!("memory://{}/{}", cohort, classification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cohorts() -> Vec<CohortId> {
        vec!["Cohort_1".into(), "Cohort_2".into()]
    }

    #[test]
    fn test_fs_cohort_counts_roundtrip_layout() {
        let dir = TempDir::new().unwrap();
        let mut store = FsTableStore::new(dir.path());
        let table = PerCohortCount {
            cohort: "Cohort_1".into(),
            classification: Classification::Pathogenic,
            rows: vec![VariantCount {
                variant_key: "BRCA1_c.1A>G".into(),
                sample_count: 2,
                samples: vec!["S1".to_string(), "S2".to_string()],
            }],
        };
        store.write_cohort_counts(&table).unwrap();

        let path = dir
            .path()
            .join("Cohort_1")
            .join("Cohort_1_PATHOGENIC_gene_nucleotide.csv");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Gene_Nucleotide,Sample_Count,Samples\nBRCA1_c.1A>G,2,\"S1, S2\"\n"
        );

        let mut diagnostics = RunDiagnostics::new();
        let read = store
            .read_cohort_counts(&"Cohort_1".into(), &Classification::Pathogenic, &mut diagnostics)
            .unwrap()
            .unwrap();
        assert_eq!(read, table);
        assert!(diagnostics.is_clean());
    }

    #[test]
    fn test_fs_missing_table_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FsTableStore::new(dir.path());
        let mut diagnostics = RunDiagnostics::new();
        let read = store
            .read_cohort_counts(&"Cohort_3".into(), &Classification::Benign, &mut diagnostics)
            .unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn test_fs_malformed_count_rows_skipped() {
        let dir = TempDir::new().unwrap();
        let store = FsTableStore::new(dir.path());
        let path = store.cohort_counts_path(&"Cohort_1".into(), &Classification::Pathogenic);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "Gene_Nucleotide,Sample_Count,Samples\nA_c.1,two,S1\nB_c.2,1,S1\nC_c.3,3,\"S1, S2\"\n",
        )
        .unwrap();

        let mut diagnostics = RunDiagnostics::new();
        let read = store
            .read_cohort_counts(&"Cohort_1".into(), &Classification::Pathogenic, &mut diagnostics)
            .unwrap()
            .unwrap();
        assert_eq!(read.rows.len(), 1);
        assert_eq!(read.rows[0].variant_key.as_str(), "B_c.2");
        assert_eq!(diagnostics.malformed_records, 2);
    }

    #[test]
    fn test_fs_combined_missing_column_marked_not_assessed() {
        let dir = TempDir::new().unwrap();
        let store = FsTableStore::new(dir.path());
        let path = store.combined_path(&Classification::Pathogenic);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "Gene_Nucleotide,Cohort_1\nA_c.1,4\nB_c.2,x\n").unwrap();

        let mut diagnostics = RunDiagnostics::new();
        let table = store
            .read_combined(&Classification::Pathogenic, &cohorts(), &mut diagnostics)
            .unwrap()
            .unwrap();

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].counts, vec![4, 0]);
        assert!(table.not_assessed.contains(&CohortId::from("Cohort_2")));
        assert_eq!(diagnostics.missing_inputs, 1);
        assert_eq!(diagnostics.malformed_records, 1);
    }

    #[test]
    fn test_fs_combined_write_then_read() {
        let dir = TempDir::new().unwrap();
        let mut store = FsTableStore::new(dir.path());
        let mut table = CombinedTable::new(Classification::LikelyPathogenic, cohorts());
        table.rows.push(CombinedRow {
            variant_key: "TP53_c.215C>G".into(),
            counts: vec![0, 7],
        });
        store.write_combined(&table).unwrap();

        let contents = std::fs::read_to_string(store.combined_path(&Classification::LikelyPathogenic)).unwrap();
        assert_eq!(contents, "Gene_Nucleotide,Cohort_1,Cohort_2\nTP53_c.215C>G,0,7\n");

        let mut diagnostics = RunDiagnostics::new();
        let read = store
            .read_combined(&Classification::LikelyPathogenic, &cohorts(), &mut diagnostics)
            .unwrap()
            .unwrap();
        assert_eq!(read.rows, table.rows);
    }

    #[test]
    fn test_memory_store_realigns_columns() {
        let mut store = MemoryTableStore::new();
        let mut table = CombinedTable::new(Classification::Pathogenic, cohorts());
        table.rows.push(CombinedRow {
            variant_key: "A_c.1".into(),
            counts: vec![1, 2],
        });
        store.write_combined(&table).unwrap();

        let reordered = vec![CohortId::from("Cohort_2"), CohortId::from("Cohort_1"), CohortId::from("Cohort_9")];
        let mut diagnostics = RunDiagnostics::new();
        let read = store
            .read_combined(&Classification::Pathogenic, &reordered, &mut diagnostics)
            .unwrap()
            .unwrap();
        assert_eq!(read.rows[0].counts, vec![2, 1, 0]);
        assert!(read.not_assessed.contains(&CohortId::from("Cohort_9")));
    }

    #[test]
    fn test_fs_remove_stale_table() {
        let dir = TempDir::new().unwrap();
        let mut store = FsTableStore::new(dir.path());
        let table = PerCohortCount::empty("Cohort_2".into(), Classification::Benign);
        store.write_cohort_counts(&table).unwrap();
        assert!(store.cohort_counts_path(&table.cohort, &table.classification).exists());

        store.remove_cohort_counts(&table.cohort, &table.classification).unwrap();
        store.remove_cohort_counts(&table.cohort, &table.classification).unwrap();

        let mut diagnostics = RunDiagnostics::new();
        let read = store
            .read_cohort_counts(&table.cohort, &table.classification, &mut diagnostics)
            .unwrap();
        assert!(read.is_none());
    }
}
