// ==============================================================================
// franklin.rs - Raw Variant Export Cleaner
// ==============================================================================
// Description: Merges the default and UTR variant exports of one sample,
//              keeps the analysis columns, strips stray quoting and drops
//              duplicate (Gene, Nucleotide) rows
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Raw layout per cohort folder:
//   <sample>_single_snp_variants.csv       (default export)
//   <sample>_single_snp_variants (1).csv   (UTR export)
// Cleaned output: <sample>.csv with the KEPT_COLUMNS header
// ==============================================================================

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_EXPORT_SUFFIX: &str = "_single_snp_variants.csv";
pub const UTR_EXPORT_SUFFIX: &str = "_single_snp_variants (1).csv";
const EXPORT_MARKER: &str = "_single_snp_variants";

/// Columns retained in cleaned sample files
pub const KEPT_COLUMNS: [&str; 5] = [
    "Gene",
    "Nucleotide",
    "Genoox_Classification",
    "Zygosity",
    "Inheritance_Model",
];

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Default export not found: {0}")]
    MissingExport(PathBuf),
}

/// Outcome of cleaning one sample
#[derive(Debug, Clone, PartialEq)]
pub struct CleanSummary {
    pub sample_id: String,
    pub output: PathBuf,
    pub rows_written: usize,
    pub duplicates_dropped: usize,
    /// False when the UTR export was absent and only the default export was used
    pub utr_merged: bool,
}

/// Cleaner for raw per-sample variant exports
pub struct FranklinCleaner;

impl FranklinCleaner {
    /// Distinct sample names in a raw cohort folder, in sorted order
    pub fn discover_samples(raw_dir: &Path) -> Result<Vec<String>, CleanError> {
        let mut samples = BTreeSet::new();
        for entry in std::fs::read_dir(raw_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(idx) = name.find(EXPORT_MARKER) {
                samples.insert(name[..idx].to_string());
            }
        }
        Ok(samples.into_iter().collect())
    }

    /// Clean one sample's exports from `raw_dir` into `out_dir/<sample>.csv`
    pub fn clean_sample(raw_dir: &Path, sample_id: &str, out_dir: &Path) -> Result<CleanSummary, CleanError> {
        let default_path = raw_dir.join(format!("{}{}", sample_id, DEFAULT_EXPORT_SUFFIX));
        let utr_path = raw_dir.join(format!("{}{}", sample_id, UTR_EXPORT_SUFFIX));
        let output = out_dir.join(format!("{}.csv", sample_id));

        if !default_path.exists() {
            return Err(CleanError::MissingExport(default_path));
        }

        let mut rows = Self::read_export(&default_path)?;
        let utr_merged = utr_path.exists();
        if utr_merged {
            rows.extend(Self::read_export(&utr_path)?);
        } else {
            warn!("Missing input: UTR export {:?} not found, cleaning default export only", utr_path);
        }

        std::fs::create_dir_all(out_dir)?;
        let mut writer = WriterBuilder::new().from_path(&output)?;
        writer.write_record(KEPT_COLUMNS)?;

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut rows_written = 0;
        let mut duplicates_dropped = 0;

        for row in rows {
            let uid = (row[0].clone(), row[1].clone());
            if !seen.insert(uid) {
                duplicates_dropped += 1;
                continue;
            }
            writer.write_record(&row)?;
            rows_written += 1;
        }
        writer.flush()?;

        if duplicates_dropped > 0 {
            warn!(
                "Duplicate entries found in {:?}: {} dropped",
                output, duplicates_dropped
            );
        } else {
            info!("{:?}: no duplicates found", output);
        }

        Ok(CleanSummary {
            sample_id: sample_id.to_string(),
            output,
            rows_written,
            duplicates_dropped,
            utr_merged,
        })
    }

    /// Read an export, projecting each row onto KEPT_COLUMNS
    fn read_export(path: &Path) -> Result<Vec<Vec<String>>, CleanError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        let positions: Vec<Option<usize>> = KEPT_COLUMNS
            .iter()
            .map(|column| headers.iter().position(|h| strip_quotes(h) == *column))
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record: StringRecord = result?;
            rows.push(
                positions
                    .iter()
                    .map(|pos| {
                        pos.and_then(|idx| record.get(idx))
                            .map(strip_quotes)
                            .unwrap_or_default()
                    })
                    .collect(),
            );
        }
        Ok(rows)
    }
}

/// Remove doubled quotes and surrounding quotes left by the exporter
pub fn strip_quotes(value: &str) -> String {
    value.replace("\"\"", "").trim_matches('"').to_string()
}
