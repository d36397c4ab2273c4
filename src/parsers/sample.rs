// ==============================================================================
// sample.rs - Cleaned Per-Sample Variant Parser
// ==============================================================================
// Description: Reads cleaned per-sample variant tables (one file per sample)
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Format: CSV with header, optionally gzip-compressed (.csv.gz)
// Example:
//   Gene,Nucleotide,Genoox_Classification,Zygosity,Inheritance_Model
//   BRCA2,c.7397T>C,BENIGN,HOM,AD
//   TP53,c.215C>G,LIKELY_BENIGN,HET,AD
// The sample identifier is the file name without its extension.
// ==============================================================================

use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Classification, SampleRecord};

pub const GENE_COLUMN: &str = "Gene";
pub const NUCLEOTIDE_COLUMN: &str = "Nucleotide";
/// Accepted spellings of the classification column
pub const CLASSIFICATION_COLUMNS: [&str; 2] = ["Genoox_Classification", "Genoox Classification"];

/// Errors that can occur while opening a sample file
#[derive(Error, Debug)]
pub enum SampleParseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Cannot derive sample name from {0}")]
    InvalidFileName(String),
}

/// Parsed sample file plus rows that had to be skipped
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFile {
    pub sample_id: String,
    pub records: Vec<SampleRecord>,
    /// (row number, reason) for every skipped row
    pub skipped: Vec<(usize, String)>,
}

/// Column positions resolved from a header row
#[derive(Debug, Clone, Copy)]
pub struct SampleColumns {
    gene: usize,
    nucleotide: usize,
    classification: usize,
}

impl SampleColumns {
    pub fn resolve(headers: &StringRecord) -> Result<Self, SampleParseError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let gene = find(GENE_COLUMN)
            .ok_or_else(|| SampleParseError::MissingColumn(GENE_COLUMN.to_string()))?;
        let nucleotide = find(NUCLEOTIDE_COLUMN)
            .ok_or_else(|| SampleParseError::MissingColumn(NUCLEOTIDE_COLUMN.to_string()))?;
        let classification = CLASSIFICATION_COLUMNS
            .iter()
            .find_map(|name| find(name))
            .ok_or_else(|| SampleParseError::MissingColumn(CLASSIFICATION_COLUMNS[0].to_string()))?;

        Ok(Self {
            gene,
            nucleotide,
            classification,
        })
    }
}

/// Sample name for a file: "P001.csv" -> "P001", "P001.csv.gz" -> "P001"
pub fn sample_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name
        .strip_suffix(".csv.gz")
        .or_else(|| name.strip_suffix(".csv"))?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Parser for cleaned sample tables
pub struct SampleParser;

impl SampleParser {
    /// Parse one sample file
    ///
    /// Rows with an empty gene, nucleotide or classification are skipped and
    /// reported in `SampleFile::skipped`; the rest of the file still loads.
    pub fn parse(path: impl AsRef<Path>) -> Result<SampleFile, SampleParseError> {
        let path = path.as_ref();
        let sample_id = sample_id_from_path(path)
            .ok_or_else(|| SampleParseError::InvalidFileName(path.display().to_string()))?;

        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.to_string_lossy().ends_with(".gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let parsed = Self::parse_reader(reader, &sample_id)?;
        debug!(
            "Parsed {} records from sample {} ({} skipped)",
            parsed.records.len(),
            sample_id,
            parsed.skipped.len()
        );
        Ok(parsed)
    }

    /// Parse sample records from any reader
    pub fn parse_reader<R: Read>(reader: R, sample_id: &str) -> Result<SampleFile, SampleParseError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let columns = SampleColumns::resolve(&headers)?;

        let mut records = Vec::new();
        let mut skipped = Vec::new();

        for (idx, result) in csv_reader.records().enumerate() {
            // Header is row 1
            let row = idx + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable row {} in sample {}: {}", row, sample_id, e);
                    skipped.push((row, e.to_string()));
                    continue;
                }
            };

            match Self::parse_row(&record, &columns, sample_id) {
                Ok(parsed) => records.push(parsed),
                Err(reason) => {
                    warn!("Skipping malformed row {} in sample {}: {}", row, sample_id, reason);
                    skipped.push((row, reason));
                }
            }
        }

        Ok(SampleFile {
            sample_id: sample_id.to_string(),
            records,
            skipped,
        })
    }

    fn parse_row(
        record: &StringRecord,
        columns: &SampleColumns,
        sample_id: &str,
    ) -> Result<SampleRecord, String> {
        let field = |idx: usize, name: &str| -> Result<String, String> {
            match record.get(idx).map(str::trim) {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                _ => Err(format!("missing {}", name)),
            }
        };

        let gene = field(columns.gene, GENE_COLUMN)?;
        let nucleotide = field(columns.nucleotide, NUCLEOTIDE_COLUMN)?;
        let label = field(columns.classification, CLASSIFICATION_COLUMNS[0])?;

        Ok(SampleRecord {
            gene,
            nucleotide,
            classification: Classification::from_label(&label),
            sample_id: sample_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "P001.csv",
            "Gene,Nucleotide,Genoox_Classification,Zygosity,Inheritance_Model
BRCA2,c.7397T>C,BENIGN,HOM,AD
TP53,c.215C>G,PATHOGENIC,HET,AD
",
        );

        let parsed = SampleParser::parse(&path).unwrap();
        assert_eq!(parsed.sample_id, "P001");
        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.skipped.is_empty());

        assert_eq!(parsed.records[1].gene, "TP53");
        assert_eq!(parsed.records[1].nucleotide, "c.215C>G");
        assert_eq!(parsed.records[1].classification, Classification::Pathogenic);
        assert_eq!(parsed.records[1].sample_id, "P001");
    }

    #[test]
    fn test_space_separated_classification_header() {
        let data = "Gene,Nucleotide,Genoox Classification\nMYH7,c.1A>G,LIKELY_PATHOGENIC\n";
        let parsed = SampleParser::parse_reader(data.as_bytes(), "S2").unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].classification, Classification::LikelyPathogenic);
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let data = "\
Gene,Nucleotide,Genoox_Classification
BRCA1,,PATHOGENIC
,c.2G>A,PATHOGENIC
BRCA1,c.3C>T,
BRCA1,c.4C>T,PATHOGENIC
";
        let parsed = SampleParser::parse_reader(data.as_bytes(), "S3").unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.skipped.len(), 3);
        assert_eq!(parsed.skipped[0].0, 2);
        assert_eq!(parsed.skipped[0].1, "missing Nucleotide");
    }

    #[test]
    fn test_missing_column() {
        let data = "Gene,Classification\nBRCA1,PATHOGENIC\n";
        match SampleParser::parse_reader(data.as_bytes(), "S4") {
            Err(SampleParseError::MissingColumn(column)) => assert_eq!(column, "Nucleotide"),
            other => panic!("Expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_gzip_sample() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("P002.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(b"Gene,Nucleotide,Genoox_Classification\nLDLR,c.10A>T,PATHOGENIC\n")
            .unwrap();
        encoder.finish().unwrap();

        let parsed = SampleParser::parse(&path).unwrap();
        assert_eq!(parsed.sample_id, "P002");
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_sample_id_from_path() {
        assert_eq!(sample_id_from_path(Path::new("/a/P001.csv")), Some("P001".to_string()));
        assert_eq!(sample_id_from_path(Path::new("P001.csv.gz")), Some("P001".to_string()));
        assert_eq!(sample_id_from_path(Path::new("notes.txt")), None);
        assert_eq!(sample_id_from_path(Path::new(".csv")), None);
    }
}
