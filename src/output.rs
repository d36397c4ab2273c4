// ==============================================================================
// output.rs - Multi-Format Candidate Report Generation
// ==============================================================================
// Description: Writes the ranked candidate list as the terminal CSV table and
//              as structured reports (JSON, Parquet, SQLite)
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Every writer replaces its target file. Reports carry no timestamps, so two
// runs over identical inputs produce identical files.
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

// Apache Arrow/Parquet for columnar data
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

// SQLite for queryable database
use rusqlite::{params, Connection};

use crate::config::{CohortConfig, PipelineConfig};
use crate::diagnostics::RunDiagnostics;
use crate::models::{CandidateRecord, Classification, CohortId};
use crate::validator::ValidatedInput;

/// Base file name shared by every report format
pub const REPORT_STEM: &str = "candidate_variants";

/// Supported output formats for the candidate report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Flat table (terminal artifact, always written)
    Csv,
    /// Structured report with run metadata
    Json,
    /// Apache Parquet (best for data science: Python, R, Spark)
    Parquet,
    /// SQLite database (best for querying and exploration)
    Sqlite,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Parquet => "parquet",
            OutputFormat::Sqlite => "db",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", REPORT_STEM, self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "parquet" => Ok(OutputFormat::Parquet),
            "sqlite" | "db" => Ok(OutputFormat::Sqlite),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Complete candidate report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub metadata: ReportMetadata,
    pub candidates: Vec<CandidateOutput>,
}

/// Run configuration and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub cohorts: Vec<CohortConfig>,
    pub case_cohort: CohortId,
    pub control_cohorts: Vec<CohortId>,
    pub classifications: Vec<Classification>,
    pub difference_threshold: f64,
    pub significance_threshold: f64,
    pub inputs: Vec<InputManifestEntry>,
    pub not_assessed: Vec<NotAssessedEntry>,
    pub diagnostics: RunDiagnostics,
    pub total_candidates: usize,
}

/// One validated sample file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputManifestEntry {
    pub cohort: CohortId,
    pub sample_id: String,
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
}

impl InputManifestEntry {
    pub fn from_validated(cohort: &CohortId, input: &ValidatedInput) -> Self {
        Self {
            cohort: cohort.clone(),
            sample_id: input.sample_id.clone(),
            file_name: input.file_name.clone(),
            size: input.size,
            sha256: input.hash_sha256.clone(),
        }
    }
}

/// A (classification, cohort) pair whose table was missing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotAssessedEntry {
    pub classification: Classification,
    pub cohort: CohortId,
}

/// Candidate row for output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutput {
    pub rank: usize,
    pub variant_key: String,
    pub classification: String,
    pub counts: BTreeMap<String, u32>,
    pub proportional_difference: f64,
    pub p_value: f64,
}

impl CandidateReport {
    pub fn build(
        config: &PipelineConfig,
        candidates: &[CandidateRecord],
        inputs: Vec<InputManifestEntry>,
        not_assessed: Vec<NotAssessedEntry>,
        diagnostics: RunDiagnostics,
    ) -> Self {
        let candidates: Vec<CandidateOutput> = candidates
            .iter()
            .enumerate()
            .map(|(idx, c)| CandidateOutput {
                rank: idx + 1,
                variant_key: c.variant_key.to_string(),
                classification: c.classification.to_string(),
                counts: c
                    .counts
                    .iter()
                    .map(|(cohort, count)| (cohort.to_string(), *count))
                    .collect(),
                proportional_difference: c.proportional_difference,
                p_value: c.p_value,
            })
            .collect();

        Self {
            metadata: ReportMetadata {
                cohorts: config.cohorts.clone(),
                case_cohort: config.case_cohort.clone(),
                control_cohorts: config.control_cohorts.clone(),
                classifications: config.classifications.clone(),
                difference_threshold: config.difference_threshold,
                significance_threshold: config.significance_threshold,
                inputs,
                not_assessed,
                diagnostics,
                total_candidates: candidates.len(),
            },
            candidates,
        }
    }

    /// Cohort columns in configured order
    pub fn cohort_columns(&self) -> Vec<String> {
        self.metadata.cohorts.iter().map(|c| c.id.to_string()).collect()
    }
}

/// Multi-format report generator
pub struct OutputGenerator {
    output_dir: PathBuf,
}

impl OutputGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, format: OutputFormat) -> PathBuf {
        self.output_dir.join(format.file_name())
    }

    /// Generate the report in every requested format
    ///
    /// # Returns
    /// * Map of format -> written file path
    pub fn generate(
        &self,
        formats: &[OutputFormat],
        report: &CandidateReport,
    ) -> Result<BTreeMap<OutputFormat, PathBuf>> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))?;

        let mut result = BTreeMap::new();
        for format in formats {
            let path = self.path_for(*format);
            match format {
                OutputFormat::Csv => generate_csv(&path, report)?,
                OutputFormat::Json => generate_json(&path, report)?,
                OutputFormat::Parquet => generate_parquet(&path, report)?,
                OutputFormat::Sqlite => generate_sqlite(&path, report)?,
            }
            result.insert(*format, path);
        }

        Ok(result)
    }
}

/// Terminal table: Gene_Nucleotide, Classification, <cohorts>, Proportional_Difference, p_value
fn generate_csv(path: &Path, report: &CandidateReport) -> Result<()> {
    info!("Generating CSV output: {:?}", path);

    let cohorts = report.cohort_columns();
    let mut writer = csv::Writer::from_path(path).context("Failed to create CSV output file")?;

    let mut header = vec!["Gene_Nucleotide".to_string(), "Classification".to_string()];
    header.extend(cohorts.iter().cloned());
    header.push("Proportional_Difference".to_string());
    header.push("p_value".to_string());
    writer.write_record(&header)?;

    for candidate in &report.candidates {
        let mut record = vec![candidate.variant_key.clone(), candidate.classification.clone()];
        record.extend(
            cohorts
                .iter()
                .map(|c| candidate.counts.get(c).copied().unwrap_or(0).to_string()),
        );
        record.push(format_decimal(candidate.proportional_difference));
        record.push(format_decimal(candidate.p_value));
        writer.write_record(&record)?;
    }
    writer.flush().context("Failed to flush CSV output")?;

    info!("CSV output complete: {} candidates", report.candidates.len());
    Ok(())
}

/// Shortest round-trip decimal, keeping ".0" on whole numbers ("0.0", not "0")
fn format_decimal(value: f64) -> String {
    // Adding 0.0 folds -0.0 into 0.0
    let value = value + 0.0;
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn generate_json(path: &Path, report: &CandidateReport) -> Result<()> {
    info!("Generating JSON output: {:?}", path);

    let file = std::fs::File::create(path).context("Failed to create JSON output file")?;
    serde_json::to_writer_pretty(file, report).context("Failed to write JSON output")?;

    info!(
        "JSON output complete: {} candidates, {} input files",
        report.candidates.len(),
        report.metadata.inputs.len()
    );
    Ok(())
}

/// Generate Parquet output (one column per cohort count)
fn generate_parquet(path: &Path, report: &CandidateReport) -> Result<()> {
    info!("Generating Parquet output: {:?}", path);

    let cohorts = report.cohort_columns();
    let candidates = &report.candidates;

    let mut fields = vec![
        Field::new("rank", DataType::UInt64, false),
        Field::new("variant_key", DataType::Utf8, false),
        Field::new("classification", DataType::Utf8, false),
    ];
    fields.extend(cohorts.iter().map(|c| Field::new(c.as_str(), DataType::UInt32, false)));
    fields.push(Field::new("proportional_difference", DataType::Float64, false));
    fields.push(Field::new("p_value", DataType::Float64, false));
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(
            candidates.iter().map(|c| c.rank as u64).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            candidates.iter().map(|c| c.variant_key.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            candidates.iter().map(|c| c.classification.as_str()).collect::<Vec<_>>(),
        )),
    ];
    for cohort in &cohorts {
        columns.push(Arc::new(UInt32Array::from(
            candidates
                .iter()
                .map(|c| c.counts.get(cohort).copied().unwrap_or(0))
                .collect::<Vec<_>>(),
        )));
    }
    columns.push(Arc::new(Float64Array::from(
        candidates.iter().map(|c| c.proportional_difference).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(Float64Array::from(
        candidates.iter().map(|c| c.p_value).collect::<Vec<_>>(),
    )));

    let batch = RecordBatch::try_new(schema.clone(), columns)
        .context("Failed to create Arrow RecordBatch")?;

    let file = std::fs::File::create(path).context("Failed to create Parquet file")?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .context("Failed to create Parquet writer")?;
    writer.write(&batch).context("Failed to write Parquet data")?;
    writer.close().context("Failed to close Parquet writer")?;

    info!("Parquet output complete: {} candidates", candidates.len());
    Ok(())
}

/// Generate SQLite output (candidates, per-cohort counts, metadata)
fn generate_sqlite(path: &Path, report: &CandidateReport) -> Result<()> {
    info!("Generating SQLite output: {:?}", path);

    if path.exists() {
        std::fs::remove_file(path).context("Failed to replace existing SQLite database")?;
    }
    let mut conn = Connection::open(path).context("Failed to create SQLite database")?;

    conn.execute(
        "CREATE TABLE candidates (
            rank INTEGER PRIMARY KEY,
            variant_key TEXT NOT NULL,
            classification TEXT NOT NULL,
            proportional_difference REAL NOT NULL,
            p_value REAL NOT NULL
        )",
        [],
    )
    .context("Failed to create candidates table")?;

    conn.execute(
        "CREATE TABLE candidate_counts (
            rank INTEGER NOT NULL REFERENCES candidates(rank),
            cohort TEXT NOT NULL,
            count INTEGER NOT NULL,
            PRIMARY KEY (rank, cohort)
        )",
        [],
    )
    .context("Failed to create candidate_counts table")?;

    conn.execute(
        "CREATE TABLE metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create metadata table")?;

    let metadata_items = vec![
        ("case_cohort", report.metadata.case_cohort.to_string()),
        (
            "control_cohorts",
            report
                .metadata
                .control_cohorts
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(","),
        ),
        ("difference_threshold", report.metadata.difference_threshold.to_string()),
        ("significance_threshold", report.metadata.significance_threshold.to_string()),
        ("total_candidates", report.metadata.total_candidates.to_string()),
        ("input_files", report.metadata.inputs.len().to_string()),
        ("skipped_items", report.metadata.diagnostics.total().to_string()),
    ];

    let tx = conn.transaction().context("Failed to start transaction")?;
    {
        let mut stmt_meta = tx
            .prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")
            .context("Failed to prepare metadata insert")?;
        for (key, value) in &metadata_items {
            stmt_meta
                .execute(params![key, value])
                .context("Failed to insert metadata")?;
        }
        for cohort in &report.metadata.cohorts {
            stmt_meta
                .execute(params![format!("cohort_size.{}", cohort.id), cohort.size.to_string()])
                .context("Failed to insert cohort size")?;
        }

        let mut stmt_candidate = tx
            .prepare(
                "INSERT INTO candidates (rank, variant_key, classification, proportional_difference, p_value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .context("Failed to prepare candidates insert statement")?;
        let mut stmt_count = tx
            .prepare("INSERT INTO candidate_counts (rank, cohort, count) VALUES (?1, ?2, ?3)")
            .context("Failed to prepare candidate_counts insert statement")?;

        for candidate in &report.candidates {
            stmt_candidate
                .execute(params![
                    candidate.rank as i64,
                    candidate.variant_key,
                    candidate.classification,
                    candidate.proportional_difference,
                    candidate.p_value,
                ])
                .context("Failed to insert candidate")?;

            for (cohort, count) in &candidate.counts {
                stmt_count
                    .execute(params![candidate.rank as i64, cohort, count])
                    .context("Failed to insert candidate count")?;
            }
        }
    }
    tx.commit().context("Failed to commit candidates")?;

    conn.execute(
        "CREATE INDEX idx_candidates_classification ON candidates(classification)",
        [],
    )
    .context("Failed to create classification index")?;

    info!("SQLite output complete: {} candidates", report.candidates.len());
    Ok(())
}
