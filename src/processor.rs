// ==============================================================================
// processor.rs - Pipeline Orchestration
// ==============================================================================
// Description: Drives clean -> count -> combine -> candidates over a working
//              directory and writes the candidate reports
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Directory layout:
//   <raw_dir>/<cohort>_raw/        raw exports (clean stage only)
//   <input_dir>/<cohort>/          cleaned per-sample files (*.csv, *.csv.gz)
//   <work_dir>/<cohort>/           per-cohort count tables
//   <work_dir>/all_cohorts/        combined tables
//   <output_dir>/                  candidate_variants.{csv,json,parquet,db}
// ==============================================================================

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::candidate::CandidateSelector;
use crate::combiner::Combiner;
use crate::config::PipelineConfig;
use crate::counter::Counter;
use crate::diagnostics::RunDiagnostics;
use crate::error::GraspError;
use crate::models::{CandidateRecord, Classification, CohortId, CombinedTable, SampleRecord};
use crate::output::{CandidateReport, InputManifestEntry, NotAssessedEntry, OutputFormat, OutputGenerator};
use crate::parsers::{CleanError, CleanSummary, FranklinCleaner, SampleParser};
use crate::store::{FsTableStore, TableStore};
use crate::validator::FileValidator;

/// Suffix of raw cohort folders under the raw directory
pub const RAW_FOLDER_SUFFIX: &str = "_raw";

/// Directories used by a run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelinePaths {
    pub raw_dir: Option<PathBuf>,
    pub input_dir: PathBuf,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl PipelinePaths {
    /// Conventional layout under one working directory
    pub fn under(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            raw_dir: None,
            input_dir: work_dir.join("cleaned"),
            output_dir: work_dir.join("results"),
            work_dir,
        }
    }
}

/// Outcome of the candidate stage
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub candidates: Vec<CandidateRecord>,
    pub outputs: BTreeMap<OutputFormat, PathBuf>,
    pub diagnostics: RunDiagnostics,
}

pub struct GraspProcessor {
    config: PipelineConfig,
    paths: PipelinePaths,
    formats: Vec<OutputFormat>,
    validator: FileValidator,
    diagnostics: RunDiagnostics,
    manifest: Vec<InputManifestEntry>,
    /// Cohorts without a per-cohort table, as seen by the combine stage
    not_assessed: BTreeMap<Classification, BTreeSet<CohortId>>,
}

impl GraspProcessor {
    /// Create a processor; the configuration is validated before anything runs
    pub fn new(config: PipelineConfig, paths: PipelinePaths) -> Result<Self> {
        config.validate().context("Invalid pipeline configuration")?;

        Ok(Self {
            config,
            paths,
            formats: vec![OutputFormat::Csv, OutputFormat::Json],
            validator: FileValidator::new(),
            diagnostics: RunDiagnostics::new(),
            manifest: Vec::new(),
            not_assessed: BTreeMap::new(),
        })
    }

    /// Select report formats; the CSV table is always written
    pub fn with_formats(mut self, formats: &[OutputFormat]) -> Self {
        let mut selected: BTreeSet<OutputFormat> = formats.iter().copied().collect();
        selected.insert(OutputFormat::Csv);
        self.formats = selected.into_iter().collect();
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &RunDiagnostics {
        &self.diagnostics
    }

    /// Run every stage; cleaning only when a raw directory is configured
    pub fn run(&mut self) -> Result<RunSummary> {
        info!(
            "Starting GRASP run: {} cohorts, case {}, controls {:?}",
            self.config.cohorts.len(),
            self.config.case_cohort,
            self.config.control_cohorts.iter().map(|c| c.as_str()).collect::<Vec<_>>()
        );

        if self.paths.raw_dir.is_some() {
            self.clean()?;
        } else {
            debug!("No raw directory configured, skipping clean stage");
        }
        self.count()?;
        self.combine()?;
        let summary = self.candidates()?;

        info!(
            "Run complete: {} candidates, {} recoverable issues",
            summary.candidates.len(),
            summary.diagnostics.total()
        );
        Ok(summary)
    }

    /// Clean raw exports into per-sample files under the input directory
    pub fn clean(&mut self) -> Result<Vec<CleanSummary>> {
        let raw_dir = self
            .paths
            .raw_dir
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Clean stage requires a raw directory"))?;
        info!("Cleaning raw exports from {:?}", raw_dir);

        let mut summaries = Vec::new();
        for cohort in self.config.cohort_ids() {
            let cohort_raw = raw_dir.join(format!("{}{}", cohort, RAW_FOLDER_SUFFIX));
            if !cohort_raw.is_dir() {
                self.diagnostics.record(GraspError::MissingInput { path: cohort_raw })?;
                continue;
            }

            let samples = FranklinCleaner::discover_samples(&cohort_raw)
                .with_context(|| format!("Failed to list raw exports in {:?}", cohort_raw))?;
            if samples.is_empty() {
                warn!("Skipping empty raw folder {:?}", cohort_raw);
                continue;
            }

            let out_dir = self.paths.input_dir.join(cohort.as_str());
            for sample in &samples {
                match FranklinCleaner::clean_sample(&cohort_raw, sample, &out_dir) {
                    Ok(summary) => summaries.push(summary),
                    Err(CleanError::MissingExport(path)) => {
                        self.diagnostics.record(GraspError::MissingInput { path })?
                    }
                    Err(e) => {
                        return Err(e).with_context(|| format!("Failed to clean sample {}", sample))
                    }
                }
            }
            info!("{}: {} samples cleaned", cohort, samples.len());
        }

        Ok(summaries)
    }

    /// Count every cohort's cleaned samples and write the per-cohort tables
    pub fn count(&mut self) -> Result<usize> {
        info!("Counting variants from {:?}", self.paths.input_dir);

        let counter = Counter::from_config(&self.config);
        let mut store = FsTableStore::new(&self.paths.work_dir);
        self.manifest.clear();
        let mut written = 0;

        for cohort in self.config.cohorts.clone() {
            let cohort_dir = self.paths.input_dir.join(cohort.id.as_str());
            if !cohort_dir.is_dir() {
                self.diagnostics.record(GraspError::MissingInput { path: cohort_dir })?;
                for classification in &self.config.classifications {
                    store.remove_cohort_counts(&cohort.id, classification)?;
                }
                continue;
            }

            let (records, sample_count) = self.load_cohort(&cohort.id, &cohort_dir)?;
            if sample_count > cohort.size as usize {
                warn!(
                    "{}: {} sample files found but cohort size is {}",
                    cohort.id, sample_count, cohort.size
                );
            }

            for table in counter.count(&cohort.id, records) {
                store
                    .write_cohort_counts(&table)
                    .with_context(|| format!("Failed to write counts for {}", cohort.id))?;
                written += 1;
            }
        }

        info!("Counting complete: {} tables written", written);
        Ok(written)
    }

    /// Validate and parse one cohort's sample files in file-name order
    fn load_cohort(&mut self, cohort: &CohortId, dir: &Path) -> Result<(Vec<SampleRecord>, usize)> {
        let mut records = Vec::new();
        let mut samples = 0;

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !self.validator.is_candidate(path) {
                debug!("Ignoring {:?}", path);
                continue;
            }

            let validated = match self.validator.validate_sample(path) {
                Ok(validated) => validated,
                Err(e) => {
                    self.diagnostics.record(GraspError::MalformedRecord {
                        source_name: path.display().to_string(),
                        row: 0,
                        details: e.to_string(),
                    })?;
                    continue;
                }
            };

            let parsed = match SampleParser::parse(path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.diagnostics.record(GraspError::MalformedRecord {
                        source_name: path.display().to_string(),
                        row: 0,
                        details: e.to_string(),
                    })?;
                    continue;
                }
            };

            for (row, details) in parsed.skipped {
                self.diagnostics.record(GraspError::MalformedRecord {
                    source_name: path.display().to_string(),
                    row,
                    details,
                })?;
            }

            self.manifest.push(InputManifestEntry::from_validated(cohort, &validated));
            records.extend(parsed.records);
            samples += 1;
        }

        if samples == 0 {
            warn!("{}: no sample files in {:?}", cohort, dir);
        }
        Ok((records, samples))
    }

    /// Merge per-cohort tables into combined tables
    pub fn combine(&mut self) -> Result<Vec<CombinedTable>> {
        info!("Combining cohort tables in {:?}", self.paths.work_dir);

        let mut store = FsTableStore::new(&self.paths.work_dir);
        let combined = Combiner::from_config(&self.config)
            .combine(&mut store, &mut self.diagnostics)
            .context("Combine stage failed")?;

        self.not_assessed = combined
            .iter()
            .map(|t| (t.classification.clone(), t.not_assessed.clone()))
            .collect();
        Ok(combined)
    }

    /// Re-read the combined tables, select candidates and write the reports
    pub fn candidates(&mut self) -> Result<RunSummary> {
        info!("Selecting candidates");

        let selector = CandidateSelector::from_config(&self.config)?;
        let store = FsTableStore::new(&self.paths.work_dir);
        let cohorts = self.config.cohort_ids();

        let mut tables = Vec::with_capacity(self.config.classifications.len());
        for classification in &self.config.classifications {
            let read = store
                .read_combined(classification, &cohorts, &mut self.diagnostics)
                .with_context(|| format!("Failed to read combined table for {}", classification))?;

            let Some(mut table) = read else {
                let path = store.combined_path(classification);
                if self.config.strict_inputs {
                    return Err(GraspError::MissingInput { path }.into());
                }
                self.diagnostics.record(GraspError::MissingInput { path })?;
                continue;
            };

            if let Some(gaps) = self.not_assessed.get(classification) {
                table.not_assessed.extend(gaps.iter().cloned());
            }
            tables.push(table);
        }

        let candidates = selector.select(&tables, &mut self.diagnostics)?;

        let not_assessed: Vec<NotAssessedEntry> = tables
            .iter()
            .flat_map(|t| {
                t.not_assessed.iter().map(move |cohort| NotAssessedEntry {
                    classification: t.classification.clone(),
                    cohort: cohort.clone(),
                })
            })
            .collect();

        let report = CandidateReport::build(
            &self.config,
            &candidates,
            self.manifest.clone(),
            not_assessed,
            self.diagnostics.clone(),
        );
        let outputs = OutputGenerator::new(&self.paths.output_dir)
            .generate(&self.formats, &report)
            .map_err(|e| GraspError::Report(format!("{:#}", e)))?;

        for (format, path) in &outputs {
            info!("{:?} report: {:?}", format, path);
        }

        Ok(RunSummary {
            candidates,
            outputs,
            diagnostics: self.diagnostics.clone(),
        })
    }
}
