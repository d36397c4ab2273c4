// ==============================================================================
// pipeline.rs - End-to-End Pipeline Tests
// ==============================================================================
// Description: Runs every stage over a temporary working directory
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use std::path::Path;

use grasp::models::{Classification, CohortId};
use grasp::output::{CandidateReport, OutputFormat};
use grasp::{GraspProcessor, PipelineConfig, PipelinePaths};
use tempfile::TempDir;

const HEADER: &str = "Gene,Nucleotide,Genoox_Classification,Zygosity,Inheritance_Model\n";

fn write_sample(input_dir: &Path, cohort: &str, sample: &str, rows: &[(&str, &str, &str)]) {
    let dir = input_dir.join(cohort);
    std::fs::create_dir_all(&dir).unwrap();
    let mut contents = String::from(HEADER);
    for (gene, nuc, class) in rows {
        contents.push_str(&format!("{},{},{},HET,AD\n", gene, nuc, class));
    }
    std::fs::write(dir.join(format!("{}.csv", sample)), contents).unwrap();
}

/// Case Cohort_5 (23): BRCA1 in 15, TTN in 7, MYH7 in 5.
/// Controls Cohort_1 (18) + Cohort_3 (15): BRCA1 once. Cohort_4 has no data.
fn seed_inputs(input_dir: &Path) {
    for i in 1..=23 {
        let mut rows = Vec::new();
        if i <= 15 {
            rows.push(("BRCA1", "c.1A>G", "PATHOGENIC"));
        }
        if i <= 7 {
            rows.push(("TTN", "c.3G>A", "LIKELY_PATHOGENIC"));
        }
        if i <= 5 {
            rows.push(("MYH7", "c.5G>A", "POSSIBLY_BENIGN"));
        }
        // Untracked label, dropped by the counter
        rows.push(("LDLR", "c.9T>C", "ARTEFACT"));
        write_sample(input_dir, "Cohort_5", &format!("C{:02}", i), &rows);
    }

    write_sample(input_dir, "Cohort_1", "N01", &[("BRCA1", "c.1A>G", "PATHOGENIC")]);
    write_sample(input_dir, "Cohort_1", "N02", &[("TP53", "c.215C>G", "BENIGN")]);
    write_sample(input_dir, "Cohort_2", "M01", &[("TTN", "c.3G>A", "LIKELY_PATHOGENIC")]);
    write_sample(input_dir, "Cohort_3", "K01", &[("TP53", "c.215C>G", "BENIGN")]);
}

fn run(paths: &PipelinePaths) -> grasp::RunSummary {
    GraspProcessor::new(PipelineConfig::default(), paths.clone())
        .unwrap()
        .with_formats(&[OutputFormat::Json])
        .run()
        .unwrap()
}

#[test]
fn test_end_to_end_candidates() {
    let dir = TempDir::new().unwrap();
    let paths = PipelinePaths::under(dir.path());
    seed_inputs(&paths.input_dir);

    let summary = run(&paths);

    let keys: Vec<&str> = summary.candidates.iter().map(|c| c.variant_key.as_str()).collect();
    assert_eq!(keys, vec!["BRCA1_c.1A>G", "TTN_c.3G>A"]);
    assert_eq!(summary.candidates[0].proportional_difference, 0.6219);
    assert_eq!(summary.candidates[0].p_value, 0.0);
    assert!(summary.candidates[0].p_value.is_sign_positive());
    assert_eq!(summary.candidates[1].proportional_difference, 0.3043);
    assert_eq!(summary.candidates[1].p_value, 0.00106);

    let csv = std::fs::read_to_string(&summary.outputs[&OutputFormat::Csv]).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "Gene_Nucleotide,Classification,Cohort_1,Cohort_2,Cohort_3,Cohort_4,Cohort_5,Proportional_Difference,p_value"
    );
    assert_eq!(lines[1], "BRCA1_c.1A>G,PATHOGENIC,1,0,0,0,15,0.6219,0.0");
    assert_eq!(lines[2], "TTN_c.3G>A,LIKELY_PATHOGENIC,0,1,0,0,7,0.3043,0.00106");
}

#[test]
fn test_missing_cohort_reported_as_not_assessed() {
    let dir = TempDir::new().unwrap();
    let paths = PipelinePaths::under(dir.path());
    seed_inputs(&paths.input_dir);

    let summary = run(&paths);
    // Cohort_4 folder plus one missing table per classification
    assert_eq!(summary.diagnostics.missing_inputs, 1 + Classification::KNOWN.len());

    let json = std::fs::read_to_string(&summary.outputs[&OutputFormat::Json]).unwrap();
    // Warnings go to the run log only
    assert!(!json.contains("\"messages\""));
    assert!(!json.contains("Missing input"));
    assert!(!json.contains(dir.path().to_string_lossy().as_ref()));

    let report: CandidateReport = serde_json::from_str(&json).unwrap();
    assert_eq!(report.metadata.diagnostics.missing_inputs, 1 + Classification::KNOWN.len());
    assert!(report.metadata.diagnostics.messages.is_empty());
    assert_eq!(report.metadata.not_assessed.len(), Classification::KNOWN.len());
    assert!(report
        .metadata
        .not_assessed
        .iter()
        .all(|entry| entry.cohort == CohortId::from("Cohort_4")));
    assert_eq!(report.metadata.inputs.len(), 27);
    assert_eq!(report.metadata.total_candidates, 2);
}

#[test]
fn test_rerun_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let paths = PipelinePaths::under(dir.path());
    seed_inputs(&paths.input_dir);

    let first = run(&paths);
    let csv_first = std::fs::read(&first.outputs[&OutputFormat::Csv]).unwrap();
    let json_first = std::fs::read(&first.outputs[&OutputFormat::Json]).unwrap();

    let second = run(&paths);
    let csv_second = std::fs::read(&second.outputs[&OutputFormat::Csv]).unwrap();
    let json_second = std::fs::read(&second.outputs[&OutputFormat::Json]).unwrap();

    assert_eq!(csv_first, csv_second);
    assert_eq!(json_first, json_second);
}

#[test]
fn test_clean_then_count_from_raw_exports() {
    let dir = TempDir::new().unwrap();
    let mut paths = PipelinePaths::under(dir.path());
    let raw_dir = dir.path().join("raw");
    let cohort_raw = raw_dir.join("Cohort_5_raw");
    std::fs::create_dir_all(&cohort_raw).unwrap();
    std::fs::write(
        cohort_raw.join("P001_single_snp_variants.csv"),
        "Gene,Nucleotide,Genoox_Classification,Zygosity,Inheritance_Model,Coverage\n\
         \"BRCA1\",c.1A>G,PATHOGENIC,HET,AD,30\n",
    )
    .unwrap();
    std::fs::write(
        cohort_raw.join("P001_single_snp_variants (1).csv"),
        "Gene,Nucleotide,Genoox_Classification,Zygosity,Inheritance_Model,Coverage\n\
         BRCA1,c.1A>G,PATHOGENIC,HET,AD,31\n",
    )
    .unwrap();
    paths.raw_dir = Some(raw_dir);

    let mut processor = GraspProcessor::new(PipelineConfig::default(), paths.clone()).unwrap();
    let cleaned = processor.clean().unwrap();
    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned[0].duplicates_dropped, 1);
    assert!(paths.input_dir.join("Cohort_5").join("P001.csv").exists());

    processor.count().unwrap();
    let table = paths
        .work_dir
        .join("Cohort_5")
        .join("Cohort_5_PATHOGENIC_gene_nucleotide.csv");
    let contents = std::fs::read_to_string(table).unwrap();
    assert_eq!(contents, "Gene_Nucleotide,Sample_Count,Samples\nBRCA1_c.1A>G,1,P001\n");
}

#[test]
fn test_strict_inputs_fail_on_missing_cohort() {
    let dir = TempDir::new().unwrap();
    let paths = PipelinePaths::under(dir.path());
    seed_inputs(&paths.input_dir);

    let config = PipelineConfig {
        strict_inputs: true,
        ..PipelineConfig::default()
    };
    let result = GraspProcessor::new(config, paths).unwrap().run();
    assert!(result.is_err());
}
