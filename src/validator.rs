// ==============================================================================
// validator.rs - Sample File Validation
// ==============================================================================
// Description: Validates cleaned sample files before counting (size, type,
//              header) and fingerprints them for the run manifest
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// Security: Allowlist-only file types, magic number verification
// ==============================================================================

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::parsers::sample::{sample_id_from_path, SampleColumns};

const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100 MB

/// A sample file that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput {
    pub sample_id: String,
    pub file_name: String,
    pub extension: String,
    pub size: u64,
    pub hash_sha256: String,
}

pub struct FileValidator {
    max_file_size: u64,
    allowed_types: HashMap<String, Vec<u8>>,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FileValidator {
    pub fn new() -> Self {
        let mut allowed_types = HashMap::new();

        // Plain CSV (no magic number)
        allowed_types.insert("csv".to_string(), vec![]);

        // Gzip-compressed CSV
        allowed_types.insert("csv.gz".to_string(), vec![0x1f, 0x8b, 0x08]);

        Self {
            max_file_size: MAX_FILE_SIZE,
            allowed_types,
        }
    }

    pub fn with_max_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Whether a path carries an allowlisted extension
    pub fn is_candidate(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.get_extension(n).ok())
            .is_some_and(|ext| self.allowed_types.contains_key(&ext))
    }

    pub fn validate_sample(&self, file_path: &Path) -> Result<ValidatedInput> {
        let file_name = file_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file path"))?
            .to_string_lossy()
            .to_string();

        info!("Validating sample file: {}", file_name);

        // 1. Size check
        let metadata = std::fs::metadata(file_path).context("Failed to get file metadata")?;
        let size = metadata.len();
        if size > self.max_file_size {
            anyhow::bail!(
                "File too large: {} bytes (max: {} bytes)",
                size,
                self.max_file_size
            );
        }
        if size == 0 {
            anyhow::bail!("File is empty");
        }
        debug!("Size check passed: {} bytes", size);

        // 2. Extension check (allowlist)
        let ext = self.get_extension(&file_name)?;
        let expected_magic = self
            .allowed_types
            .get(&ext)
            .ok_or_else(|| anyhow::anyhow!("Invalid file type: {}", ext))?;
        debug!("Extension check passed: {}", ext);

        // 3. Magic number verification
        if !expected_magic.is_empty() {
            let actual_magic = self.read_magic_number(file_path)?;
            if !self.verify_magic_number(expected_magic, &actual_magic) {
                anyhow::bail!("Magic number mismatch for .{} file", ext);
            }
            debug!("Magic number check passed");
        }

        // 4. Header check
        self.validate_header(file_path, &ext)?;
        debug!("Header check passed");

        let sample_id = sample_id_from_path(file_path)
            .ok_or_else(|| anyhow::anyhow!("Cannot derive sample name from {}", file_name))?;

        // 5. Compute SHA-256 hash
        let hash = self.compute_sha256(file_path)?;
        debug!("SHA-256: {}", hash);

        Ok(ValidatedInput {
            sample_id,
            file_name,
            extension: ext,
            size,
            hash_sha256: hash,
        })
    }

    fn get_extension(&self, filename: &str) -> Result<String> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".csv.gz") {
            return Ok("csv.gz".to_string());
        }

        match lower.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Ok(ext.to_string()),
            _ => anyhow::bail!("No file extension found"),
        }
    }

    fn read_magic_number(&self, path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let mut buffer = vec![0u8; 4];
        let n = file.read(&mut buffer)?;
        buffer.truncate(n);
        Ok(buffer)
    }

    fn verify_magic_number(&self, expected: &[u8], actual: &[u8]) -> bool {
        expected.len() <= actual.len() && expected.iter().zip(actual.iter()).all(|(e, a)| e == a)
    }

    fn validate_header(&self, path: &Path, ext: &str) -> Result<()> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = match ext {
            "csv.gz" => Box::new(flate2::read::GzDecoder::new(file)),
            _ => Box::new(file),
        };

        let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = csv_reader.headers().context("Unreadable header row")?;
        SampleColumns::resolve(headers)?;
        Ok(())
    }

    fn compute_sha256(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 8192];

        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = "Gene,Nucleotide,Genoox_Classification\nBRCA1,c.1A>G,PATHOGENIC\n";

    fn create_test_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_valid_csv() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "P001.csv", SAMPLE.as_bytes());

        let validated = FileValidator::new().validate_sample(&path).unwrap();
        assert_eq!(validated.sample_id, "P001");
        assert_eq!(validated.extension, "csv");
        assert_eq!(validated.size, SAMPLE.len() as u64);
        assert_eq!(validated.hash_sha256.len(), 64);
    }

    #[test]
    fn test_valid_gzip_csv() {
        let dir = TempDir::new().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        let path = create_test_file(&dir, "P002.csv.gz", &encoder.finish().unwrap());

        let validated = FileValidator::new().validate_sample(&path).unwrap();
        assert_eq!(validated.sample_id, "P002");
        assert_eq!(validated.extension, "csv.gz");
    }

    #[test]
    fn test_gzip_magic_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "P003.csv.gz", SAMPLE.as_bytes());

        let err = FileValidator::new().validate_sample(&path).unwrap_err();
        assert!(err.to_string().contains("Magic number mismatch"));
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "notes.txt", b"hello");

        let validator = FileValidator::new();
        assert!(!validator.is_candidate(&path));
        let err = validator.validate_sample(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid file type"));
    }

    #[test]
    fn test_rejects_missing_header_column() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "P004.csv", b"Gene,Nucleotide\nBRCA1,c.1A>G\n");

        assert!(FileValidator::new().validate_sample(&path).is_err());
    }

    #[test]
    fn test_rejects_oversized_and_empty() {
        let dir = TempDir::new().unwrap();
        let big = create_test_file(&dir, "P005.csv", SAMPLE.as_bytes());
        let empty = create_test_file(&dir, "P006.csv", b"");

        let validator = FileValidator::new().with_max_size(8);
        assert!(validator.validate_sample(&big).unwrap_err().to_string().contains("too large"));
        assert!(validator.validate_sample(&empty).unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_hash_is_stable() {
        let dir = TempDir::new().unwrap();
        let a = create_test_file(&dir, "A.csv", SAMPLE.as_bytes());
        let b = create_test_file(&dir, "B.csv", SAMPLE.as_bytes());

        let validator = FileValidator::new();
        assert_eq!(
            validator.validate_sample(&a).unwrap().hash_sha256,
            validator.validate_sample(&b).unwrap().hash_sha256
        );
    }
}
