// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for raw and cleaned per-sample variant files
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

pub mod franklin;
pub mod sample;

pub use franklin::{CleanError, CleanSummary, FranklinCleaner};
pub use sample::{SampleFile, SampleParseError, SampleParser};
