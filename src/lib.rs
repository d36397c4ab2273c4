// ==============================================================================
// lib.rs - GRASP Library
// ==============================================================================
// Description: Library interface for the cohort variant counting, combining
//              and candidate selection pipeline
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

pub mod parsers;
pub mod error;
pub mod models;
pub mod config;
pub mod stats;
pub mod diagnostics;
pub mod validator;
pub mod store;
pub mod counter;
pub mod combiner;
pub mod candidate;
pub mod processor;
pub mod output;

pub use error::GraspError;
pub use config::PipelineConfig;
pub use processor::{GraspProcessor, PipelinePaths, RunSummary};
