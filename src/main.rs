// ==============================================================================
// main.rs - GRASP Command Line Entry Point
// ==============================================================================
// Description: Runs the cleaning, counting, combining and candidate selection
//              stages individually or end to end
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use grasp::output::OutputFormat;
use grasp::{GraspProcessor, PipelineConfig, PipelinePaths};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline configuration (JSON); built-in defaults when omitted
    #[arg(short, long, env = "GRASP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Working directory for intermediate tables
    #[arg(short, long, env = "GRASP_WORK_DIR", default_value = ".", global = true)]
    work_dir: PathBuf,

    /// Cleaned sample directory (default: <work-dir>/cleaned)
    #[arg(short, long, global = true)]
    input_dir: Option<PathBuf>,

    /// Report directory (default: <work-dir>/results)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Log line format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Write the run log to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean raw variant exports into per-sample files
    Clean {
        /// Directory holding <cohort>_raw folders
        #[arg(short, long)]
        raw_dir: PathBuf,
    },
    /// Count variants per cohort and classification
    Count,
    /// Combine per-cohort tables across cohorts
    Combine,
    /// Select and rank candidate variants from the combined tables
    Candidates {
        /// Report formats (csv is always written)
        #[arg(short, long, value_delimiter = ',', default_value = "csv,json")]
        format: Vec<OutputFormat>,
    },
    /// Run every stage
    Run {
        /// Directory holding <cohort>_raw folders; cleaning is skipped without it
        #[arg(short, long)]
        raw_dir: Option<PathBuf>,

        /// Report formats (csv is always written)
        #[arg(short, long, value_delimiter = ',', default_value = "csv,json")]
        format: Vec<OutputFormat>,
    },
    /// Write the default configuration
    InitConfig {
        /// Destination file
        #[arg(default_value = "grasp.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat, log_file: Option<&PathBuf>) -> Result<()> {
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (format, log_file) {
        (LogFormat::Text, None) => fmt::layer().boxed(),
        (LogFormat::Json, None) => fmt::layer().json().boxed(),
        (format, Some(path)) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Text => layer.boxed(),
                LogFormat::Json => layer.json().boxed(),
            }
        }
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grasp=info".into()),
        )
        .init();
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => {
            info!("No configuration file given, using built-in defaults");
            Ok(PipelineConfig::default())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_format, args.log_file.as_ref())?;

    info!("GRASP {} starting...", env!("CARGO_PKG_VERSION"));

    if let Command::InitConfig { path, force } = &args.command {
        if path.exists() && !force {
            anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
        }
        PipelineConfig::default()
            .save(path)
            .with_context(|| format!("Failed to write configuration to {:?}", path))?;
        info!("Default configuration written to {:?}", path);
        return Ok(());
    }

    let config = load_config(args.config.as_ref())?;

    let mut paths = PipelinePaths::under(&args.work_dir);
    if let Some(input_dir) = args.input_dir {
        paths.input_dir = input_dir;
    }
    if let Some(output_dir) = args.output_dir {
        paths.output_dir = output_dir;
    }

    match args.command {
        Command::Clean { raw_dir } => {
            paths.raw_dir = Some(raw_dir);
            let cleaned = GraspProcessor::new(config, paths)?.clean()?;
            info!("Cleaned {} samples", cleaned.len());
        }
        Command::Count => {
            let tables = GraspProcessor::new(config, paths)?.count()?;
            info!("Wrote {} count tables", tables);
        }
        Command::Combine => {
            let combined = GraspProcessor::new(config, paths)?.combine()?;
            info!("Wrote {} combined tables", combined.len());
        }
        Command::Candidates { format } => {
            let summary = GraspProcessor::new(config, paths)?
                .with_formats(&format)
                .candidates()?;
            info!("{} candidates selected", summary.candidates.len());
        }
        Command::Run { raw_dir, format } => {
            paths.raw_dir = raw_dir;
            let summary = GraspProcessor::new(config, paths)?
                .with_formats(&format)
                .run()?;
            for (format, path) in &summary.outputs {
                info!("{:?}: {:?}", format, path);
            }
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
