//! GFE CLI - Command-line interface
//!
//! Usage:
//!   gfe evaluate --ai <path> --gt <path> [--level strict]...
//!   gfe batch <manifest.toml>
//!   gfe config

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gfe_core::{EvalConfig, StrictnessLevel};
use gfe_eval::{render_text, run_batch, BatchManifest, EvalSettings, Evaluator};

#[derive(Parser)]
#[command(name = "gfe")]
#[command(about = "Score AI-detected match events against ground truth")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one AI event file against its ground truth
    Evaluate {
        /// AI-detected events (JSON)
        #[arg(long)]
        ai: PathBuf,

        /// Ground-truth events (JSON or XML)
        #[arg(long)]
        gt: PathBuf,

        /// Strictness level; repeat for one report per level
        #[arg(long = "level")]
        levels: Vec<StrictnessLevel>,

        /// Matching tolerance in seconds
        #[arg(long)]
        tolerance: Option<f64>,

        /// Only evaluate events in the first N seconds
        #[arg(long)]
        time_limit: Option<f64>,

        /// Seconds added to ground-truth times
        #[arg(long, allow_negative_numbers = true)]
        time_offset: Option<f64>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Evaluate every match listed in a manifest
    Batch {
        /// Manifest with one [[match]] table per match
        manifest: PathBuf,

        /// Strictness level; repeat for several
        #[arg(long = "level")]
        levels: Vec<StrictnessLevel>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct OutputArgs {
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EvalConfig::from_file(path)?,
        None => EvalConfig::default(),
    }
    .with_env_override()?;

    match &cli.command {
        Commands::Evaluate {
            levels,
            tolerance,
            time_limit,
            time_offset,
            ..
        } => {
            let eval = &mut config.evaluation;
            if let Some(tolerance) = tolerance {
                eval.tolerance_seconds = *tolerance;
            }
            if time_limit.is_some() {
                eval.time_limit = *time_limit;
            }
            if let Some(offset) = time_offset {
                eval.time_origin_offset = *offset;
            }
            if !levels.is_empty() {
                eval.strictness_levels = levels.clone();
            }
        }
        Commands::Batch { levels, .. } => {
            if !levels.is_empty() {
                config.evaluation.strictness_levels = levels.clone();
            }
        }
        Commands::Config => {}
    }

    config.validate()?;
    init_tracing(&config);

    match cli.command {
        Commands::Evaluate { ai, gt, output, .. } => {
            let evaluator = Evaluator::new(EvalSettings::from(&config.evaluation))?;
            let reports = evaluator
                .evaluate_files(&ai, &gt, &config.evaluation.strictness_levels)
                .with_context(|| format!("evaluating {} against {}", ai.display(), gt.display()))?;

            let rendered = match output.format {
                OutputFormat::Text => reports
                    .iter()
                    .map(render_text)
                    .collect::<Vec<_>>()
                    .join("\n"),
                OutputFormat::Json if reports.len() == 1 => reports[0].to_json()?,
                OutputFormat::Json => serde_json::to_string_pretty(&reports)?,
            };
            emit(&rendered, output.output.as_deref())?;
        }
        Commands::Batch {
            manifest, output, ..
        } => {
            let batch = BatchManifest::from_file(&manifest)?;
            info!(
                "Loaded manifest {} ({} matches)",
                manifest.display(),
                batch.matches.len()
            );

            let report = run_batch(
                &batch,
                &EvalSettings::from(&config.evaluation),
                &config.evaluation.strictness_levels,
                config.batch.max_concurrency,
            )
            .await;

            let rendered = match output.format {
                OutputFormat::Text => report.render_text(),
                OutputFormat::Json => report.to_json()?,
            };
            emit(&rendered, output.output.as_deref())?;

            if !report.matches.is_empty() && report.failed == report.matches.len() {
                bail!("all {} matches failed to evaluate", report.failed);
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn init_tracing(config: &EvalConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn emit(content: &str, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => {
            print!("{content}");
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
