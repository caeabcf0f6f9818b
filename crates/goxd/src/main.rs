//! goxd - run a gox-forge compilation job from a JSON description.
//!
//! ## Commands
//!
//! - `run`: compile every (target × platform) cell and print the artifact list
//! - `plan`: print the artifact names and linker flags a job would use

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use gox_core::telemetry::{init_tracing, LogFormat};
use gox_core::{compressed_name, plan, Compilation, Compiler, ForgeConfig, LinkerFlags};

#[derive(Parser)]
#[command(name = "goxd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-compile a Go package for many platforms", long_about = None)]
struct Cli {
    /// Enable verbose output (toolchain and VCS output at debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a job and print the produced artifacts
    Run {
        /// Path to the job description (JSON)
        job: PathBuf,
    },

    /// Show what a job would produce without running anything
    Plan {
        /// Path to the job description (JSON)
        job: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    id: &'a str,
    package: &'a str,
    version: &'a str,
    files: &'a [String],
}

#[derive(Debug, Serialize)]
struct PlanReport {
    id: String,
    artifacts: Vec<String>,
    ldflags: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(format, cli.verbose);

    match cli.command {
        Commands::Run { job } => cmd_run(&job).await,
        Commands::Plan { job } => cmd_plan(&job),
    }
}

fn read_job(path: &Path) -> Result<Compilation> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid job JSON in {:?}", path))
}

async fn cmd_run(path: &Path) -> Result<()> {
    let mut job = read_job(path)?;
    let config = ForgeConfig::from_env();
    info!(
        source_root = %config.source_root.display(),
        build_root = %config.build_root.display(),
        "loaded configuration"
    );

    let compiler = Compiler::from_config(&config).context("Failed to set up compiler")?;
    compiler
        .compile(&mut job)
        .await
        .with_context(|| format!("Job {} failed", job.id))?;

    let report = RunReport {
        id: &job.id,
        package: &job.package,
        version: &job.version,
        files: &job.files,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_plan(job: &Compilation, build_time: i64) -> Result<PlanReport> {
    let artifacts = plan(job)?
        .into_iter()
        .map(|cell| compressed_name(&cell.filename))
        .collect();
    // the real hash is only known after checkout; the requested ref stands in
    let commit = job
        .pinned_commit()
        .filter(|_| !job.commit_var.is_empty())
        .map(|hash| (job.commit_var.as_str(), hash));
    let flags = LinkerFlags::compile(&job.variables, commit, job.shrink, build_time);

    Ok(PlanReport {
        id: job.id.clone(),
        artifacts,
        ldflags: flags.to_args(),
    })
}

fn cmd_plan(path: &Path) -> Result<()> {
    let job = read_job(path)?;
    let report = build_plan(&job, chrono::Utc::now().timestamp())?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
