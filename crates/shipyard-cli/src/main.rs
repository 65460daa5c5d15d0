//! Shipyard - phase-gated CI pipeline runner
//!
//! The `shipyard` command resolves the deployment phase for the current git
//! ref and runs the configured lifecycle jobs.
//!
//! ## Commands
//!
//! - `ci run`: resolve the phase, assemble its jobs and execute them
//! - `ci phase`: print the resolved phase
//! - `ci jobs`: print the assembled jobs without running them
//! - `vcs info`: print the ref, tag flag and HEAD SHA of a checkout

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use shipyard_ci::{
    CiPipeline, CommandStyle, ExecutionMode, JobAssembler, JobExecutor, JobStatus,
    PipelineConfig, PipelineRun, DEFAULT_CONFIG_FILE,
};
use shipyard_core::{capture_head_sha, current_ref, is_git_repo, parse_bool, RefInfo};

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Phase-gated CI pipeline runner", long_about = None)]
struct Cli {
    /// Enable verbose output
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
    /// CI pipeline operations
    Ci {
        #[command(subcommand)]
        action: CiAction,
    },

    /// Version-control queries
    Vcs {
        #[command(subcommand)]
        action: VcsAction,
    },
}

/// Where the pipeline runs and which ref it runs for.
#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Workspace path (default: current directory)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Pipeline configuration file (default: <workspace>/.shipyard.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ref name to resolve (auto-detected from the workspace checkout if omitted)
    #[arg(long, env = "SHIPYARD_REF_NAME")]
    ref_name: Option<String>,

    /// Whether the ref is a tag (true/false, 1/0)
    #[arg(long, env = "SHIPYARD_IS_TAG")]
    is_tag: Option<String>,
}

#[derive(Subcommand)]
enum CiAction {
    /// Resolve the phase and run its jobs
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Print commands instead of running them
        #[arg(long)]
        dry_run: bool,

        /// Run each command through `sh -c` instead of splitting on whitespace
        #[arg(long)]
        shell: bool,

        /// Write the run report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the phase the current ref resolves to
    Phase {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print the jobs assembled for the current ref
    Jobs {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Subcommand)]
enum VcsAction {
    /// Show ref name, tag flag and HEAD SHA
    Info {
        /// Repository path (default: current directory)
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shipyard_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Ci { action } => match action {
            CiAction::Run {
                target,
                dry_run,
                shell,
                report,
            } => cmd_ci_run(&target, dry_run, shell, report.as_deref()).await,
            CiAction::Phase { target } => cmd_ci_phase(&target),
            CiAction::Jobs { target } => cmd_ci_jobs(&target),
        },
        Commands::Vcs { action } => match action {
            VcsAction::Info { workspace } => cmd_vcs_info(&workspace),
        },
    }
}

fn config_path(target: &TargetArgs) -> PathBuf {
    target
        .config
        .clone()
        .unwrap_or_else(|| target.workspace.join(DEFAULT_CONFIG_FILE))
}

/// Resolve the ref from explicit arguments, falling back to the checkout.
fn resolve_ref(target: &TargetArgs) -> Result<RefInfo> {
    let is_tag = target
        .is_tag
        .as_deref()
        .map(parse_bool)
        .transpose()
        .context("Invalid --is-tag value")?;

    match &target.ref_name {
        Some(name) => Ok(RefInfo {
            name: name.clone(),
            is_tag: is_tag.unwrap_or(false),
        }),
        None => {
            let mut detected = current_ref(&target.workspace)
                .context("Failed to detect git ref; pass --ref-name")?;
            if let Some(is_tag) = is_tag {
                detected.is_tag = is_tag;
            }
            Ok(detected)
        }
    }
}

fn plan(target: &TargetArgs) -> Result<(RefInfo, PipelineRun)> {
    let path = config_path(target);
    let config = PipelineConfig::load(&path)
        .with_context(|| format!("Failed to load pipeline config {}", path.display()))?;
    let git_ref = resolve_ref(target)?;
    let run = CiPipeline::plan(&config, &git_ref, &JobAssembler::default())
        .context("Failed to resolve pipeline phase")?;
    Ok((git_ref, run))
}

async fn cmd_ci_run(
    target: &TargetArgs,
    dry_run: bool,
    shell: bool,
    report: Option<&Path>,
) -> Result<()> {
    let (git_ref, run) = plan(target)?;

    let executor = JobExecutor::default()
        .with_mode(if dry_run {
            ExecutionMode::Preview
        } else {
            ExecutionMode::Execute
        })
        .with_style(if shell {
            CommandStyle::Shell
        } else {
            CommandStyle::Split
        });

    info!(ref_name = %git_ref.name, is_tag = git_ref.is_tag, "Running pipeline");
    let result = run.execute(&executor, &target.workspace).await;

    if let Some(path) = report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    println!();
    println!("Run ID: {}", result.run_id);
    println!(
        "Phase: {}",
        result.phase.map(|p| p.name()).unwrap_or("none")
    );
    println!("Status: {}", if result.success { "✓ PASSED" } else { "✗ FAILED" });
    println!("Duration: {}ms", result.duration_ms);
    println!();

    for job in &result.jobs {
        let status = match job.status {
            JobStatus::Passed => "✓",
            JobStatus::Failed => "✗",
            JobStatus::AllowedFailure => "!",
            JobStatus::Skipped | JobStatus::NotTriggered => "-",
        };
        println!("  {} {} ({}ms)", status, job.kind, job.duration_ms);
        if let Some(error) = &job.error {
            println!("      {}", error);
        }
    }

    if result.success {
        Ok(())
    } else {
        anyhow::bail!(
            "Pipeline failed: {}",
            result.cause.as_deref().unwrap_or("unknown cause")
        )
    }
}

fn cmd_ci_phase(target: &TargetArgs) -> Result<()> {
    let (_, run) = plan(target)?;
    println!("{}", run.phase().map(|p| p.name()).unwrap_or("none"));
    Ok(())
}

fn cmd_ci_jobs(target: &TargetArgs) -> Result<()> {
    let (git_ref, run) = plan(target)?;

    println!(
        "Ref: {} ({})",
        git_ref.name,
        if git_ref.is_tag { "tag" } else { "branch" }
    );
    println!(
        "Phase: {}",
        run.phase().map(|p| p.name()).unwrap_or("none")
    );

    if run.jobs().is_empty() {
        println!("No jobs.");
        return Ok(());
    }

    for job in run.jobs().iter() {
        let policy = if job.allow_failure { " (allow failure)" } else { "" };
        println!("{}{}:", job.kind, policy);
        for command in &job.commands {
            println!("  - {}", command);
        }
    }
    Ok(())
}

fn cmd_vcs_info(workspace: &Path) -> Result<()> {
    if !is_git_repo(workspace) {
        anyhow::bail!("{} is not a git repository", workspace.display());
    }

    let git_ref = current_ref(workspace)?;
    let sha = capture_head_sha(workspace)?;

    println!("Ref: {}", git_ref.name);
    println!("Tag: {}", git_ref.is_tag);
    println!("SHA: {}", sha);
    Ok(())
}
