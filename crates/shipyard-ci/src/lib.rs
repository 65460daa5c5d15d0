//! Shipyard CI - phase-gated pipeline execution
//!
//! Provides a pipeline orchestrator that:
//! - Resolves the single deployment phase matching the current git ref
//! - Assembles lifecycle jobs from common and phase-specific scripts
//! - Runs the jobs sequentially as child processes (or previews them)

pub mod config;
pub mod error;
pub mod fakes;
pub mod job;
pub mod phase;
pub mod pipeline;
pub mod rule;
pub mod runner;

// Re-export key types
pub use config::{PipelineConfig, StageJobConfig, DEFAULT_CONFIG_FILE};
pub use error::{CiError, Result};
pub use job::{Job, JobAssembler, JobKind, JobSet};
pub use phase::{resolve_phase, Phase, PhaseSet};
pub use pipeline::{CiPipeline, JobReport, JobStatus, PipelineResult, PipelineRun};
pub use rule::PhaseRule;
pub use runner::{
    CommandRunner, CommandStyle, ExecutionMode, JobAttempt, JobExecutor, JobOutcome, ProcessRunner,
};
