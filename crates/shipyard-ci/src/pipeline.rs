//! Pipeline orchestration: phase resolution, job assembly and lifecycle
//! sequencing of the assembled jobs.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipyard_core::RefInfo;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::job::{JobAssembler, JobKind, JobSet};
use crate::phase::Phase;
use crate::runner::JobExecutor;

/// What happened to one job kind during a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Passed,
    Failed,
    /// Failed, but the job is allowed to fail.
    AllowedFailure,
    /// No job of this kind was assembled.
    Skipped,
    /// Present, but its lifecycle condition did not hold.
    NotTriggered,
}

/// Report for one job kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub kind: JobKind,
    pub status: JobStatus,

    /// Commands run, up to and including a failing one. For a job that did
    /// not run, the assembled commands (empty when skipped).
    pub commands: Vec<String>,

    /// Exit code of the last command that exited.
    pub exit_code: Option<i32>,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Error text for failed jobs.
    pub error: Option<String>,
}

impl JobReport {
    fn without_run(kind: JobKind, status: JobStatus, commands: Vec<String>) -> Self {
        Self {
            kind,
            status,
            commands,
            exit_code: None,
            duration_ms: 0,
            error: None,
        }
    }

    /// Whether the job was executed (or previewed).
    pub fn ran(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Passed | JobStatus::Failed | JobStatus::AllowedFailure
        )
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,

    /// Resolved phase; `None` when no phase matched.
    pub phase: Option<Phase>,

    /// Whether no job failed without being allowed to.
    pub success: bool,

    /// Error of the most recent job that failed the run.
    pub cause: Option<String>,

    /// One report per job kind, in lifecycle order.
    pub jobs: Vec<JobReport>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Digest of the assembled job set.
    pub jobs_digest: String,
}

impl PipelineResult {
    /// Number of jobs that passed.
    pub fn passed_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Passed)
            .count()
    }

    /// Number of jobs that failed, tolerated or not.
    pub fn failed_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Failed | JobStatus::AllowedFailure))
            .count()
    }

    /// Report for a job kind.
    pub fn report(&self, kind: JobKind) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.kind == kind)
    }
}

/// One invocation: the resolved phase, its jobs and the failure flag.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    phase: Option<Phase>,
    jobs: JobSet,
    failed: bool,
    cause: Option<String>,
}

impl PipelineRun {
    pub fn new(phase: Option<Phase>, jobs: JobSet) -> Self {
        Self {
            phase,
            jobs,
            failed: false,
            cause: None,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn jobs(&self) -> &JobSet {
        &self.jobs
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Lifecycle condition for a present job of `kind`.
    fn should_trigger(&self, kind: JobKind) -> bool {
        match kind {
            JobKind::Failure => self.failed,
            JobKind::Success => !self.failed,
            _ => true,
        }
    }

    /// Run the jobs in lifecycle order.
    ///
    /// A failing job that is not allowed to fail marks the run failed, but
    /// later kinds are still attempted: `always` runs whenever present,
    /// `failure` only on a failed run and `success` only on a clean one.
    pub async fn execute(mut self, executor: &JobExecutor, working_dir: &Path) -> PipelineResult {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let jobs_digest = self.jobs.digest();

        match self.phase {
            Some(phase) => info!(run_id = %run_id, phase = %phase, jobs = self.jobs.len(), "Starting pipeline"),
            None => info!(run_id = %run_id, "No phase matched, nothing to run"),
        }

        let mut reports = Vec::with_capacity(JobKind::ALL.len());

        for kind in JobKind::ALL {
            let Some(job) = self.jobs.get(kind) else {
                info!(job = %kind, "No job defined, skipping");
                reports.push(JobReport::without_run(kind, JobStatus::Skipped, Vec::new()));
                continue;
            };

            if !self.should_trigger(kind) {
                info!(job = %kind, failed = self.failed, "Job not triggered");
                reports.push(JobReport::without_run(
                    kind,
                    JobStatus::NotTriggered,
                    job.commands.clone(),
                ));
                continue;
            }

            info!(job = %kind, "Executing job");
            let attempt = executor.attempt(job, working_dir).await;

            let (status, error) = match &attempt.error {
                None => (JobStatus::Passed, None),
                Some(e) if job.allow_failure => {
                    debug_assert!(e.is_job_level());
                    warn!(job = %kind, error = %e, "Job failed, failure allowed");
                    (JobStatus::AllowedFailure, Some(e.to_string()))
                }
                Some(e) => {
                    debug_assert!(e.is_job_level());
                    warn!(job = %kind, error = %e, "Job failed");
                    self.failed = true;
                    self.cause = Some(e.to_string());
                    (JobStatus::Failed, Some(e.to_string()))
                }
            };

            reports.push(JobReport {
                kind,
                status,
                commands: attempt.commands_run,
                exit_code: attempt.exit_code,
                duration_ms: attempt.duration_ms,
                error,
            });
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if self.failed {
            info!(run_id = %run_id, "Pipeline failed");
        } else {
            info!(run_id = %run_id, "Pipeline completed successfully");
        }

        PipelineResult {
            run_id,
            started_at,
            phase: self.phase,
            success: !self.failed,
            cause: self.cause,
            jobs: reports,
            duration_ms,
            jobs_digest,
        }
    }
}

/// CI pipeline orchestrator.
pub struct CiPipeline;

impl CiPipeline {
    /// Resolve the phase for `git_ref` and assemble its jobs.
    ///
    /// Fails on malformed patterns and phase conflicts; nothing runs then.
    pub fn plan(
        config: &PipelineConfig,
        git_ref: &RefInfo,
        assembler: &JobAssembler,
    ) -> Result<PipelineRun> {
        let phase = config.phases.resolve(&git_ref.name, git_ref.is_tag)?;
        let jobs = assembler.assemble(phase, config);
        Ok(PipelineRun::new(phase, jobs))
    }

    /// Plan with the default assembler and execute.
    pub async fn run(
        config: &PipelineConfig,
        git_ref: &RefInfo,
        executor: &JobExecutor,
        working_dir: &Path,
    ) -> Result<PipelineResult> {
        let run = Self::plan(config, git_ref, &JobAssembler::default())?;
        Ok(run.execute(executor, working_dir).await)
    }
}
