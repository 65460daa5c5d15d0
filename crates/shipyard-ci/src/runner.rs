//! Job execution: runs a job's commands as child processes.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{CiError, Result};
use crate::job::{Job, JobKind};

/// How a command string becomes a program and its arguments.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStyle {
    /// Split on whitespace. No quoting, escaping, globbing or redirection:
    /// `echo "a b"` runs `echo` with the two arguments `"a` and `b"`.
    #[default]
    Split,

    /// Hand the whole string to `sh -c`.
    Shell,
}

impl CommandStyle {
    /// Build the argv for a command string. Empty for blank commands.
    pub fn argv(&self, command: &str) -> Vec<String> {
        match self {
            CommandStyle::Split => command.split_whitespace().map(str::to_string).collect(),
            CommandStyle::Shell => {
                if command.trim().is_empty() {
                    Vec::new()
                } else {
                    vec!["sh".to_string(), "-c".to_string(), command.to_string()]
                }
            }
        }
    }
}

/// Whether commands are run or only printed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Execute,

    /// Print each command verbatim; spawn nothing.
    Preview,
}

/// Spawns one command and waits for it to exit.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv` with `working_dir` as the child's current directory and
    /// return its exit code.
    async fn run(&self, argv: &[String], working_dir: &Path) -> std::io::Result<i32>;

    /// Runner name, for logs.
    fn name(&self) -> &str;
}

/// Runs commands as real child processes with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, argv: &[String], working_dir: &Path) -> std::io::Result<i32> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command")
        })?;

        let status = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        // Killed by a signal: no exit code.
        Ok(status.code().unwrap_or(-1))
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Result of a job that completed without a failing command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub kind: JobKind,

    /// Commands run (or printed, in preview mode), in order.
    pub commands_run: Vec<String>,

    /// Exit code of the last command; `None` when previewed.
    pub exit_code: Option<i32>,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the job was only previewed.
    pub previewed: bool,
}

/// Everything observed while running one job, failed or not.
#[derive(Debug)]
pub struct JobAttempt {
    pub kind: JobKind,

    /// Commands started, up to and including a failing one.
    pub commands_run: Vec<String>,

    /// Exit code of the last command that exited.
    pub exit_code: Option<i32>,

    pub duration_ms: u64,
    pub previewed: bool,

    /// Why the job failed, if it did.
    pub error: Option<CiError>,
}

impl JobAttempt {
    fn started(kind: JobKind) -> Self {
        Self {
            kind,
            commands_run: Vec::new(),
            exit_code: None,
            duration_ms: 0,
            previewed: false,
            error: None,
        }
    }

    pub fn into_result(self) -> Result<JobOutcome> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(JobOutcome {
                kind: self.kind,
                commands_run: self.commands_run,
                exit_code: self.exit_code,
                duration_ms: self.duration_ms,
                previewed: self.previewed,
            }),
        }
    }
}

/// Runs jobs one command at a time.
#[derive(Clone)]
pub struct JobExecutor {
    runner: Arc<dyn CommandRunner>,
    style: CommandStyle,
    mode: ExecutionMode,
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ProcessRunner))
    }
}

impl JobExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            style: CommandStyle::default(),
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_style(mut self, style: CommandStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run a job's commands in `working_dir`.
    ///
    /// Stops at the first command that exits non-zero and returns
    /// [`CiError::CommandFailure`] for it. In preview mode the commands are
    /// printed to stdout and nothing is spawned or inspected on disk.
    pub async fn run(&self, job: &Job, working_dir: &Path) -> Result<JobOutcome> {
        self.attempt(job, working_dir).await.into_result()
    }

    /// Like [`run`](Self::run), but keeps the commands run and the exit
    /// code when the job fails.
    pub async fn attempt(&self, job: &Job, working_dir: &Path) -> JobAttempt {
        let start = Instant::now();
        let mut attempt = JobAttempt::started(job.kind);

        if let Err(e) = self.run_commands(job, working_dir, &mut attempt).await {
            attempt.error = Some(e);
        }

        attempt.duration_ms = start.elapsed().as_millis() as u64;
        attempt
    }

    async fn run_commands(
        &self,
        job: &Job,
        working_dir: &Path,
        attempt: &mut JobAttempt,
    ) -> Result<()> {
        if job.commands.is_empty() {
            return Err(CiError::InvalidJob(format!(
                "job {} has no commands",
                job.kind
            )));
        }

        if self.mode == ExecutionMode::Preview {
            for command in &job.commands {
                println!("{command}");
            }
            attempt.commands_run = job.commands.clone();
            attempt.previewed = true;
            return Ok(());
        }

        if !working_dir.is_dir() {
            return Err(CiError::InvalidJob(format!(
                "working directory {} does not exist or is not a directory",
                working_dir.display()
            )));
        }

        let argvs: Vec<Vec<String>> = job
            .commands
            .iter()
            .map(|command| self.style.argv(command))
            .collect();
        if argvs.iter().any(Vec::is_empty) {
            return Err(CiError::InvalidJob(format!(
                "job {} has a blank command",
                job.kind
            )));
        }

        for (command, argv) in job.commands.iter().zip(&argvs) {
            info!(job = %job.kind, command = %command, "Running command");
            attempt.commands_run.push(command.clone());

            let exit_code = self
                .runner
                .run(argv, working_dir)
                .await
                .map_err(|source| CiError::Spawn {
                    command: command.clone(),
                    source,
                })?;

            debug!(job = %job.kind, runner = self.runner.name(), exit_code, "Command exited");
            attempt.exit_code = Some(exit_code);

            if exit_code != 0 {
                return Err(CiError::CommandFailure {
                    command: command.clone(),
                    exit_code,
                });
            }
        }

        Ok(())
    }
}
