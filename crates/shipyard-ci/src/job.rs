//! Job kinds and assembly of the job set for a resolved phase.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{PipelineConfig, StageJobConfig};
use crate::phase::Phase;

/// Lifecycle job kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Test,
    Build,
    Deploy,
    Always,
    Failure,
    Success,
}

impl JobKind {
    /// All kinds in lifecycle order.
    pub const ALL: [JobKind; 6] = [
        JobKind::Test,
        JobKind::Build,
        JobKind::Deploy,
        JobKind::Always,
        JobKind::Failure,
        JobKind::Success,
    ];

    /// Get the kind name as used in configuration keys.
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Test => "test",
            JobKind::Build => "build",
            JobKind::Deploy => "deploy",
            JobKind::Always => "always",
            JobKind::Failure => "failure",
            JobKind::Success => "success",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runnable job: common commands followed by phase commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub kind: JobKind,
    pub commands: Vec<String>,
    pub allow_failure: bool,
}

impl Job {
    /// Merge the common and phase entries of `kind`.
    ///
    /// Returns `None` when the phase entry has no commands, even if the
    /// common entry does.
    pub fn merge(kind: JobKind, common: &StageJobConfig, phase: &StageJobConfig) -> Option<Self> {
        if !phase.is_present() {
            return None;
        }

        let commands = common
            .script
            .iter()
            .chain(phase.script.iter())
            .cloned()
            .collect();

        Some(Self {
            kind,
            commands,
            allow_failure: phase.allow_failure || common.allow_failure,
        })
    }
}

/// The six job slots of a run, indexed by [`JobKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSet {
    slots: [Option<Job>; 6],
}

impl JobSet {
    /// An empty job set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a job in its kind's slot.
    pub fn insert(&mut self, job: Job) {
        let index = job.kind.index();
        self.slots[index] = Some(job);
    }

    /// Get the job for a kind, if one was assembled.
    pub fn get(&self, kind: JobKind) -> Option<&Job> {
        self.slots[kind.index()].as_ref()
    }

    /// Present jobs in lifecycle order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }

    /// Number of present jobs.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-256 over kinds, allow-failure flags and commands, in order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for job in self.iter() {
            hasher.update(job.kind.name().as_bytes());
            hasher.update(if job.allow_failure { b"+" } else { b"-" });
            for command in &job.commands {
                hasher.update(command.as_bytes());
                hasher.update(b"\0");
            }
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Assembly strategy for one phase.
pub type AssembleFn = fn(Phase, &PipelineConfig) -> JobSet;

/// Builds every job kind from the phase's entries.
pub fn assemble_full(phase: Phase, config: &PipelineConfig) -> JobSet {
    let mut jobs = JobSet::new();
    for kind in JobKind::ALL {
        if let Some(job) = Job::merge(kind, config.common(kind), config.for_phase(kind, phase)) {
            jobs.insert(job);
        }
    }
    jobs
}

/// Phase without a job table: nothing is assembled.
pub fn assemble_reserved(phase: Phase, _config: &PipelineConfig) -> JobSet {
    debug!(phase = %phase, "Phase has no job table, assembling nothing");
    JobSet::new()
}

/// Per-phase assembly table.
#[derive(Clone)]
pub struct JobAssembler {
    strategies: [(Phase, AssembleFn); 4],
}

impl Default for JobAssembler {
    fn default() -> Self {
        Self {
            strategies: [
                (Phase::Development, assemble_reserved as AssembleFn),
                (Phase::Prereleases, assemble_reserved as AssembleFn),
                (Phase::Staging, assemble_full as AssembleFn),
                (Phase::Stable, assemble_reserved as AssembleFn),
            ],
        }
    }
}

impl JobAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the strategy for one phase.
    pub fn with_strategy(mut self, phase: Phase, strategy: AssembleFn) -> Self {
        for entry in self.strategies.iter_mut() {
            if entry.0 == phase {
                entry.1 = strategy;
            }
        }
        self
    }

    /// Assemble jobs for the resolved phase. No phase means no jobs.
    pub fn assemble(&self, phase: Option<Phase>, config: &PipelineConfig) -> JobSet {
        let Some(phase) = phase else {
            return JobSet::new();
        };

        self.strategies
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, strategy)| strategy(phase, config))
            .unwrap_or_default()
    }
}
