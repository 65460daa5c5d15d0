//! Error taxonomy for phase resolution, job assembly and job execution.

use crate::phase::Phase;

/// CI pipeline errors.
///
/// `MalformedPattern`, `PhaseConflict` and `Config` abort a run before any
/// job executes. The remaining variants are job-level: the orchestrator
/// records them against the job and escalates according to allow-failure.
#[derive(Debug, thiserror::Error)]
pub enum CiError {
    #[error("malformed pattern {pattern:?}: {source}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(
        "phase conflict: both {first} and {second} match ref {ref_name:?} (is_tag: {is_tag})"
    )]
    PhaseConflict {
        first: Phase,
        second: Phase,
        ref_name: String,
        is_tag: bool,
    },

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("command {command:?} exited with code {exit_code}")]
    CommandFailure { command: String, exit_code: i32 },

    #[error("failed to spawn {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl CiError {
    /// Whether this error belongs to a single job rather than the whole run.
    pub fn is_job_level(&self) -> bool {
        matches!(
            self,
            CiError::InvalidJob(_) | CiError::CommandFailure { .. } | CiError::Spawn { .. }
        )
    }
}

impl From<serde_yaml::Error> for CiError {
    fn from(e: serde_yaml::Error) -> Self {
        CiError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CiError {
    fn from(e: serde_json::Error) -> Self {
        CiError::Config(e.to_string())
    }
}

/// Result type for CI operations.
pub type Result<T> = std::result::Result<T, CiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_conflict_names_both_phases_and_ref() {
        let err = CiError::PhaseConflict {
            first: Phase::Development,
            second: Phase::Staging,
            ref_name: "main".to_string(),
            is_tag: false,
        };
        let msg = err.to_string();
        assert!(msg.contains("development"));
        assert!(msg.contains("staging"));
        assert!(msg.contains("\"main\""));
        assert!(msg.contains("is_tag: false"));
    }

    #[test]
    fn test_job_level_classification() {
        assert!(CiError::InvalidJob("empty".to_string()).is_job_level());
        assert!(CiError::CommandFailure {
            command: "false".to_string(),
            exit_code: 1
        }
        .is_job_level());
        assert!(!CiError::Config("bad".to_string()).is_job_level());
        assert!(!CiError::PhaseConflict {
            first: Phase::Staging,
            second: Phase::Stable,
            ref_name: "v1".to_string(),
            is_tag: true,
        }
        .is_job_level());
    }
}
