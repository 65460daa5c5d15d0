//! Pipeline configuration document.
//!
//! ```yaml
//! phases:
//!   staging:
//!     only: [branches, "^main$"]
//! test-common:
//!   script: ["cargo fetch"]
//! test-staging:
//!   allow-failure: false
//!   script: ["cargo test --workspace"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CiError, Result};
use crate::job::JobKind;
use crate::phase::{Phase, PhaseSet};

/// Default configuration file name, looked up in the workspace root.
pub const DEFAULT_CONFIG_FILE: &str = ".shipyard.yml";

/// Scope name of the entry shared by all phases of a job kind.
pub const COMMON_SCOPE: &str = "common";

static EMPTY_STAGE: StageJobConfig = StageJobConfig {
    allow_failure: false,
    script: Vec::new(),
};

/// Script and failure policy for one job kind in one scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StageJobConfig {
    /// Whether failures of this job are tolerated.
    #[serde(default)]
    pub allow_failure: bool,

    /// Commands run in order.
    #[serde(default)]
    pub script: Vec<String>,
}

impl StageJobConfig {
    /// Create a stage config from a script.
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_failure: false,
            script: script.into_iter().map(Into::into).collect(),
        }
    }

    /// Mark this stage as allowed to fail.
    pub fn allowing_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    /// A stage is present when it has at least one command.
    pub fn is_present(&self) -> bool {
        !self.script.is_empty()
    }
}

/// Parsed pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Phase selection rules.
    #[serde(default)]
    pub phases: PhaseSet,

    /// Job entries keyed `<kind>-<common|phase>`, e.g. `deploy-staging`.
    #[serde(flatten)]
    pub jobs: BTreeMap<String, StageJobConfig>,
}

/// Configuration key for a job kind in a scope.
pub fn job_key(kind: JobKind, scope: &str) -> String {
    format!("{}-{}", kind.name(), scope)
}

impl PipelineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. `.json` files are parsed as JSON,
    /// everything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CiError::Config(format!("failed to read {}: {e}", path.display())))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Reject job entries whose key is not a known kind/scope pair.
    pub fn validate(&self) -> Result<()> {
        let unknown: Vec<&str> = self
            .jobs
            .keys()
            .filter(|key| !is_known_job_key(key))
            .map(String::as_str)
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(CiError::Config(format!(
                "unknown job entries: {}",
                unknown.join(", ")
            )))
        }
    }

    /// Entry shared by all phases of `kind`. Missing entries are empty.
    pub fn common(&self, kind: JobKind) -> &StageJobConfig {
        self.jobs
            .get(&job_key(kind, COMMON_SCOPE))
            .unwrap_or(&EMPTY_STAGE)
    }

    /// Entry for `kind` in `phase`. Missing entries are empty.
    pub fn for_phase(&self, kind: JobKind, phase: Phase) -> &StageJobConfig {
        self.jobs
            .get(&job_key(kind, phase.name()))
            .unwrap_or(&EMPTY_STAGE)
    }

    /// Set the common entry for `kind`.
    pub fn with_common(mut self, kind: JobKind, stage: StageJobConfig) -> Self {
        self.jobs.insert(job_key(kind, COMMON_SCOPE), stage);
        self
    }

    /// Set the entry for `kind` in `phase`.
    pub fn with_phase(mut self, kind: JobKind, phase: Phase, stage: StageJobConfig) -> Self {
        self.jobs.insert(job_key(kind, phase.name()), stage);
        self
    }

    /// Replace the phase rules.
    pub fn with_phases(mut self, phases: PhaseSet) -> Self {
        self.phases = phases;
        self
    }
}

fn is_known_job_key(key: &str) -> bool {
    JobKind::ALL.iter().any(|kind| {
        key == job_key(*kind, COMMON_SCOPE)
            || Phase::ALL
                .iter()
                .any(|phase| key == job_key(*kind, phase.name()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::BRANCHES;

    const SAMPLE: &str = r#"
phases:
  development:
    only: [branches, "^feature/"]
  staging:
    only: [branches, "^main$"]
    except: ["^main-legacy$"]
test-common:
  script:
    - cargo fetch
test-staging:
  allow-failure: true
  script:
    - cargo test --workspace
deploy-staging:
  script: ["./deploy.sh staging"]
"#;

    #[test]
    fn test_parses_yaml_document() {
        let config = PipelineConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.phases.staging.only, vec![BRANCHES, "^main$"]);
        assert_eq!(config.phases.staging.except, vec!["^main-legacy$"]);
        assert!(config.phases.stable.is_empty());

        let common = config.common(JobKind::Test);
        assert_eq!(common.script, vec!["cargo fetch"]);
        assert!(!common.allow_failure);

        let staging = config.for_phase(JobKind::Test, Phase::Staging);
        assert!(staging.allow_failure);
        assert_eq!(staging.script, vec!["cargo test --workspace"]);
    }

    #[test]
    fn test_missing_entries_are_absent() {
        let config = PipelineConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(!config.common(JobKind::Build).is_present());
        assert!(!config.for_phase(JobKind::Deploy, Phase::Stable).is_present());
        assert!(config.for_phase(JobKind::Deploy, Phase::Staging).is_present());
    }

    #[test]
    fn test_parses_json_document() {
        let json = r#"{
            "phases": {"stable": {"only": ["tags", "^v"]}},
            "build-stable": {"allow-failure": false, "script": ["make release"]}
        }"#;
        let config = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(
            config.for_phase(JobKind::Build, Phase::Stable).script,
            vec!["make release"]
        );
    }

    #[test]
    fn test_empty_document_is_valid() {
        let config = PipelineConfig::from_yaml_str("{}").unwrap();
        assert!(config.jobs.is_empty());
        assert_eq!(config.phases, PhaseSet::default());
    }

    #[test]
    fn test_unknown_job_key_is_rejected() {
        let err = PipelineConfig::from_yaml_str("test-staigng:\n  script: [\"true\"]\n").unwrap_err();
        match err {
            CiError::Config(msg) => assert!(msg.contains("test-staigng"), "{msg}"),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_stage_field_is_rejected() {
        let err = PipelineConfig::from_yaml_str("test-common:\n  scripts: [\"true\"]\n");
        assert!(matches!(err, Err(CiError::Config(_))));
    }

    #[test]
    fn test_load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&yaml_path, SAMPLE).unwrap();
        let from_yaml = PipelineConfig::load(&yaml_path).unwrap();
        assert!(from_yaml.for_phase(JobKind::Test, Phase::Staging).is_present());

        let json_path = dir.path().join("shipyard.json");
        std::fs::write(&json_path, serde_json::to_string(&from_yaml).unwrap()).unwrap();
        let from_json = PipelineConfig::load(&json_path).unwrap();
        assert_eq!(from_json, from_yaml);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(&dir.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, CiError::Config(_)));
    }

    #[test]
    fn test_job_keys_cover_every_kind_and_scope() {
        assert_eq!(job_key(JobKind::Failure, COMMON_SCOPE), "failure-common");
        assert!(is_known_job_key("success-prereleases"));
        assert!(is_known_job_key("always-common"));
        assert!(!is_known_job_key("always-production"));
        assert!(!is_known_job_key("lint-common"));
    }
}
