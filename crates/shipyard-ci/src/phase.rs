//! Deployment phases and resolution of the single active phase.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CiError, Result};
use crate::rule::PhaseRule;

/// Deployment lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Development,
    Prereleases,
    Staging,
    Stable,
}

impl Phase {
    /// All phases in resolution order.
    pub const ALL: [Phase; 4] = [
        Phase::Development,
        Phase::Prereleases,
        Phase::Staging,
        Phase::Stable,
    ];

    /// Get the phase name as used in configuration keys.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Development => "development",
            Phase::Prereleases => "prereleases",
            Phase::Staging => "staging",
            Phase::Stable => "stable",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = CiError;

    fn from_str(s: &str) -> Result<Self> {
        Phase::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| CiError::Config(format!("unknown phase: {s}")))
    }
}

/// The four phase rules of a pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PhaseSet {
    #[serde(default)]
    pub development: PhaseRule,

    #[serde(default)]
    pub prereleases: PhaseRule,

    #[serde(default)]
    pub staging: PhaseRule,

    #[serde(default)]
    pub stable: PhaseRule,
}

impl PhaseSet {
    /// Get the rule for a phase.
    pub fn rule(&self, phase: Phase) -> &PhaseRule {
        match phase {
            Phase::Development => &self.development,
            Phase::Prereleases => &self.prereleases,
            Phase::Staging => &self.staging,
            Phase::Stable => &self.stable,
        }
    }

    /// Get a mutable reference to the rule for a phase.
    pub fn rule_mut(&mut self, phase: Phase) -> &mut PhaseRule {
        match phase {
            Phase::Development => &mut self.development,
            Phase::Prereleases => &mut self.prereleases,
            Phase::Staging => &mut self.staging,
            Phase::Stable => &mut self.stable,
        }
    }

    /// Replace the rule for a phase.
    pub fn with_rule(mut self, phase: Phase, rule: PhaseRule) -> Self {
        *self.rule_mut(phase) = rule;
        self
    }

    /// Resolve the active phase for a ref. See [`resolve_phase`].
    pub fn resolve(&self, ref_name: &str, is_tag: bool) -> Result<Option<Phase>> {
        resolve_phase(ref_name, is_tag, self)
    }
}

/// Resolve which phase applies to `ref_name`.
///
/// Phases are evaluated in [`Phase::ALL`] order. A second matching phase is
/// a configuration bug and fails with [`CiError::PhaseConflict`]; no phase
/// is ever picked silently. `Ok(None)` means nothing should run.
pub fn resolve_phase(ref_name: &str, is_tag: bool, phases: &PhaseSet) -> Result<Option<Phase>> {
    let mut resolved: Option<Phase> = None;

    for phase in Phase::ALL {
        if !phases.rule(phase).should_run(ref_name, is_tag)? {
            continue;
        }

        if let Some(first) = resolved {
            return Err(CiError::PhaseConflict {
                first,
                second: phase,
                ref_name: ref_name.to_string(),
                is_tag,
            });
        }

        debug!(phase = %phase, ref_name, is_tag, "Phase matched");
        resolved = Some(phase);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{BRANCHES, TAGS};

    const NONE: [&str; 0] = [];

    fn gitflow_phases() -> PhaseSet {
        PhaseSet::default()
            .with_rule(Phase::Development, PhaseRule::new([BRANCHES, "^feature/"], NONE))
            .with_rule(Phase::Prereleases, PhaseRule::new([TAGS, "-rc\\.\\d+$"], NONE))
            .with_rule(Phase::Staging, PhaseRule::new([BRANCHES, "^main$"], NONE))
            .with_rule(Phase::Stable, PhaseRule::new([TAGS, "^v\\d+"], ["-rc"]))
    }

    #[test]
    fn test_phase_names_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(phase.name().parse::<Phase>().unwrap(), phase);
            assert_eq!(phase.to_string(), phase.name());
        }
        assert!("production".parse::<Phase>().is_err());
    }

    #[test]
    fn test_staging_only_match_resolves_to_staging() {
        let phases = PhaseSet::default().with_rule(Phase::Staging, PhaseRule::new(["^main$"], NONE));
        let phase = phases.resolve("main", false).unwrap();
        assert_eq!(phase, Some(Phase::Staging));
        assert_eq!(phase.unwrap().name(), "staging");
    }

    #[test]
    fn test_gitflow_refs_resolve_to_one_phase_each() {
        let phases = gitflow_phases();
        let cases = [
            ("feature/login", false, Some(Phase::Development)),
            ("main", false, Some(Phase::Staging)),
            ("v1.2.0-rc.1", true, Some(Phase::Prereleases)),
            ("v1.2.0", true, Some(Phase::Stable)),
            ("hotfix/typo", false, None),
        ];
        for (name, is_tag, expected) in cases {
            assert_eq!(
                phases.resolve(name, is_tag).unwrap(),
                expected,
                "ref {name} (tag: {is_tag})"
            );
        }
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let phases = PhaseSet::default();
        assert_eq!(resolve_phase("main", false, &phases).unwrap(), None);
    }

    #[test]
    fn test_two_matching_phases_conflict() {
        let phases = PhaseSet::default()
            .with_rule(Phase::Development, PhaseRule::new(["^main$"], NONE))
            .with_rule(Phase::Staging, PhaseRule::new(["ma"], NONE));

        match phases.resolve("main", false).unwrap_err() {
            CiError::PhaseConflict {
                first,
                second,
                ref_name,
                is_tag,
            } => {
                assert_eq!(first, Phase::Development);
                assert_eq!(second, Phase::Staging);
                assert_eq!(ref_name, "main");
                assert!(!is_tag);
            }
            other => panic!("expected PhaseConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_conflict_reports_first_two_matches() {
        let all = PhaseRule::new([".*"], NONE);
        let phases = PhaseSet::default()
            .with_rule(Phase::Prereleases, all.clone())
            .with_rule(Phase::Staging, all.clone())
            .with_rule(Phase::Stable, all);

        match phases.resolve("v1", true).unwrap_err() {
            CiError::PhaseConflict { first, second, .. } => {
                assert_eq!(first, Phase::Prereleases);
                assert_eq!(second, Phase::Staging);
            }
            other => panic!("expected PhaseConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_pattern_aborts_resolution() {
        let phases = PhaseSet::default().with_rule(Phase::Stable, PhaseRule::new(["*bad"], NONE));
        assert!(matches!(
            phases.resolve("main", false),
            Err(CiError::MalformedPattern { .. })
        ));
    }

    #[test]
    fn test_phase_set_rejects_unknown_phase() {
        let err = serde_json::from_str::<PhaseSet>(r#"{"production": {"only": ["main"]}}"#);
        assert!(err.is_err());
    }
}
