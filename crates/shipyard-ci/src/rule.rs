//! Per-phase inclusion/exclusion rules evaluated against a git ref.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CiError, Result};

/// Literal token restricting a rule to branch refs.
pub const BRANCHES: &str = "branches";

/// Literal token restricting a rule to tag refs.
pub const TAGS: &str = "tags";

/// Inclusion (`only`) and exclusion (`except`) patterns for one phase.
///
/// Each pattern is either one of the literal tokens [`BRANCHES`] / [`TAGS`]
/// or an unanchored regular expression matched against the ref name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseRule {
    /// Patterns that make the phase eligible.
    #[serde(default)]
    pub only: Vec<String>,

    /// Patterns that veto the phase.
    #[serde(default)]
    pub except: Vec<String>,
}

struct Pattern<'a> {
    raw: &'a str,
    regex: Regex,
}

impl<'a> Pattern<'a> {
    fn compile(raw: &'a str) -> Result<Self> {
        let regex = Regex::new(raw).map_err(|source| CiError::MalformedPattern {
            pattern: raw.to_string(),
            source,
        })?;
        Ok(Self { raw, regex })
    }

    /// Literal token naming the other kind of ref.
    fn excludes_kind(&self, is_tag: bool) -> bool {
        (self.raw == BRANCHES && is_tag) || (self.raw == TAGS && !is_tag)
    }

    /// Literal token naming this kind of ref.
    fn names_kind(&self, is_tag: bool) -> bool {
        (self.raw == TAGS && is_tag) || (self.raw == BRANCHES && !is_tag)
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Pattern<'_>>> {
    patterns.iter().map(|p| Pattern::compile(p)).collect()
}

impl PhaseRule {
    /// Create a rule from `only` and `except` pattern lists.
    pub fn new<I, E, S, T>(only: I, except: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            only: only.into_iter().map(Into::into).collect(),
            except: except.into_iter().map(Into::into).collect(),
        }
    }

    /// Decide whether the phase applies to `ref_name`.
    ///
    /// Both lists are scanned in declaration order and each scan stops at
    /// its first regex match. A literal `branches`/`tags` token that rules
    /// the ref out returns `false` immediately, before any later pattern is
    /// considered. With no matching `only` pattern the phase does not run.
    ///
    /// Every pattern is compiled up front, so an invalid regex fails with
    /// [`CiError::MalformedPattern`] even if the scan would have stopped
    /// before reaching it.
    pub fn should_run(&self, ref_name: &str, is_tag: bool) -> Result<bool> {
        let only = compile_all(&self.only)?;
        let except = compile_all(&self.except)?;

        let mut run = false;

        for pattern in &only {
            if pattern.excludes_kind(is_tag) {
                return Ok(false);
            }
            if pattern.regex.is_match(ref_name) {
                run = true;
                break;
            }
        }

        for pattern in &except {
            if pattern.names_kind(is_tag) {
                return Ok(false);
            }
            if pattern.regex.is_match(ref_name) {
                run = false;
                break;
            }
        }

        Ok(run)
    }

    /// Whether the rule has no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.only.is_empty() && self.except.is_empty()
    }
}
