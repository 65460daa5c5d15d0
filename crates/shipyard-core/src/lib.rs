//! Shipyard Core Library
//!
//! Shared plumbing used by the pipeline engine and the CLI:
//! - error taxonomy for collaborator queries
//! - tracing subscriber initialisation
//! - git queries (ref name, tag detection, HEAD SHA)

pub mod error;
pub mod git;
pub mod telemetry;

pub use error::{CoreError, Result};
pub use git::{capture_head_sha, current_ref, is_git_repo, parse_bool, RefInfo};
pub use telemetry::init_tracing;
