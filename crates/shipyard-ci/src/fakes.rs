//! In-memory command runner (testing only)
//!
//! `RecordingRunner` satisfies the `CommandRunner` contract without
//! spawning processes: it records every call and answers with a configured
//! exit code per command line (0 unless told otherwise).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::runner::CommandRunner;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
}

impl RecordedCall {
    /// The argv joined with single spaces.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

#[derive(Debug, Default)]
pub struct RecordingRunner {
    exit_codes: HashMap<String, i32>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command_line` (argv joined by spaces) exit with `code`.
    pub fn fail_with(mut self, command_line: &str, code: i32) -> Self {
        self.exit_codes.insert(command_line.to_string(), code);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded command lines, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::command_line).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, argv: &[String], working_dir: &Path) -> std::io::Result<i32> {
        let call = RecordedCall {
            argv: argv.to_vec(),
            working_dir: working_dir.to_path_buf(),
        };
        let code = self
            .exit_codes
            .get(&call.command_line())
            .copied()
            .unwrap_or(0);
        self.calls.lock().unwrap().push(call);
        Ok(code)
    }

    fn name(&self) -> &str {
        "recording"
    }
}
