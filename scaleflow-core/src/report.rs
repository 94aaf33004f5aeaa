//! Report plumbing shared by every tool: the JSON envelope, text markers
//! and rules, and the mapping from outcomes to a process exit code.

use serde::Serialize;
use std::process::ExitCode;

use crate::error::ToolError;

pub const PASS_MARK: &str = "\u{2713}";
pub const FAIL_MARK: &str = "\u{2717}";

pub fn heavy_rule() -> String {
    "\u{2550}".repeat(50)
}

pub fn light_rule() -> String {
    "\u{2500}".repeat(50)
}

pub fn mark(passed: bool) -> &'static str {
    if passed {
        PASS_MARK
    } else {
        FAIL_MARK
    }
}

/// Machine-readable report: `{"summary": ..., "results": [...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a, S: Serialize, R: Serialize> {
    pub summary: S,
    pub results: &'a [R],
}

impl<'a, S: Serialize, R: Serialize> Report<'a, S, R> {
    pub fn new(summary: S, results: &'a [R]) -> Self {
        Self { summary, results }
    }

    pub fn to_json(&self) -> Result<String, ToolError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Overall outcome of a run, before it becomes an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    AllPassed,
    Failures,
}

impl RunStatus {
    pub fn from_all_passed(all_passed: bool) -> Self {
        if all_passed {
            Self::AllPassed
        } else {
            Self::Failures
        }
    }

    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::AllPassed => ExitCode::SUCCESS,
            Self::Failures => ExitCode::from(1),
        }
    }
}

/// Exit code for usage and environment errors.
pub fn usage_exit_code() -> ExitCode {
    ExitCode::from(2)
}
