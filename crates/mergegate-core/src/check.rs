//! Check definitions and the external-process check wrapper.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::process::Command;

use crate::context::Context;
use crate::error::GateError;
use crate::mode::Mode;

/// Execution stage a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStage {
    /// Serial, fail-fast; a failure halts the entire run.
    Critical,
    /// Concurrent, non-fail-fast; all run and report independently.
    Parallel,
    /// Only meaningful for one resolved delivery mode.
    ModeSpecific,
    /// Enabled/disabled via a named configuration toggle.
    Optional,
}

/// Static description of a registered check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDefinition {
    /// Unique id within a registry.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    pub stage: CheckStage,

    /// Whether the check survives quick-mode filtering.
    pub quick_mode_eligible: bool,

    /// Toggle gating an optional-stage check.
    pub toggle_name: Option<String>,

    /// Mode a mode-specific check applies to.
    pub applicable_mode: Option<Mode>,

    /// Per-check timeout override in seconds.
    pub timeout_secs: Option<u64>,
}

impl CheckDefinition {
    pub fn new(id: &str, name: &str, stage: CheckStage) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            stage,
            quick_mode_eligible: false,
            toggle_name: None,
            applicable_mode: None,
            timeout_secs: None,
        }
    }

    pub fn quick(mut self) -> Self {
        self.quick_mode_eligible = true;
        self
    }

    pub fn toggle(mut self, name: &str) -> Self {
        self.toggle_name = Some(name.to_string());
        self
    }

    pub fn for_mode(mut self, mode: Mode) -> Self {
        self.applicable_mode = Some(mode);
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// What a check body produced; the runner wraps this with timing and id.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub ok: bool,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
            details: None,
        }
    }

    pub fn pass_with(reason: &str) -> Self {
        Self {
            ok: true,
            reason: Some(reason.to_string()),
            details: None,
        }
    }

    pub fn fail(reason: String, details: Option<serde_json::Value>) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            details,
        }
    }
}

/// Final, reportable result of one attempted check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: String,
    pub ok: bool,
    pub duration_ms: u64,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
}

/// A verification check.
///
/// Implementations must not mutate shared state: every check reads the same
/// immutable [`Context`]. Errors returned here are converted into failed
/// results at the runner boundary; they never abort the run.
#[async_trait]
pub trait Check: Send + Sync {
    fn definition(&self) -> &CheckDefinition;

    async fn execute(&self, ctx: &Context) -> anyhow::Result<CheckOutcome>;
}

/// Check backed by an external process invocation.
///
/// This is the interface the thin tool wrappers (lint, type check, test
/// runner, vulnerability scan, API lint, migration harness) plug in
/// through: nonzero exit or spawn failure becomes a failed outcome with
/// the captured output.
pub struct CommandCheck {
    definition: CheckDefinition,
    command: Vec<String>,
}

impl CommandCheck {
    pub fn new(definition: CheckDefinition, command: Vec<String>) -> Self {
        Self {
            definition,
            command,
        }
    }
}

#[async_trait]
impl Check for CommandCheck {
    fn definition(&self) -> &CheckDefinition {
        &self.definition
    }

    async fn execute(&self, ctx: &Context) -> anyhow::Result<CheckOutcome> {
        if self.command.is_empty() {
            anyhow::bail!("check {} has an empty command", self.definition.id);
        }

        let exe = &self.command[0];
        let args = &self.command[1..];

        // kill_on_drop so a runner timeout reaps this check's process
        // without touching siblings in the same batch.
        let child = Command::new(exe)
            .args(args)
            .current_dir(&ctx.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GateError::ToolInvocation(format!("failed to spawn {exe}: {e}")))?;

        let output = child.wait_with_output().await?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(CheckOutcome::pass())
        } else {
            Ok(CheckOutcome::fail(
                format!(
                    "'{}' exited with code {exit_code}",
                    self.command.join(" ")
                ),
                Some(json!({
                    "exit_code": exit_code,
                    "stdout": stdout,
                    "stderr": stderr,
                })),
            ))
        }
    }
}
