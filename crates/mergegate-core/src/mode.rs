//! Delivery-mode resolution.
//!
//! The mode decides which governance policy the gate applies. Resolution is
//! a deterministic priority chain, modelled as an ordered list of resolver
//! functions; the first source that yields a recognized value wins and
//! lower-priority sources are never consulted.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GateError, Result};

/// Delivery mode of the changeset under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Functional,
    NonFunctional,
}

impl Mode {
    /// Parse a user-supplied mode string. Accepts hyphen and underscore
    /// spellings of the non-functional value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "functional" => Some(Self::Functional),
            "non-functional" | "non_functional" => Some(Self::NonFunctional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Functional => "functional",
            Self::NonFunctional => "non_functional",
        }
    }
}

/// Which source in the priority chain decided the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSourceKind {
    EnvOverride,
    TaskDescriptor,
    PrLabel,
    PrTitle,
    Default,
}

/// Persisted task descriptor document.
///
/// All four fields are required strings; `mode` must be one of the two
/// enumerated values. A descriptor that exists but is structurally invalid
/// is a hard configuration error — falling back silently would change
/// which governance policy applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub mode: String,
    pub updated_at: String,
    pub source: String,
    pub note: String,
}

impl TaskDescriptor {
    /// Load and validate the descriptor at `path`. A missing file yields
    /// `None`; a present but invalid file is a configuration error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            GateError::Configuration(format!(
                "task descriptor {} is not valid JSON: {e}",
                path.display()
            ))
        })?;

        let require_string = |name: &str| -> Result<String> {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    GateError::Configuration(format!(
                        "task descriptor {} missing required string field '{}'",
                        path.display(),
                        name
                    ))
                })
        };

        let mode = require_string("mode")?;
        let updated_at = require_string("updated_at")?;
        let source = require_string("source")?;
        let note = require_string("note")?;

        if Mode::parse(&mode).is_none() {
            return Err(GateError::Configuration(format!(
                "task descriptor {} has unrecognized mode '{}'",
                path.display(),
                mode
            )));
        }

        Ok(Some(Self {
            mode,
            updated_at,
            source,
            note,
        }))
    }
}

/// Inputs consulted by the resolution chain, gathered once before checks run.
#[derive(Debug, Clone, Default)]
pub struct ModeInputs {
    /// Explicit environment override, highest priority.
    pub env_override: Option<String>,

    /// Validated task descriptor, if one is persisted.
    pub task_descriptor: Option<TaskDescriptor>,

    /// Pull-request labels.
    pub pr_labels: Vec<String>,

    /// Pull-request title.
    pub pr_title: Option<String>,
}

/// Outcome of mode resolution, recording the winning source for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeResolution {
    pub mode: Mode,
    pub source: ModeSourceKind,
}

type Resolver = fn(&ModeInputs) -> Option<Mode>;

fn from_env(inputs: &ModeInputs) -> Option<Mode> {
    inputs.env_override.as_deref().and_then(Mode::parse)
}

fn from_descriptor(inputs: &ModeInputs) -> Option<Mode> {
    inputs
        .task_descriptor
        .as_ref()
        .and_then(|d| Mode::parse(&d.mode))
}

fn from_label(inputs: &ModeInputs) -> Option<Mode> {
    inputs
        .pr_labels
        .iter()
        .find_map(|l| l.strip_prefix("mode:").and_then(Mode::parse))
}

fn from_title(inputs: &ModeInputs) -> Option<Mode> {
    let title = inputs.pr_title.as_deref()?.to_ascii_lowercase();
    if title.contains("[non-functional]") || title.contains("[non_functional]") {
        Some(Mode::NonFunctional)
    } else if title.contains("[functional]") {
        Some(Mode::Functional)
    } else {
        None
    }
}

/// Priority chain, highest first. Each entry pairs the audit label with the
/// resolver that inspects that source.
const CHAIN: &[(ModeSourceKind, Resolver)] = &[
    (ModeSourceKind::EnvOverride, from_env),
    (ModeSourceKind::TaskDescriptor, from_descriptor),
    (ModeSourceKind::PrLabel, from_label),
    (ModeSourceKind::PrTitle, from_title),
];

/// Resolve the delivery mode from the priority chain.
///
/// For `non_functional` the companion problem-analysis document is also
/// validated; its absence or incompleteness rejects the non-functional path
/// with a reason naming the missing sections.
pub fn resolve_mode(inputs: &ModeInputs, analysis_doc: &Path) -> Result<ModeResolution> {
    let (mode, source) = CHAIN
        .iter()
        .find_map(|(kind, resolver)| resolver(inputs).map(|m| (m, *kind)))
        .unwrap_or((Mode::Functional, ModeSourceKind::Default));

    debug!(mode = mode.as_str(), source = ?source, "resolved delivery mode");

    if mode == Mode::NonFunctional {
        validate_analysis_doc(analysis_doc)?;
    }

    Ok(ModeResolution { mode, source })
}

/// Section headings the problem-analysis document must contain.
pub const ANALYSIS_SECTIONS: [&str; 4] = ["Problem", "Root Cause", "Impact", "Remediation"];

/// Minimum non-whitespace characters the analysis document must contain.
pub const ANALYSIS_MIN_CHARS: usize = 200;

/// Validate the problem-analysis document required for non-functional work.
pub fn validate_analysis_doc(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(GateError::Configuration(format!(
            "non_functional mode requires a problem-analysis document at {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;

    // Only markdown headings count; a prose line that happens to equal a
    // section name does not satisfy the requirement.
    let is_heading_for = |line: &str, section: &str| {
        let trimmed = line.trim_start();
        let body = trimmed.trim_start_matches('#');
        body.len() < trimmed.len() && body.trim().eq_ignore_ascii_case(section)
    };
    let missing: Vec<&str> = ANALYSIS_SECTIONS
        .iter()
        .copied()
        .filter(|section| !text.lines().any(|l| is_heading_for(l, section)))
        .collect();
    if !missing.is_empty() {
        return Err(GateError::Configuration(format!(
            "problem-analysis document {} is missing section(s): {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let non_ws = text.chars().filter(|c| !c.is_whitespace()).count();
    if non_ws < ANALYSIS_MIN_CHARS {
        return Err(GateError::Configuration(format!(
            "problem-analysis document {} too short: {non_ws} non-whitespace chars, need {}",
            path.display(),
            ANALYSIS_MIN_CHARS
        )));
    }

    Ok(())
}
