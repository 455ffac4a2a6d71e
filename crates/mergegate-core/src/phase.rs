//! TDD phase classification from weighted evidence.
//!
//! Classification is a pure function of the current changeset; there is no
//! persisted previous-phase state. Signal detection lives here, policy
//! enforcement lives in [`crate::policy`], so heuristics stay testable
//! independently of governance rules.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// TDD phase of a changeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Red,
    Green,
    Refactor,
    Unknown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Refactor => "refactor",
            Self::Unknown => "unknown",
        }
    }
}

/// Where a piece of phase evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    CommitTag,
    TestEvidence,
    FileShape,
}

/// One weighted phase signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseEvidence {
    pub source: EvidenceSource,
    pub phase: Phase,
    pub weight: f64,
}

/// Pass/fail counts recorded at test-run time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TestEvidence {
    pub passed: u64,
    pub failed: u64,
}

impl TestEvidence {
    /// Load the test-evidence log, if one was recorded.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

/// Outcome of classification: the winning phase, its cumulative confidence
/// and every signal that contributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseClassification {
    pub phase: Phase,
    pub confidence: f64,
    pub evidence: Vec<PhaseEvidence>,
}

impl PhaseClassification {
    fn unknown() -> Self {
        Self {
            phase: Phase::Unknown,
            confidence: 0.0,
            evidence: Vec::new(),
        }
    }
}

/// Keywords in a commit message that indicate refactor-flavored work.
pub const REFACTOR_KEYWORDS: [&str; 5] = ["refactor", "cleanup", "rename", "extract", "simplify"];

/// Whether a changed path looks like a test file.
pub fn is_test_file(path: &Path) -> bool {
    if path
        .components()
        .any(|c| c.as_os_str() == "tests" || c.as_os_str() == "test")
    {
        return true;
    }
    match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => {
            stem.starts_with("test_") || stem.ends_with("_test") || stem.ends_with("_spec")
        }
        None => false,
    }
}

/// Whether the commit message carries a refactor indicator.
pub fn has_refactor_keyword(commit_message: &str) -> bool {
    let lower = commit_message.to_ascii_lowercase();
    REFACTOR_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn commit_tag(commit_message: &str) -> Option<Phase> {
    let lower = commit_message.to_ascii_lowercase();
    for (tag, phase) in [
        ("[red]", Phase::Red),
        ("[green]", Phase::Green),
        ("[refactor]", Phase::Refactor),
    ] {
        if lower.contains(tag) {
            return Some(phase);
        }
    }
    None
}

/// Classify the changeset's TDD phase from weighted evidence.
///
/// An explicit commit tag is deterministic and wins outright. Otherwise
/// test-evidence and file-shape signals accumulate per phase and the
/// highest cumulative weight wins. No signal at all yields
/// [`Phase::Unknown`] — the phase is never guessed.
pub fn classify_phase(
    commit_message: &str,
    changed_files: &[std::path::PathBuf],
    test_evidence: Option<TestEvidence>,
) -> PhaseClassification {
    if let Some(phase) = commit_tag(commit_message) {
        return PhaseClassification {
            phase,
            confidence: 1.0,
            evidence: vec![PhaseEvidence {
                source: EvidenceSource::CommitTag,
                phase,
                weight: 1.0,
            }],
        };
    }

    let mut evidence = Vec::new();

    if let Some(ev) = test_evidence {
        if ev.failed > 0 {
            evidence.push(PhaseEvidence {
                source: EvidenceSource::TestEvidence,
                phase: Phase::Red,
                weight: 0.6,
            });
        } else if ev.passed > 0 {
            evidence.push(PhaseEvidence {
                source: EvidenceSource::TestEvidence,
                phase: Phase::Green,
                weight: 0.5,
            });
        }
    }

    if !changed_files.is_empty() {
        let test_count = changed_files.iter().filter(|f| is_test_file(f)).count();
        if test_count == changed_files.len() {
            evidence.push(PhaseEvidence {
                source: EvidenceSource::FileShape,
                phase: Phase::Red,
                weight: 0.4,
            });
        } else if test_count > 0 {
            evidence.push(PhaseEvidence {
                source: EvidenceSource::FileShape,
                phase: Phase::Green,
                weight: 0.4,
            });
        }
    }

    if has_refactor_keyword(commit_message) {
        // Keyword plus a zero-failure run is the full refactor heuristic
        // (structure changed, behavior preserved); keyword alone is weaker.
        let behavior_unchanged = matches!(test_evidence, Some(ev) if ev.failed == 0);
        evidence.push(PhaseEvidence {
            source: EvidenceSource::FileShape,
            phase: Phase::Refactor,
            weight: if behavior_unchanged { 0.6 } else { 0.3 },
        });
    }

    if evidence.is_empty() {
        return PhaseClassification::unknown();
    }

    let mut best = (Phase::Unknown, 0.0f64);
    for candidate in [Phase::Red, Phase::Green, Phase::Refactor] {
        let total: f64 = evidence
            .iter()
            .filter(|e| e.phase == candidate)
            .map(|e| e.weight)
            .sum();
        if total > best.1 {
            best = (candidate, total);
        }
    }

    PhaseClassification {
        phase: best.0,
        confidence: best.1.min(1.0),
        evidence,
    }
}
