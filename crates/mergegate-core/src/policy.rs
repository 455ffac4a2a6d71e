//! Phase-specific policy enforcement.
//!
//! Rules are only applied when the resolved mode is functional and the
//! classified phase is confident. An unknown phase skips enforcement
//! entirely rather than guessing; the skip is visible in the verdict.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mode::Mode;
use crate::phase::{has_refactor_keyword, is_test_file, Phase, PhaseClassification, TestEvidence};

/// Outcome of phase policy enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVerdict {
    /// Whether the changeset satisfies the phase's rules.
    pub ok: bool,

    /// Whether enforcement actually ran (false for non-functional mode or
    /// an unknown phase).
    pub enforced: bool,

    /// Violations, empty when `ok`.
    pub violations: Vec<String>,
}

impl PolicyVerdict {
    fn skipped() -> Self {
        Self {
            ok: true,
            enforced: false,
            violations: Vec::new(),
        }
    }
}

/// Apply the phase-specific acceptance rules.
///
/// `advisory_coverage` is the diff-coverage percentage when already known;
/// it is logged for context only. Authoritative coverage enforcement lives
/// in the diff-coverage check so there is a single source of truth.
pub fn enforce_phase_policy(
    classification: &PhaseClassification,
    mode: Mode,
    commit_message: &str,
    changed_files: &[PathBuf],
    test_evidence: Option<TestEvidence>,
    advisory_coverage: Option<f64>,
) -> PolicyVerdict {
    if mode != Mode::Functional || classification.phase == Phase::Unknown {
        return PolicyVerdict::skipped();
    }

    if let Some(pct) = advisory_coverage {
        info!(
            phase = classification.phase.as_str(),
            coverage_pct = pct,
            "diff coverage at phase policy evaluation (advisory)"
        );
    }

    let test_files = changed_files.iter().filter(|f| is_test_file(f)).count();
    let non_test_files = changed_files.len() - test_files;

    let mut violations = Vec::new();

    match classification.phase {
        Phase::Red => {
            if test_files == 0 {
                violations.push("red phase requires at least one changed test file".to_string());
            }
            match test_evidence {
                Some(ev) if ev.failed > 0 => {}
                Some(_) => violations.push("tests must fail initially".to_string()),
                None => violations
                    .push("red phase requires a recorded test run with failures".to_string()),
            }
        }
        Phase::Green => {
            match test_evidence {
                Some(ev) if ev.failed == 0 => {}
                Some(ev) => violations.push(format!(
                    "green phase requires zero failing tests, found {}",
                    ev.failed
                )),
                None => violations
                    .push("green phase requires a recorded passing test run".to_string()),
            }
            if test_files == 0 || non_test_files == 0 {
                violations.push(
                    "green phase requires test and non-test files in the same changeset"
                        .to_string(),
                );
            }
        }
        Phase::Refactor => {
            if !has_refactor_keyword(commit_message) {
                violations.push(
                    "refactor phase requires a refactor indicator in the commit message"
                        .to_string(),
                );
            }
            if non_test_files == 0 {
                violations
                    .push("refactor phase requires at least one non-test file change".to_string());
            }
            match test_evidence {
                Some(ev) if ev.failed == 0 => {}
                Some(ev) => violations.push(format!(
                    "refactor must not change behavior: {} test(s) failing",
                    ev.failed
                )),
                None => violations
                    .push("refactor phase requires a recorded passing test run".to_string()),
            }
        }
        Phase::Unknown => unreachable!("unknown phase handled above"),
    }

    PolicyVerdict {
        ok: violations.is_empty(),
        enforced: true,
        violations,
    }
}
