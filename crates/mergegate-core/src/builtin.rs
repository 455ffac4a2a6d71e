//! Built-in mode-specific checks: diff coverage and phase policy.

use async_trait::async_trait;
use serde_json::json;

use crate::check::{Check, CheckDefinition, CheckOutcome, CheckStage};
use crate::context::Context;
use crate::coverage::CoverageStore;
use crate::diffcov::{analyze_diff_coverage, parse_unified_diff, DiffCoverageReport};
use crate::mode::Mode;
use crate::phase::Phase;
use crate::policy::enforce_phase_policy;

/// Authoritative diff-coverage enforcement for functional-mode work.
pub struct DiffCoverageCheck {
    definition: CheckDefinition,
}

impl DiffCoverageCheck {
    pub fn new() -> Self {
        Self {
            definition: CheckDefinition::new(
                "diff-coverage",
                "Diff coverage of changed lines",
                CheckStage::ModeSpecific,
            )
            .for_mode(Mode::Functional),
        }
    }
}

impl Default for DiffCoverageCheck {
    fn default() -> Self {
        Self::new()
    }
}

fn run_analysis(ctx: &Context) -> Result<DiffCoverageReport, String> {
    let changed = parse_unified_diff(&ctx.vcs.diff_text).map_err(|e| e.to_string())?;
    let store = CoverageStore::load(&ctx.working_dir.join(&ctx.config.coverage_map_path))
        .map_err(|e| e.to_string())?;
    let threshold = if ctx.phase.phase == Phase::Refactor {
        ctx.config.refactor_coverage_threshold
    } else {
        ctx.config.coverage_threshold
    };
    Ok(analyze_diff_coverage(
        &ctx.working_dir,
        &changed,
        &store,
        threshold,
    ))
}

#[async_trait]
impl Check for DiffCoverageCheck {
    fn definition(&self) -> &CheckDefinition {
        &self.definition
    }

    async fn execute(&self, ctx: &Context) -> anyhow::Result<CheckOutcome> {
        let report = match run_analysis(ctx) {
            Ok(r) => r,
            Err(reason) => return Ok(CheckOutcome::fail(reason, None)),
        };

        let details = json!({
            "percentage": report.percentage,
            "covered_lines": report.covered_lines,
            "total_lines": report.total_lines,
            "threshold": report.threshold,
            "uncovered": report.uncovered,
            "unmatched_files": report.unmatched_files,
        });

        if report.ok {
            Ok(CheckOutcome {
                ok: true,
                reason: Some(format!(
                    "diff coverage {:.2}% meets threshold {:.2}%",
                    report.percentage, report.threshold
                )),
                details: Some(details),
            })
        } else {
            Ok(CheckOutcome::fail(report.shortfall_reason(), Some(details)))
        }
    }
}

/// Phase-specific acceptance rules for functional-mode work.
pub struct PhasePolicyCheck {
    definition: CheckDefinition,
}

impl PhasePolicyCheck {
    pub fn new() -> Self {
        Self {
            definition: CheckDefinition::new(
                "phase-policy",
                "TDD phase policy",
                CheckStage::ModeSpecific,
            )
            .for_mode(Mode::Functional),
        }
    }
}

impl Default for PhasePolicyCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Check for PhasePolicyCheck {
    fn definition(&self) -> &CheckDefinition {
        &self.definition
    }

    async fn execute(&self, ctx: &Context) -> anyhow::Result<CheckOutcome> {
        // Best-effort advisory number; authoritative enforcement is the
        // diff-coverage check.
        let advisory_coverage = run_analysis(ctx).ok().map(|r| r.percentage);

        let verdict = enforce_phase_policy(
            &ctx.phase,
            ctx.mode.mode,
            &ctx.vcs.commit_message,
            &ctx.vcs.changed_files,
            ctx.test_evidence,
            advisory_coverage,
        );

        if !verdict.enforced {
            return Ok(CheckOutcome::pass_with("phase unknown, policy skipped"));
        }
        if verdict.ok {
            return Ok(CheckOutcome::pass_with(&format!(
                "{} phase policy satisfied",
                ctx.phase.phase.as_str()
            )));
        }
        Ok(CheckOutcome::fail(
            verdict.violations.join("; "),
            Some(json!({ "violations": verdict.violations })),
        ))
    }
}
