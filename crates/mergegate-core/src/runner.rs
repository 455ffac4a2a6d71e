//! Staged check execution.
//!
//! Stage order is fixed: critical, parallel, mode-specific, optional.
//! Critical checks run serially in registration order and the first failure
//! halts the run. Parallel checks fan out together and all report. Nothing
//! a check does can escape the runner; every error becomes a failed result.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::check::{Check, CheckResult, CheckStage};
use crate::config::GateConfig;
use crate::context::Context;
use crate::error::{GateError, Result};
use crate::report::Report;

/// Ordered registry of checks, partitioned by stage at execution time.
///
/// Registration order within a stage is part of the contract: the critical
/// stage executes in exactly this order, which makes fail-fast behavior
/// deterministic.
#[derive(Default)]
pub struct CheckRegistry {
    checks: Vec<Arc<dyn Check>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check. Ids must be unique within the registry.
    pub fn register(&mut self, check: Arc<dyn Check>) -> Result<()> {
        let id = &check.definition().id;
        if self.checks.iter().any(|c| &c.definition().id == id) {
            return Err(GateError::DuplicateCheckId(id.clone()));
        }
        self.checks.push(check);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    fn stage_checks(&self, stage: CheckStage, quick: bool) -> Vec<Arc<dyn Check>> {
        self.checks
            .iter()
            .filter(|c| c.definition().stage == stage)
            .filter(|c| !quick || c.definition().quick_mode_eligible)
            .cloned()
            .collect()
    }
}

/// Answers "is this named toggle enabled" for optional-stage checks.
///
/// Backed by the run configuration through an explicit TTL cache so
/// repeated lookups within a run stay deterministic and observable.
pub struct ToggleOracle {
    toggles: std::collections::HashMap<String, bool>,
    cache: Mutex<TtlCache<String, bool>>,
}

impl ToggleOracle {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            toggles: config.toggles.clone(),
            cache: Mutex::new(TtlCache::new(
                config.cache_capacity,
                Duration::from_secs(config.cache_ttl_secs),
            )),
        }
    }

    pub fn enabled(&self, name: &str) -> bool {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.get_or_insert_with(name.to_string(), || {
            self.toggles.get(name).copied().unwrap_or(false)
        })
    }
}

/// Drives a registry of checks through the staged execution order.
pub struct GateRunner {
    registry: CheckRegistry,
}

impl GateRunner {
    pub fn new(registry: CheckRegistry) -> Self {
        Self { registry }
    }

    /// Execute the gate and aggregate results into a report.
    ///
    /// `quick` filters every stage down to quick-mode-eligible checks
    /// before stage ordering applies.
    pub async fn run(&self, ctx: &Context, toggles: &ToggleOracle, quick: bool) -> Report {
        let start = Instant::now();
        let mut results: Vec<CheckResult> = Vec::new();

        info!(
            mode = ctx.mode.mode.as_str(),
            phase = ctx.phase.phase.as_str(),
            quick,
            "starting gate run"
        );

        // Critical: serial, registration order, fail-fast.
        for check in self.registry.stage_checks(CheckStage::Critical, quick) {
            let result = execute_check(check.as_ref(), ctx).await;
            if !result.ok {
                warn!(check = %result.id, "critical check failed, halting run");
                results.push(result);
                return self.finalize(ctx, results, start);
            }
            results.push(result);
        }

        // Parallel: all launch together, all results collected.
        let parallel = self.registry.stage_checks(CheckStage::Parallel, quick);
        let futures: Vec<_> = parallel
            .iter()
            .map(|check| execute_check(check.as_ref(), ctx))
            .collect();
        results.extend(join_all(futures).await);

        // Mode-specific: inapplicable checks report "not applicable",
        // never omitted from the report.
        for check in self.registry.stage_checks(CheckStage::ModeSpecific, quick) {
            let def = check.definition();
            match def.applicable_mode {
                Some(required) if required != ctx.mode.mode => {
                    results.push(CheckResult {
                        id: def.id.clone(),
                        ok: true,
                        duration_ms: 0,
                        reason: Some(format!(
                            "not applicable to {} mode",
                            ctx.mode.mode.as_str()
                        )),
                        details: None,
                    });
                }
                _ => results.push(execute_check(check.as_ref(), ctx).await),
            }
        }

        // Optional: a disabled toggle is never a failure.
        for check in self.registry.stage_checks(CheckStage::Optional, quick) {
            let def = check.definition();
            let enabled = def
                .toggle_name
                .as_deref()
                .map(|name| toggles.enabled(name))
                .unwrap_or(true);
            if enabled {
                results.push(execute_check(check.as_ref(), ctx).await);
            } else {
                results.push(CheckResult {
                    id: def.id.clone(),
                    ok: true,
                    duration_ms: 0,
                    reason: Some(format!(
                        "toggle '{}' disabled",
                        def.toggle_name.as_deref().unwrap_or("")
                    )),
                    details: None,
                });
            }
        }

        self.finalize(ctx, results, start)
    }

    fn finalize(&self, ctx: &Context, results: Vec<CheckResult>, start: Instant) -> Report {
        debug_assert!(unique_ids(&results), "one result per attempted check");
        let report = Report::finalize(
            ctx.mode.mode,
            ctx.phase.phase,
            results,
            start.elapsed().as_millis() as u64,
        );
        info!(
            run_id = %report.run_id,
            overall_ok = report.overall_ok,
            passed = report.passed_count(),
            failed = report.failed_count(),
            "gate run finished"
        );
        report
    }
}

fn unique_ids(results: &[CheckResult]) -> bool {
    let mut seen = HashSet::new();
    results.iter().all(|r| seen.insert(&r.id))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Execute one check under its timeout, converting every failure shape
/// into a failed result at this boundary — errors, timeouts and panics
/// alike. A panicking check must not take its siblings or the report
/// down with it.
async fn execute_check(check: &dyn Check, ctx: &Context) -> CheckResult {
    let def = check.definition();
    let timeout = Duration::from_secs(def.timeout_secs.unwrap_or(ctx.config.check_timeout_secs));
    let start = Instant::now();

    info!(check = %def.id, stage = ?def.stage, "executing check");

    let body = AssertUnwindSafe(check.execute(ctx)).catch_unwind();
    let outcome = tokio::time::timeout(timeout, body).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(Ok(o))) => CheckResult {
            id: def.id.clone(),
            ok: o.ok,
            duration_ms,
            reason: o.reason,
            details: o.details,
        },
        Ok(Ok(Err(e))) => CheckResult {
            id: def.id.clone(),
            ok: false,
            duration_ms,
            reason: Some(format!("check error: {e}")),
            details: None,
        },
        Ok(Err(payload)) => {
            warn!(check = %def.id, "check panicked");
            CheckResult {
                id: def.id.clone(),
                ok: false,
                duration_ms,
                reason: Some(format!("check panicked: {}", panic_message(payload.as_ref()))),
                details: None,
            }
        }
        Err(_) => CheckResult {
            id: def.id.clone(),
            ok: false,
            duration_ms,
            reason: Some(format!("timed out after {}s", timeout.as_secs())),
            details: None,
        },
    }
}
