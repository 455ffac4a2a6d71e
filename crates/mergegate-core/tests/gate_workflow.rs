//! End-to-end gate workflow against a real git repository fixture.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use mergegate_core::{
    Check, CheckDefinition, CheckStage, CommandCheck, Context, DiffCoverageCheck, EnvInputs,
    GateConfig, GateError, GateRunner, CheckRegistry, Mode, Phase, PhasePolicyCheck, ToggleOracle,
};

fn git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Repo with one committed change: src/engine.rs gains three lines,
/// tests/engine_test.rs is touched alongside.
fn make_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    git(root, &["init", "-b", "main"]);
    git(root, &["config", "user.name", "fixture"]);
    git(root, &["config", "user.email", "fixture@example.com"]);

    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::create_dir_all(root.join("tests")).unwrap();
    std::fs::write(root.join("src/engine.rs"), "fn engine() {}\n").unwrap();
    std::fs::write(root.join("tests/engine_test.rs"), "// empty\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-m", "initial"]);

    std::fs::write(
        root.join("src/engine.rs"),
        "fn engine() {}\nfn a() {}\nfn b() {}\nfn c() {}\n",
    )
    .unwrap();
    std::fs::write(root.join("tests/engine_test.rs"), "// test a, b, c\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-m", "[green] implement a b c"]);
    dir
}

fn write_governance(root: &Path, coverage_json: &str, evidence_json: &str) {
    std::fs::create_dir_all(root.join(".mergegate")).unwrap();
    std::fs::write(root.join(".mergegate/coverage-map.json"), coverage_json).unwrap();
    std::fs::write(root.join(".mergegate/test-evidence.json"), evidence_json).unwrap();
}

fn cmd_check(id: &str, stage: CheckStage, argv: &[&str]) -> Arc<dyn Check> {
    Arc::new(CommandCheck::new(
        CheckDefinition::new(id, id, stage).quick(),
        argv.iter().map(|s| s.to_string()).collect(),
    ))
}

#[tokio::test]
async fn full_gate_run_passes_with_covered_change() {
    let fixture = make_fixture();
    let root = fixture.path();
    write_governance(
        root,
        r#"{"files":{"src/engine.rs":{
            "statements":[{"id":"s","start_line":1,"end_line":10,"hits":3}]
        },"tests/engine_test.rs":{
            "statements":[{"id":"t","start_line":1,"end_line":5,"hits":1}]
        }}}"#,
        r#"{"passed": 7, "failed": 0}"#,
    );

    let ctx = Context::build(root, "HEAD~1", GateConfig::default(), EnvInputs::default()).unwrap();
    assert_eq!(ctx.mode.mode, Mode::Functional);
    assert_eq!(ctx.phase.phase, Phase::Green);

    let mut registry = CheckRegistry::new();
    registry
        .register(cmd_check("lint", CheckStage::Critical, &["true"]))
        .unwrap();
    registry
        .register(cmd_check("typecheck", CheckStage::Critical, &["true"]))
        .unwrap();
    registry
        .register(cmd_check("tests", CheckStage::Parallel, &["true"]))
        .unwrap();
    registry
        .register(cmd_check("vuln-scan", CheckStage::Parallel, &["true"]))
        .unwrap();
    registry.register(Arc::new(DiffCoverageCheck::new())).unwrap();
    registry.register(Arc::new(PhasePolicyCheck::new())).unwrap();

    let toggles = ToggleOracle::new(&ctx.config);
    let report = GateRunner::new(registry).run(&ctx, &toggles, false).await;

    assert!(report.overall_ok, "report: {:#?}", report.results);
    assert_eq!(report.results.len(), 6);
    let coverage = report
        .results
        .iter()
        .find(|r| r.id == "diff-coverage")
        .unwrap();
    assert!(coverage.ok);
}

#[tokio::test]
async fn critical_lint_failure_stops_everything_else() {
    let fixture = make_fixture();
    let root = fixture.path();
    write_governance(root, r#"{"files":{}}"#, r#"{"passed": 1, "failed": 0}"#);

    let ctx = Context::build(root, "HEAD~1", GateConfig::default(), EnvInputs::default()).unwrap();

    let mut registry = CheckRegistry::new();
    registry
        .register(cmd_check("lint", CheckStage::Critical, &["false"]))
        .unwrap();
    registry
        .register(cmd_check("tests", CheckStage::Parallel, &["true"]))
        .unwrap();
    registry.register(Arc::new(DiffCoverageCheck::new())).unwrap();

    let toggles = ToggleOracle::new(&ctx.config);
    let report = GateRunner::new(registry).run(&ctx, &toggles, false).await;

    assert!(!report.overall_ok);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].id, "lint");
}

#[tokio::test]
async fn uncovered_change_fails_the_gate_with_actionable_detail() {
    let fixture = make_fixture();
    let root = fixture.path();
    // Only line 2 of the new lines is covered.
    write_governance(
        root,
        r#"{"files":{"src/engine.rs":{
            "statements":[{"id":"s","start_line":2,"end_line":2,"hits":1}]
        }}}"#,
        r#"{"passed": 7, "failed": 0}"#,
    );

    let ctx = Context::build(root, "HEAD~1", GateConfig::default(), EnvInputs::default()).unwrap();

    let mut registry = CheckRegistry::new();
    registry.register(Arc::new(DiffCoverageCheck::new())).unwrap();

    let toggles = ToggleOracle::new(&ctx.config);
    let report = GateRunner::new(registry).run(&ctx, &toggles, false).await;

    assert!(!report.overall_ok);
    let cov = &report.results[0];
    assert!(!cov.ok);
    let details = cov.details.as_ref().unwrap();
    assert!(details["uncovered"].as_array().unwrap().len() >= 1);
    assert!(cov.reason.as_deref().unwrap().contains("below threshold"));
}

#[test]
fn bogus_task_descriptor_aborts_before_any_check() {
    let fixture = make_fixture();
    let root = fixture.path();
    std::fs::create_dir_all(root.join(".mergegate")).unwrap();
    std::fs::write(
        root.join(".mergegate/task.json"),
        r#"{"mode":"bogus","updated_at":"2026-08-01","source":"planner","note":"x"}"#,
    )
    .unwrap();

    let err =
        Context::build(root, "HEAD~1", GateConfig::default(), EnvInputs::default()).unwrap_err();
    assert!(matches!(err, GateError::Configuration(_)));
    assert!(err.to_string().contains("bogus"));
}

#[tokio::test]
async fn non_functional_mode_short_circuits_functional_checks() {
    let fixture = make_fixture();
    let root = fixture.path();
    write_governance(root, r#"{"files":{}}"#, r#"{"passed": 1, "failed": 0}"#);

    let filler = "analysis detail ".repeat(20);
    std::fs::write(
        root.join(".mergegate/problem-analysis.md"),
        format!(
            "## Problem\n{filler}\n## Root Cause\n{filler}\n## Impact\n{filler}\n## Remediation\n{filler}\n"
        ),
    )
    .unwrap();

    let env = EnvInputs {
        mode_override: Some("non-functional".to_string()),
        ..Default::default()
    };
    let ctx = Context::build(root, "HEAD~1", GateConfig::default(), env).unwrap();
    assert_eq!(ctx.mode.mode, Mode::NonFunctional);

    let mut registry = CheckRegistry::new();
    registry.register(Arc::new(DiffCoverageCheck::new())).unwrap();
    registry.register(Arc::new(PhasePolicyCheck::new())).unwrap();

    let toggles = ToggleOracle::new(&ctx.config);
    let report = GateRunner::new(registry).run(&ctx, &toggles, false).await;

    assert!(report.overall_ok);
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert!(result.reason.as_deref().unwrap().contains("not applicable"));
    }
}

#[tokio::test]
async fn quick_run_only_executes_quick_checks() {
    let fixture = make_fixture();
    let root = fixture.path();
    write_governance(root, r#"{"files":{}}"#, r#"{"passed": 1, "failed": 0}"#);

    let ctx = Context::build(root, "HEAD~1", GateConfig::default(), EnvInputs::default()).unwrap();

    let mut registry = CheckRegistry::new();
    registry
        .register(cmd_check("lint", CheckStage::Critical, &["true"]))
        .unwrap();
    // Not quick-eligible: dropped by quick-mode filtering.
    registry.register(Arc::new(DiffCoverageCheck::new())).unwrap();

    let toggles = ToggleOracle::new(&ctx.config);
    let report = GateRunner::new(registry).run(&ctx, &toggles, true).await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].id, "lint");
    assert!(report.overall_ok);
}
