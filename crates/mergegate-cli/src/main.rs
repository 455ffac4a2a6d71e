//! Mergegate - pre-merge verification gate CLI
//!
//! ## Commands
//!
//! - `run`: execute the full staged check battery
//! - `quick`: execute only the quick-mode-eligible subset
//!
//! Exit code is 0 iff every attempted check passed. The `MERGEGATE_MODE`
//! environment variable is the highest-priority delivery-mode override.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use mergegate_core::{
    Check, CheckDefinition, CheckRegistry, CheckStage, CommandCheck, Context, DiffCoverageCheck,
    EnvInputs, GateConfig, GateRunner, PhasePolicyCheck, Report, ToggleOracle,
};

#[derive(Parser)]
#[command(name = "mergegate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pre-merge verification gate", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Repository to gate (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Gate configuration file (default: .mergegate/gate.json in workspace)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base reference the diff is computed against
    #[arg(long, global = true, default_value = "origin/main")]
    base: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full staged check battery
    Run,

    /// Run only the quick-mode-eligible subset of checks
    Quick,
}

fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

fn env_inputs() -> EnvInputs {
    EnvInputs {
        mode_override: std::env::var("MERGEGATE_MODE").ok(),
        pr_labels: std::env::var("MERGEGATE_PR_LABELS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        pr_title: std::env::var("MERGEGATE_PR_TITLE").ok(),
        is_ci: std::env::var("CI").is_ok(),
    }
}

fn command_check(id: &str, name: &str, stage: CheckStage, argv: &[&str]) -> Arc<dyn Check> {
    let quick = matches!(stage, CheckStage::Critical);
    let mut def = CheckDefinition::new(id, name, stage);
    if quick {
        def = def.quick();
    }
    Arc::new(CommandCheck::new(
        def,
        argv.iter().map(|s| s.to_string()).collect(),
    ))
}

/// Register the builtin check battery.
///
/// Critical checks are quick-mode eligible; the heavier parallel and
/// mode-specific checks are not.
fn build_registry() -> Result<CheckRegistry> {
    let mut registry = CheckRegistry::new();

    registry.register(command_check(
        "lint",
        "Lint",
        CheckStage::Critical,
        &["cargo", "clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    ))?;
    registry.register(command_check(
        "typecheck",
        "Type check",
        CheckStage::Critical,
        &["cargo", "check", "--workspace"],
    ))?;

    registry.register(command_check(
        "tests",
        "Test suite",
        CheckStage::Parallel,
        &["cargo", "test", "--workspace"],
    ))?;
    registry.register(command_check(
        "vuln-scan",
        "Dependency vulnerability scan",
        CheckStage::Parallel,
        &["cargo", "audit"],
    ))?;
    registry.register(command_check(
        "api-lint",
        "API specification lint",
        CheckStage::Parallel,
        &["cargo", "doc", "--workspace", "--no-deps"],
    ))?;

    registry.register(Arc::new(DiffCoverageCheck::new()))?;
    registry.register(Arc::new(PhasePolicyCheck::new()))?;

    registry.register(Arc::new(CommandCheck::new(
        CheckDefinition::new(
            "migration-dry-run",
            "Disposable-database migration dry run",
            CheckStage::Optional,
        )
        .toggle("migration_checks"),
        vec!["cargo".to_string(), "run".to_string(), "--bin".to_string(), "migrate".to_string()],
    )))?;

    Ok(registry)
}

fn print_summary(report: &Report) {
    for result in &report.results {
        let status = if result.ok { "PASS" } else { "FAIL" };
        match &result.reason {
            Some(reason) => println!(
                "  {} {} ({}ms) - {}",
                status, result.id, result.duration_ms, reason
            ),
            None => println!("  {} {} ({}ms)", status, result.id, result.duration_ms),
        }
    }
    println!(
        "{}: {} passed, {} failed in {}ms",
        if report.overall_ok { "OK" } else { "FAILED" },
        report.passed_count(),
        report.failed_count(),
        report.total_duration_ms
    );
}

async fn run_gate(cli: &Cli, quick: bool) -> Result<Report> {
    let workspace = cli
        .workspace
        .canonicalize()
        .with_context(|| format!("workspace {} not found", cli.workspace.display()))?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| workspace.join(".mergegate/gate.json"));
    let config = GateConfig::load(&config_path)?;
    let report_path = workspace.join(&config.report_path);

    let ctx = Context::build(&workspace, &cli.base, config, env_inputs())?;
    info!(
        mode = ctx.mode.mode.as_str(),
        mode_source = ?ctx.mode.source,
        phase = ctx.phase.phase.as_str(),
        branch = %ctx.vcs.current_branch,
        changed_files = ctx.vcs.changed_files.len(),
        "context built"
    );

    let registry = build_registry()?;
    let toggles = ToggleOracle::new(&ctx.config);
    let report = GateRunner::new(registry).run(&ctx, &toggles, quick).await;

    report.write_json(&report_path)?;
    info!(
        report = %report_path.display(),
        digest = %report.digest()?,
        "report written"
    );

    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let quick = matches!(cli.command, Commands::Quick);
    let report = run_gate(&cli, quick).await?;

    print_summary(&report);

    if !report.overall_ok {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_unique_ids_across_all_stages() {
        let registry = build_registry().unwrap();
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn cli_parses_run_and_quick() {
        let cli = Cli::try_parse_from(["mergegate", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run));
        let cli =
            Cli::try_parse_from(["mergegate", "quick", "--base", "origin/develop"]).unwrap();
        assert!(matches!(cli.command, Commands::Quick));
        assert_eq!(cli.base, "origin/develop");
    }
}
