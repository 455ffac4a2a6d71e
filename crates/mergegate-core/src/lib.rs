//! Mergegate core library.
//!
//! Pre-merge verification gate: decides whether a single changeset may
//! proceed by running a staged battery of checks and aggregating their
//! verdicts into one pass/fail decision plus an audit report.

pub mod builtin;
pub mod cache;
pub mod check;
pub mod config;
pub mod context;
pub mod coverage;
pub mod diffcov;
pub mod error;
pub mod mode;
pub mod phase;
pub mod policy;
pub mod report;
pub mod runner;
pub mod vcs;

pub use builtin::{DiffCoverageCheck, PhasePolicyCheck};
pub use cache::TtlCache;
pub use check::{Check, CheckDefinition, CheckOutcome, CheckResult, CheckStage, CommandCheck};
pub use config::GateConfig;
pub use context::{Context, EnvInputs};
pub use coverage::{CoverageStore, FileCoverage, PathMatch};
pub use diffcov::{
    analyze_diff_coverage, parse_unified_diff, ChangeKind, ChangedLine, DiffCoverageReport,
};
pub use error::{GateError, Result};
pub use mode::{
    resolve_mode, validate_analysis_doc, Mode, ModeInputs, ModeResolution, ModeSourceKind,
    TaskDescriptor,
};
pub use phase::{
    classify_phase, EvidenceSource, Phase, PhaseClassification, PhaseEvidence, TestEvidence,
};
pub use policy::{enforce_phase_policy, PolicyVerdict};
pub use report::Report;
pub use runner::{CheckRegistry, GateRunner, ToggleOracle};
pub use vcs::VcsSnapshot;

/// Mergegate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
