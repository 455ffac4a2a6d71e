//! Immutable run context.

use std::path::{Path, PathBuf};

use crate::config::GateConfig;
use crate::error::Result;
use crate::mode::{resolve_mode, ModeInputs, ModeResolution, TaskDescriptor};
use crate::phase::{classify_phase, PhaseClassification, TestEvidence};
use crate::vcs::VcsSnapshot;

/// Environment-derived mode inputs, gathered by the caller (the CLI reads
/// the actual process environment; tests construct them directly).
#[derive(Debug, Clone, Default)]
pub struct EnvInputs {
    pub mode_override: Option<String>,
    pub pr_labels: Vec<String>,
    pub pr_title: Option<String>,
    pub is_ci: bool,
}

/// Everything a check may read during a run.
///
/// Built once at process start; read-only for the run's duration. The VCS
/// snapshot and test evidence are loaded here and never refreshed mid-run,
/// so a run reflects one point-in-time state.
#[derive(Debug, Clone)]
pub struct Context {
    pub mode: ModeResolution,
    pub phase: PhaseClassification,
    pub vcs: VcsSnapshot,
    pub config: GateConfig,
    pub working_dir: PathBuf,
    pub test_evidence: Option<TestEvidence>,
}

impl Context {
    /// Build the run context.
    ///
    /// This is the only place a run can fail globally: a malformed task
    /// descriptor or an incomplete problem-analysis document is a
    /// configuration error raised here, before any check executes.
    pub fn build(
        working_dir: &Path,
        base_ref: &str,
        config: GateConfig,
        env: EnvInputs,
    ) -> Result<Self> {
        let descriptor = TaskDescriptor::load(&working_dir.join(&config.task_descriptor_path))?;

        let inputs = ModeInputs {
            env_override: env.mode_override,
            task_descriptor: descriptor,
            pr_labels: env.pr_labels,
            pr_title: env.pr_title,
        };
        let mode = resolve_mode(&inputs, &working_dir.join(&config.analysis_doc_path))?;

        let vcs = VcsSnapshot::capture(working_dir, base_ref, env.is_ci)?;
        let test_evidence = TestEvidence::load(&working_dir.join(&config.test_evidence_path))?;

        let phase = classify_phase(&vcs.commit_message, &vcs.changed_files, test_evidence);

        Ok(Self {
            mode,
            phase,
            vcs,
            config,
            working_dir: working_dir.to_path_buf(),
            test_evidence,
        })
    }

    /// Minimal context for tests that never touch git or governance files.
    #[doc(hidden)]
    pub fn for_tests() -> Self {
        use crate::mode::{Mode, ModeSourceKind};
        use crate::phase::Phase;

        Self {
            mode: ModeResolution {
                mode: Mode::Functional,
                source: ModeSourceKind::Default,
            },
            phase: PhaseClassification {
                phase: Phase::Unknown,
                confidence: 0.0,
                evidence: Vec::new(),
            },
            vcs: VcsSnapshot {
                current_branch: "main".to_string(),
                base_ref: "origin/main".to_string(),
                commit_message: String::new(),
                changed_files: Vec::new(),
                diff_text: String::new(),
                is_ci: false,
                has_uncommitted_changes: false,
            },
            config: GateConfig::default(),
            working_dir: std::env::temp_dir(),
            test_evidence: None,
        }
    }
}
