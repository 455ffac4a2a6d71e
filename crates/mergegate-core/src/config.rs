//! Gate configuration loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

fn default_coverage_threshold() -> f64 {
    85.0
}

fn default_refactor_threshold() -> f64 {
    75.0
}

fn default_check_timeout_secs() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_coverage_map_path() -> PathBuf {
    PathBuf::from(".mergegate/coverage-map.json")
}

fn default_task_descriptor_path() -> PathBuf {
    PathBuf::from(".mergegate/task.json")
}

fn default_analysis_doc_path() -> PathBuf {
    PathBuf::from(".mergegate/problem-analysis.md")
}

fn default_test_evidence_path() -> PathBuf {
    PathBuf::from(".mergegate/test-evidence.json")
}

fn default_report_path() -> PathBuf {
    PathBuf::from(".mergegate/report.json")
}

/// Gate configuration.
///
/// Loaded once per run from a JSON file; a missing file yields the defaults,
/// a malformed file is a hard configuration error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Diff coverage threshold for functional-mode work (percent).
    pub coverage_threshold: f64,

    /// Lower diff coverage threshold applied when the classified phase
    /// is refactor.
    pub refactor_coverage_threshold: f64,

    /// Default per-check timeout in seconds.
    pub check_timeout_secs: u64,

    /// Named toggles gating optional-stage checks.
    pub toggles: HashMap<String, bool>,

    /// Path to the persisted coverage instrumentation map.
    pub coverage_map_path: PathBuf,

    /// Path to the persisted task descriptor document.
    pub task_descriptor_path: PathBuf,

    /// Path to the problem-analysis document required for
    /// non-functional work.
    pub analysis_doc_path: PathBuf,

    /// Path to the test-evidence log written at test-run time.
    pub test_evidence_path: PathBuf,

    /// Where the report artifact is written.
    pub report_path: PathBuf,

    /// Toggle-lookup cache capacity.
    pub cache_capacity: usize,

    /// Toggle-lookup cache TTL in seconds.
    pub cache_ttl_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: default_coverage_threshold(),
            refactor_coverage_threshold: default_refactor_threshold(),
            check_timeout_secs: default_check_timeout_secs(),
            toggles: HashMap::new(),
            coverage_map_path: default_coverage_map_path(),
            task_descriptor_path: default_task_descriptor_path(),
            analysis_doc_path: default_analysis_doc_path(),
            test_evidence_path: default_test_evidence_path(),
            report_path: default_report_path(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl GateConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file is not an error; defaults apply. A present but
    /// malformed file aborts the run before any check executes.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            GateError::Configuration(format!("malformed config {}: {e}", path.display()))
        })
    }

    /// Whether a named toggle is enabled. Unregistered toggles are off.
    pub fn toggle_enabled(&self, name: &str) -> bool {
        self.toggles.get(name).copied().unwrap_or(false)
    }
}
