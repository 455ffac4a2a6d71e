//! Run report artifact.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::check::CheckResult;
use crate::error::Result;
use crate::mode::Mode;
use crate::phase::Phase;

/// Aggregated outcome of one gate run.
///
/// Finalized once and never mutated after emission; the written artifact
/// is the sole durable record of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub mode: Mode,
    pub phase: Phase,
    pub results: Vec<CheckResult>,
    pub overall_ok: bool,
    pub total_duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl Report {
    /// Aggregate check results into a finalized report.
    pub fn finalize(
        mode: Mode,
        phase: Phase,
        results: Vec<CheckResult>,
        total_duration_ms: u64,
    ) -> Self {
        let overall_ok = results.iter().all(|r| r.ok);
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            mode,
            phase,
            results,
            overall_ok,
            total_duration_ms,
            finished_at: Utc::now(),
        }
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.ok).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.ok).count()
    }

    /// Content digest of the serialized report, for artifact integrity.
    pub fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Write the report as pretty JSON, once per run.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, ok: bool) -> CheckResult {
        CheckResult {
            id: id.to_string(),
            ok,
            duration_ms: 10,
            reason: if ok { None } else { Some("boom".to_string()) },
            details: None,
        }
    }

    #[test]
    fn all_ok_means_overall_ok() {
        let report = Report::finalize(
            Mode::Functional,
            Phase::Green,
            vec![result("a", true), result("b", true)],
            20,
        );
        assert!(report.overall_ok);
        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.failed_count(), 0);
    }

    #[test]
    fn one_failure_fails_overall() {
        let report = Report::finalize(
            Mode::Functional,
            Phase::Unknown,
            vec![result("a", true), result("b", false)],
            20,
        );
        assert!(!report.overall_ok);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn empty_results_is_vacuously_ok() {
        let report = Report::finalize(Mode::NonFunctional, Phase::Unknown, vec![], 0);
        assert!(report.overall_ok);
    }

    #[test]
    fn write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        let report = Report::finalize(Mode::Functional, Phase::Red, vec![result("a", true)], 5);
        report.write_json(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let reloaded: Report = serde_json::from_str(&raw).unwrap();
        assert_eq!(reloaded.run_id, report.run_id);
        assert_eq!(reloaded.results.len(), 1);
    }

    #[test]
    fn digest_is_stable_hex() {
        let report = Report::finalize(Mode::Functional, Phase::Green, vec![], 0);
        let d1 = report.digest().unwrap();
        let d2 = report.digest().unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
    }
}
