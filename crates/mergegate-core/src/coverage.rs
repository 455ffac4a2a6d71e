//! Persisted per-file instrumentation map with hit counters.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GateError, Result};

/// Statement instrumentation range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementRange {
    pub id: String,
    pub start_line: u32,
    pub end_line: u32,
    pub hits: u64,
}

/// Branch instrumentation point: one line, one hit counter per arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRange {
    pub id: String,
    pub line: u32,
    pub arm_hits: Vec<u64>,
}

/// Function instrumentation range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRange {
    pub id: String,
    pub start_line: u32,
    pub end_line: u32,
    pub hits: u64,
}

/// Instrumentation data for one source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCoverage {
    pub statements: Vec<StatementRange>,
    pub branches: Vec<BranchRange>,
    pub functions: Vec<FunctionRange>,
}

impl FileCoverage {
    /// Whether a line is covered.
    ///
    /// Priority order, first applicable rule decides:
    /// 1. an enclosing statement range with hits > 0;
    /// 2. else an enclosing function range with hits > 0;
    /// 3. else a branch at that exact line with at least one arm hit.
    pub fn line_covered(&self, line: u32) -> bool {
        if let Some(stmt) = self
            .statements
            .iter()
            .find(|s| s.start_line <= line && line <= s.end_line)
        {
            return stmt.hits > 0;
        }
        if let Some(func) = self
            .functions
            .iter()
            .find(|f| f.start_line <= line && line <= f.end_line)
        {
            return func.hits > 0;
        }
        if let Some(branch) = self.branches.iter().find(|b| b.line == line) {
            return branch.arm_hits.iter().any(|&h| h > 0);
        }
        false
    }
}

/// How a diff path was matched to a coverage map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMatch {
    Absolute,
    AsGiven,
    Suffix,
}

/// Loaded coverage store, keyed by instrumentation path (absolute or
/// relative, depending on the tool that wrote it).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageStore {
    pub files: BTreeMap<String, FileCoverage>,
}

impl CoverageStore {
    /// Load the coverage map. A missing file yields an empty store; a
    /// present but unparsable file is a data format error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "coverage map not found, treating all lines as uncovered");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            GateError::DataFormat(format!(
                "coverage map {} unparsable: {e}",
                path.display()
            ))
        })
    }

    /// Resolve a diff path to a coverage entry.
    ///
    /// Strategies in order, first hit wins: exact absolute-path match,
    /// exact path-as-given match, suffix match against available keys.
    /// The suffix strategy is a heuristic with false-positive risk when
    /// multiple files share a basename, so a suffix hit is logged.
    pub fn resolve(&self, repo_root: &Path, file: &str) -> Option<(PathMatch, &FileCoverage)> {
        let absolute = repo_root.join(file).to_string_lossy().to_string();
        if let Some(entry) = self.files.get(&absolute) {
            return Some((PathMatch::Absolute, entry));
        }
        if let Some(entry) = self.files.get(file) {
            return Some((PathMatch::AsGiven, entry));
        }
        for (key, entry) in &self.files {
            if key.ends_with(file) {
                warn!(diff_path = file, matched_key = %key, "coverage entry resolved via suffix match");
                return Some((PathMatch::Suffix, entry));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn stmt(start: u32, end: u32, hits: u64) -> StatementRange {
        StatementRange {
            id: format!("s{start}"),
            start_line: start,
            end_line: end,
            hits,
        }
    }

    #[test]
    fn statement_rule_decides_first() {
        let cov = FileCoverage {
            statements: vec![stmt(5, 5, 0)],
            // Function range covers line 5 with hits, but the statement
            // rule already decided uncovered.
            functions: vec![FunctionRange {
                id: "f".to_string(),
                start_line: 1,
                end_line: 10,
                hits: 3,
            }],
            branches: vec![],
        };
        assert!(!cov.line_covered(5));

        let cov_hit = FileCoverage {
            statements: vec![stmt(5, 5, 1)],
            ..Default::default()
        };
        assert!(cov_hit.line_covered(5));
    }

    #[test]
    fn function_rule_applies_when_no_statement_encloses() {
        let cov = FileCoverage {
            functions: vec![FunctionRange {
                id: "f".to_string(),
                start_line: 1,
                end_line: 10,
                hits: 2,
            }],
            ..Default::default()
        };
        assert!(cov.line_covered(7));
        assert!(!cov.line_covered(11));
    }

    #[test]
    fn branch_rule_needs_exact_line_and_one_arm() {
        let cov = FileCoverage {
            branches: vec![BranchRange {
                id: "b".to_string(),
                line: 9,
                arm_hits: vec![0, 4],
            }],
            ..Default::default()
        };
        assert!(cov.line_covered(9));
        assert!(!cov.line_covered(8));

        let cold = FileCoverage {
            branches: vec![BranchRange {
                id: "b".to_string(),
                line: 9,
                arm_hits: vec![0, 0],
            }],
            ..Default::default()
        };
        assert!(!cold.line_covered(9));
    }

    #[test]
    fn resolve_prefers_absolute_then_as_given_then_suffix() {
        let root = PathBuf::from("/repo");
        let mut store = CoverageStore::default();
        store.files.insert(
            "/repo/src/a.rs".to_string(),
            FileCoverage {
                statements: vec![stmt(1, 1, 1)],
                ..Default::default()
            },
        );
        store
            .files
            .insert("src/b.rs".to_string(), FileCoverage::default());
        store
            .files
            .insert("/ci/workdir/src/c.rs".to_string(), FileCoverage::default());

        assert_eq!(
            store.resolve(&root, "src/a.rs").unwrap().0,
            PathMatch::Absolute
        );
        assert_eq!(
            store.resolve(&root, "src/b.rs").unwrap().0,
            PathMatch::AsGiven
        );
        assert_eq!(
            store.resolve(&root, "src/c.rs").unwrap().0,
            PathMatch::Suffix
        );
        assert!(store.resolve(&root, "src/d.rs").is_none());
    }

    #[test]
    fn load_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CoverageStore::load(&dir.path().join("cov.json")).unwrap();
        assert!(store.files.is_empty());
    }

    #[test]
    fn load_unparsable_file_is_data_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            CoverageStore::load(&path).unwrap_err(),
            GateError::DataFormat(_)
        ));
    }

    #[test]
    fn load_parses_full_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.json");
        std::fs::write(
            &path,
            r#"{"files":{"src/a.rs":{
                "statements":[{"id":"s1","start_line":1,"end_line":3,"hits":2}],
                "branches":[{"id":"b1","line":4,"arm_hits":[1,0]}],
                "functions":[{"id":"f1","start_line":1,"end_line":10,"hits":2}]
            }}}"#,
        )
        .unwrap();
        let store = CoverageStore::load(&path).unwrap();
        let cov = &store.files["src/a.rs"];
        assert_eq!(cov.statements.len(), 1);
        assert!(cov.line_covered(2));
        assert!(cov.line_covered(4));
    }
}
