//! Diff coverage analysis: instrumentation coverage of changed lines only.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coverage::CoverageStore;
use crate::error::{GateError, Result};

/// Kind of change a line underwent. Deleted lines are never
/// coverage-relevant and are not materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
}

/// One changed line in the new side of the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedLine {
    pub file: String,
    pub line: u32,
    pub kind: ChangeKind,
}

/// Result of diff coverage analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffCoverageReport {
    /// Percentage of changed lines covered, in [0, 100]. Exactly 100 when
    /// no lines changed (vacuous satisfaction).
    pub percentage: f64,

    pub covered_lines: usize,
    pub total_lines: usize,

    /// Threshold the percentage was compared against.
    pub threshold: f64,

    /// Whether the percentage meets the threshold.
    pub ok: bool,

    /// Changed lines left uncovered, for direct actionability.
    pub uncovered: Vec<(String, u32)>,

    /// Changed files with no coverage entry; counted fully uncovered.
    pub unmatched_files: Vec<String>,
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32)> {
    // @@ -a,b +c,d @@ — only the new-side +c,d matters here.
    let err = || GateError::DataFormat(format!("malformed hunk header: {line}"));
    let plus = line.split_whitespace().nth(2).ok_or_else(err)?;
    let plus = plus.strip_prefix('+').ok_or_else(err)?;
    let (start, count) = match plus.split_once(',') {
        Some((s, c)) => (s, c),
        None => (plus, "1"),
    };
    let start: u32 = start.parse().map_err(|_| err())?;
    let count: u32 = count.parse().map_err(|_| err())?;
    Ok((start, count))
}

/// Parse a zero-context unified diff into the set of changed lines.
///
/// For each hunk `@@ -a,b +c,d @@` every new-file line in `[c, c+d)` is
/// changed; deleted-only hunks (d = 0) contribute nothing. A hunk that
/// both removes and adds lines is a modification, a pure addition is added.
pub fn parse_unified_diff(diff: &str) -> Result<Vec<ChangedLine>> {
    let mut changed = Vec::new();
    let mut current_file: Option<String> = None;

    for line in diff.lines() {
        if let Some(path) = line.strip_prefix("+++ ") {
            current_file = match path.trim() {
                "/dev/null" => None,
                p => Some(p.strip_prefix("b/").unwrap_or(p).to_string()),
            };
        } else if line.starts_with("@@") {
            let file = match &current_file {
                Some(f) => f.clone(),
                None => continue,
            };
            let minus = line
                .split_whitespace()
                .nth(1)
                .unwrap_or("")
                .trim_start_matches('-');
            let old_count: u32 = match minus.split_once(',') {
                Some((_, c)) => c.parse().unwrap_or(1),
                None => 1,
            };
            let (start, count) = parse_hunk_header(line)?;
            let kind = if old_count == 0 {
                ChangeKind::Added
            } else {
                ChangeKind::Modified
            };
            for offset in 0..count {
                changed.push(ChangedLine {
                    file: file.clone(),
                    line: start + offset,
                    kind,
                });
            }
        }
    }

    Ok(changed)
}

/// Compute coverage of the changed lines against the instrumentation map.
pub fn analyze_diff_coverage(
    repo_root: &Path,
    changed: &[ChangedLine],
    store: &CoverageStore,
    threshold: f64,
) -> DiffCoverageReport {
    let total_lines = changed.len();

    // Vacuous satisfaction: nothing changed means nothing can be uncovered.
    if total_lines == 0 {
        return DiffCoverageReport {
            percentage: 100.0,
            covered_lines: 0,
            total_lines: 0,
            threshold,
            ok: true,
            uncovered: Vec::new(),
            unmatched_files: Vec::new(),
        };
    }

    let mut covered_lines = 0usize;
    let mut uncovered = Vec::new();
    let mut unmatched_files = Vec::new();

    for cl in changed {
        match store.resolve(repo_root, &cl.file) {
            Some((_, entry)) => {
                if entry.line_covered(cl.line) {
                    covered_lines += 1;
                } else {
                    uncovered.push((cl.file.clone(), cl.line));
                }
            }
            None => {
                if !unmatched_files.contains(&cl.file) {
                    warn!(file = %cl.file, "no coverage entry for changed file, counting as uncovered");
                    unmatched_files.push(cl.file.clone());
                }
                uncovered.push((cl.file.clone(), cl.line));
            }
        }
    }

    let percentage = covered_lines as f64 / total_lines as f64 * 100.0;
    let ok = percentage >= threshold;

    info!(
        covered = covered_lines,
        total = total_lines,
        percentage,
        threshold,
        "diff coverage computed"
    );

    DiffCoverageReport {
        percentage,
        covered_lines,
        total_lines,
        threshold,
        ok,
        uncovered,
        unmatched_files,
    }
}

impl DiffCoverageReport {
    /// Human-readable failure reason including the numeric shortfall.
    pub fn shortfall_reason(&self) -> String {
        format!(
            "diff coverage {:.2}% below threshold {:.2}% (shortfall {:.2} points); {} uncovered line(s)",
            self.percentage,
            self.threshold,
            self.threshold - self.percentage,
            self.uncovered.len()
        )
    }
}
