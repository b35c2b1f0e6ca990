//! Golden comparison — check a microbenchmark run against stored baselines.
//!
//! Every benchmark is classified before a verdict is reached, so a single
//! run reports all regressions at once. Only failures affect the exit code;
//! improvements and errored goldens are advisories.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PerfModelError, Result};

/// Default symmetric threshold, in percent.
pub const DEFAULT_THRESHOLD_PCT: f64 = 5.0;

/// A benchmark result file: `{"benchmarks": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub benchmarks: Vec<Benchmark>,
}

/// One benchmark entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub name: String,
    /// Time per iteration, in seconds. Required unless the benchmark errored.
    #[serde(rename = "IterationTime", default, skip_serializing_if = "Option::is_none")]
    pub iteration_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_occurred: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Benchmark {
    pub fn errored(&self) -> bool {
        self.error_occurred.unwrap_or(false)
    }

    /// Iteration time, 0 when an errored benchmark recorded none.
    pub fn time_or_zero(&self) -> f64 {
        self.iteration_time.unwrap_or(0.0)
    }
}

/// Outcome for one benchmark name.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Within the threshold.
    Pass { pct: f64 },
    /// Slower than the golden by more than the threshold.
    Regression { pct: f64 },
    /// Faster than the golden by more than the threshold.
    Improvement { pct: f64 },
    /// Golden errored but the new run succeeded.
    GoldenErrored,
    /// New run errored but the golden did not.
    NewErrored { message: String },
    /// Present in the new run but not in the goldens.
    MissingFromGolden,
    /// Present in the goldens but not in the new run.
    MissingFromResults,
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Regression { .. }
                | Self::NewErrored { .. }
                | Self::MissingFromGolden
                | Self::MissingFromResults
        )
    }

    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::Improvement { .. } | Self::GoldenErrored)
    }
}

/// A verdict attached to a benchmark name.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub name: String,
    pub verdict: Verdict,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = &self.name;
        match &self.verdict {
            Verdict::Pass { pct } => write!(f, "{name}: {pct:+.2}% within threshold"),
            Verdict::Regression { pct } => write!(f, "{name}: {pct:.2}% worse"),
            Verdict::Improvement { pct } => write!(
                f,
                "{name}: {:.2}% better, consider adjusting baselines",
                pct.abs()
            ),
            Verdict::GoldenErrored => write!(
                f,
                "{name}: golden errored but new run succeeded, consider adjusting baselines"
            ),
            Verdict::NewErrored { message } => write!(f, "{name}: new run errored: {message}"),
            Verdict::MissingFromGolden => write!(f, "{name}: not present in goldens"),
            Verdict::MissingFromResults => write!(f, "{name}: missing from new results"),
        }
    }
}

/// All findings of one comparison.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub threshold_pct: f64,
    /// Goldens in file order, then names only present in the new run.
    pub findings: Vec<Finding>,
}

impl Comparison {
    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.verdict.is_failure())
    }

    pub fn advisories(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.verdict.is_advisory())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// 0 iff no benchmark failed.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failure_count() > 0)
    }
}

/// `new / golden · 100 − 100`
pub fn percent_change(new: f64, golden: f64) -> f64 {
    if golden == 0.0 {
        if new == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        new / golden * 100.0 - 100.0
    }
}

/// Compare `new` against `golden` with a symmetric `threshold_pct`.
pub fn compare(new: &BenchmarkReport, golden: &BenchmarkReport, threshold_pct: f64) -> Comparison {
    let mut findings = Vec::with_capacity(golden.benchmarks.len());

    for g in &golden.benchmarks {
        let verdict = match new.benchmarks.iter().find(|n| n.name == g.name) {
            None => Verdict::MissingFromResults,
            Some(n) if g.errored() && !n.errored() => Verdict::GoldenErrored,
            Some(n) if n.errored() && !g.errored() => Verdict::NewErrored {
                message: n
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "no error message".to_string()),
            },
            Some(n) => {
                let pct = percent_change(n.time_or_zero(), g.time_or_zero());
                if pct > threshold_pct {
                    Verdict::Regression { pct }
                } else if pct < -threshold_pct {
                    Verdict::Improvement { pct }
                } else {
                    Verdict::Pass { pct }
                }
            }
        };
        findings.push(Finding {
            name: g.name.clone(),
            verdict,
        });
    }

    let golden_names: BTreeSet<&str> = golden.benchmarks.iter().map(|b| b.name.as_str()).collect();
    for n in &new.benchmarks {
        if !golden_names.contains(n.name.as_str()) {
            findings.push(Finding {
                name: n.name.clone(),
                verdict: Verdict::MissingFromGolden,
            });
        }
    }

    Comparison {
        threshold_pct,
        findings,
    }
}

pub fn parse_report_str(json: &str, source_name: &str) -> Result<BenchmarkReport> {
    let report: BenchmarkReport = serde_json::from_str(json)?;
    let mut seen = BTreeSet::new();
    for b in &report.benchmarks {
        if !seen.insert(b.name.as_str()) {
            return Err(PerfModelError::invalid(format!(
                "{source_name}: duplicate benchmark '{}'",
                b.name
            )));
        }
        if b.errored() {
            continue;
        }
        match b.iteration_time {
            None => {
                return Err(PerfModelError::invalid(format!(
                    "{source_name}: benchmark '{}' has no IterationTime",
                    b.name
                )));
            }
            Some(t) if !(t.is_finite() && t >= 0.0) => {
                return Err(PerfModelError::invalid(format!(
                    "{source_name}: benchmark '{}' has invalid IterationTime {t}",
                    b.name
                )));
            }
            Some(_) => {}
        }
    }
    Ok(report)
}

pub fn load_report(path: &Path) -> Result<BenchmarkReport> {
    let json = std::fs::read_to_string(path)?;
    parse_report_str(&json, &path.display().to_string())
}

/// `goldens/<file name>` next to the new result file.
pub fn default_golden_path(new_results: &Path) -> Result<PathBuf> {
    let file_name = new_results.file_name().ok_or_else(|| {
        PerfModelError::invalid(format!("{} has no file name", new_results.display()))
    })?;
    let dir = new_results.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join("goldens").join(file_name))
}

/// Load both files and compare them.
pub fn compare_files(new_path: &Path, golden_path: &Path, threshold_pct: f64) -> Result<Comparison> {
    if !threshold_pct.is_finite() || threshold_pct < 0.0 {
        return Err(PerfModelError::invalid(format!(
            "threshold must be a non-negative percentage, got {threshold_pct}"
        )));
    }
    let new = load_report(new_path)?;
    let golden = load_report(golden_path)?;
    Ok(compare(&new, &golden, threshold_pct))
}

/// Render findings as a plain-text report.
///
/// Passing benchmarks are listed only when `verbose` is set.
pub fn render_report(comparison: &Comparison, verbose: bool) -> String {
    let mut out = String::new();
    for finding in &comparison.findings {
        let tag = if finding.verdict.is_failure() {
            "FAIL"
        } else if finding.verdict.is_advisory() {
            "NOTE"
        } else if verbose {
            "PASS"
        } else {
            continue;
        };
        let _ = writeln!(out, "[{tag}] {finding}");
    }
    let failures = comparison.failure_count();
    let advisories = comparison.advisories().count();
    let _ = writeln!(
        out,
        "{} benchmark(s), {failures} failure(s), {advisories} advisory(ies), threshold {:.2}%",
        comparison.findings.len(),
        comparison.threshold_pct
    );
    out
}

#[cfg(test)]
mod tests {
    include!("golden_tests.rs");
}
