//! Per-row run summaries printed by `formfill run`

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use formfill_core_types::{FillRunResult, MonitorOutcome, StepStatus};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowReport {
    /// 1-based row number in the CSV file.
    pub row: usize,
    pub result: FillRunResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorOutcome>,
}

impl RowReport {
    /// The fill succeeded and, when watched, the page confirmed it.
    pub fn passed(&self) -> bool {
        self.result.success && self.monitor.as_ref().map_or(true, |m| m.succeeded)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.result
            .results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub mapping: String,
    pub started_at: DateTime<Utc>,
    pub rows: Vec<RowReport>,
}

impl RunSummary {
    pub fn new(mapping: impl Into<String>) -> Self {
        Self {
            mapping: mapping.into(),
            started_at: Utc::now(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, report: RowReport) {
        self.rows.push(report);
    }

    pub fn all_passed(&self) -> bool {
        self.rows.iter().all(RowReport::passed)
    }

    pub fn failed_rows(&self) -> usize {
        self.rows.iter().filter(|r| !r.passed()).count()
    }

    pub fn render_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Mapping '{}' ({} rows, started {})",
            self.mapping,
            self.rows.len(),
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for report in &self.rows {
            let verdict = if report.passed() { "ok" } else { "FAILED" };
            let _ = write!(
                out,
                "  row {:>3}: {:<6} {} succeeded, {} failed, {} skipped, {} manual",
                report.row,
                verdict,
                report.count(StepStatus::Success),
                report.count(StepStatus::Failed),
                report.count(StepStatus::Skipped),
                report.count(StepStatus::Manual),
            );
            if let Some(outcome) = &report.monitor {
                let _ = write!(out, "; monitor: {}", outcome.reason);
            }
            out.push('\n');
            for step in report.result.results.iter().filter(|r| r.is_failed()) {
                let _ = writeln!(
                    out,
                    "           step {}: {}",
                    step.step_id,
                    step.reason.as_deref().unwrap_or("failed")
                );
            }
        }
        let _ = writeln!(
            out,
            "{} of {} rows passed",
            self.rows.len() - self.failed_rows(),
            self.rows.len()
        );
        out
    }
}
