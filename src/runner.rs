//! Running a whole suite: load, discover, then execute and check every case.

use serde::Serialize;

use crate::assertion::{Checker, Failure, Verdict};
use crate::config::HarnessConfig;
use crate::discovery::{discover, Suite};
use crate::engine::Structured;
use crate::errors::HarnessError;
use crate::executor::{execute, Context};
use crate::loader::{DocumentLoader, YamlLoader};

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaseStatus {
    Pass,
    Fail { failures: Vec<Failure> },
    Skip { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub group: String,
    pub case: String,
    #[serde(flatten)]
    pub status: CaseStatus,
}

/// Every case report in run order, with totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteSummary {
    pub reports: Vec<CaseReport>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Failed cases where the harness itself could not complete a check.
    pub internal: usize,
}

impl SuiteSummary {
    fn record(&mut self, report: CaseReport) {
        match &report.status {
            CaseStatus::Pass => self.passed += 1,
            CaseStatus::Fail { failures } => {
                self.failed += 1;
                if failures.iter().any(Failure::is_internal) {
                    self.internal += 1;
                }
            }
            CaseStatus::Skip { .. } => self.skipped += 1,
        }
        self.reports.push(report);
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Reports grouped by consecutive group name, in run order.
    pub fn groups(&self) -> Vec<(&str, &[CaseReport])> {
        let mut groups: Vec<(&str, &[CaseReport])> = Vec::new();
        let mut start = 0;
        for i in 1..=self.reports.len() {
            if i == self.reports.len() || self.reports[i].group != self.reports[start].group {
                groups.push((self.reports[start].group.as_str(), &self.reports[start..i]));
                start = i;
            }
        }
        groups
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Loads the suite at `config.root` with the bundled YAML loader and runs it.
pub fn run_suite(config: &HarnessConfig) -> Result<SuiteSummary, HarnessError> {
    run_suite_with(&YamlLoader, config)
}

pub fn run_suite_with<L: DocumentLoader>(loader: &L, config: &HarnessConfig) -> Result<SuiteSummary, HarnessError> {
    let (document, suite) = load_suite(loader, config)?;
    Ok(run_cases(&document, &suite, config))
}

/// Loads and decodes without running anything.
pub fn load_suite<L: DocumentLoader>(
    loader: &L,
    config: &HarnessConfig,
) -> Result<(L::Value, Suite<L::Value>), HarnessError> {
    let document = loader.load(&config.root, &config.pattern, &config.tags)?;
    let suite = discover(&document, config.definition_mode)?;
    Ok((document, suite))
}

/// Runs every discovered case in group order.
pub fn run_cases<V: Structured>(document: &V, suite: &Suite<V>, config: &HarnessConfig) -> SuiteSummary {
    let ctx = Context::new(document);
    let checker = Checker::new(config.preview_limit);
    let mut summary = SuiteSummary::default();

    for (group, cases) in suite.iter() {
        for case in cases {
            let status = if config.filters_out(&case.name) {
                CaseStatus::Skip {
                    reason: format!(
                        "filtered out by {:?}",
                        config.filter.as_deref().unwrap_or_default()
                    ),
                }
            } else {
                let outcome = execute(&ctx, case);
                match checker.check(&outcome, case) {
                    Verdict::Pass => CaseStatus::Pass,
                    Verdict::Fail(report) => {
                        if report.is_internal() {
                            tracing::warn!(case = %case, "harness could not complete a check");
                        }
                        tracing::debug!("{report}");
                        CaseStatus::Fail {
                            failures: report.failures,
                        }
                    }
                }
            };
            tracing::debug!(group, case = %case.name, status = status_name(&status), "ran case");
            summary.record(CaseReport {
                group: group.to_string(),
                case: case.name.clone(),
                status,
            });
        }
    }

    tracing::info!(
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        "suite finished"
    );
    summary
}

fn status_name(status: &CaseStatus) -> &'static str {
    match status {
        CaseStatus::Pass => "pass",
        CaseStatus::Fail { .. } => "fail",
        CaseStatus::Skip { .. } => "skip",
    }
}
