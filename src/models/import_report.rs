//! Import outcome models

use serde::Serialize;
use utoipa::ToSchema;

use super::enums::RowKind;

/// Result of importing one row
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Created {
        /// 1-based line in the uploaded file (header is line 1)
        line: u64,
        /// Natural key of the row: accession number or email address
        key: Option<String>,
        id: i64,
    },
    Failed {
        line: u64,
        key: Option<String>,
        reason: String,
    },
}

impl RowOutcome {
    pub fn line(&self) -> u64 {
        match self {
            RowOutcome::Created { line, .. } | RowOutcome::Failed { line, .. } => *line,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, RowOutcome::Created { .. })
    }
}

/// Receives every row outcome of an import, in row order.
pub trait OutcomeSink {
    fn record(&mut self, outcome: RowOutcome);
}

impl OutcomeSink for Vec<RowOutcome> {
    fn record(&mut self, outcome: RowOutcome) {
        self.push(outcome);
    }
}

/// Summary returned to the uploader. Successful rows are only counted so the
/// report stays small for large uploads. Failures are kept for follow-up up to
/// a limit; past it they are counted in `failures_omitted` and only logged.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ImportReport {
    pub kind: RowKind,
    pub processed: u64,
    pub created: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RowOutcome>,
    #[serde(skip_serializing_if = "is_zero")]
    pub failures_omitted: u64,
    #[serde(skip)]
    max_failures: usize,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl ImportReport {
    pub fn new(kind: RowKind, max_failures: usize) -> Self {
        Self {
            kind,
            processed: 0,
            created: 0,
            failed: 0,
            failures: Vec::new(),
            failures_omitted: 0,
            max_failures,
        }
    }
}

impl OutcomeSink for ImportReport {
    fn record(&mut self, outcome: RowOutcome) {
        self.processed += 1;
        if outcome.is_created() {
            self.created += 1;
        } else {
            self.failed += 1;
            if self.failures.len() < self.max_failures {
                self.failures.push(outcome);
            } else {
                self.failures_omitted += 1;
            }
        }
    }
}
