//! Row import: a fold over the row stream that records one outcome per row.
//!
//! A row either creates its item (or user) completely or fails on its own;
//! the batch always runs to the end of the stream.

use futures::{pin_mut, Stream, StreamExt};
use thiserror::Error;

use super::{
    layout,
    source::{RawRow, RowResult},
};
use crate::{
    catalog::{build_item_command, build_user_command},
    error::{AppError, FieldErrors},
    models::{
        enums::RowKind,
        import_report::{ImportReport, OutcomeSink, RowOutcome},
    },
    repository::Repository,
};

/// Why a row was not imported. Never leaves the pipeline except as text in
/// a [`RowOutcome::Failed`].
#[derive(Debug, Error)]
pub enum RowError {
    #[error("Unreadable row: {0}")]
    Parse(String),

    #[error("Invalid fields: {0}")]
    Invalid(FieldErrors),

    #[error("{0}")]
    Store(AppError),
}

/// Imports every row of `rows` and summarizes the outcomes, keeping at most
/// `max_reported_failures` failed rows in the report.
pub async fn import_rows<S>(
    repository: &dyn Repository,
    library_slug: &str,
    kind: RowKind,
    rows: S,
    max_reported_failures: usize,
) -> ImportReport
where
    S: Stream<Item = RowResult>,
{
    let mut report = ImportReport::new(kind, max_reported_failures);
    import_into(repository, library_slug, kind, rows, &mut report).await;
    tracing::info!(
        library = library_slug,
        kind = %kind,
        processed = report.processed,
        created = report.created,
        failed = report.failed,
        "Import finished"
    );
    report
}

/// Imports rows strictly in order, handing each outcome to `sink`.
pub async fn import_into<S, K>(repository: &dyn Repository, library_slug: &str, kind: RowKind, rows: S, sink: &mut K)
where
    S: Stream<Item = RowResult>,
    K: OutcomeSink + Send,
{
    pin_mut!(rows);
    while let Some(row) = rows.next().await {
        let outcome = import_row(repository, library_slug, kind, row).await;
        log_outcome(library_slug, kind, &outcome);
        sink.record(outcome);
    }
}

async fn import_row(repository: &dyn Repository, library_slug: &str, kind: RowKind, row: RowResult) -> RowOutcome {
    let row = match row {
        Ok(row) => row,
        Err(e) => {
            return RowOutcome::Failed {
                line: e.line,
                key: None,
                reason: RowError::Parse(e.reason).to_string(),
            }
        }
    };

    let key = layout::natural_key(kind, &row.cells);
    match persist_row(repository, library_slug, kind, &row).await {
        Ok(id) => RowOutcome::Created { line: row.line, key, id },
        Err(e) => RowOutcome::Failed {
            line: row.line,
            key,
            reason: e.to_string(),
        },
    }
}

async fn persist_row(repository: &dyn Repository, library_slug: &str, kind: RowKind, row: &RawRow) -> Result<i64, RowError> {
    match kind {
        RowKind::Item => {
            let payload = layout::item_payload(&row.cells);
            let command = build_item_command(library_slug, &payload).map_err(RowError::Invalid)?;
            repository.create_item(&command).await.map_err(RowError::Store)
        }
        RowKind::User => {
            let payload = layout::user_payload(&row.cells);
            let user = build_user_command(&payload).map_err(RowError::Invalid)?;
            repository.create_user(&user).await.map_err(RowError::Store)
        }
    }
}

fn log_outcome(library_slug: &str, kind: RowKind, outcome: &RowOutcome) {
    match outcome {
        RowOutcome::Created { line, key, id } => {
            tracing::debug!(library = library_slug, kind = %kind, line, key = ?key, id, "Row imported")
        }
        RowOutcome::Failed { line, key, reason } => {
            tracing::warn!(library = library_slug, kind = %kind, line, key = ?key, reason = %reason, "Row failed")
        }
    }
}
