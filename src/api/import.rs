//! Bulk import endpoint

use std::io;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::{AppError, AppResult},
    import::{csv_rows, upload_pipe},
    models::import_report::ImportReport,
    AppState,
};

/// Multipart field holding the table
pub const UPLOAD_FIELD: &str = "file";

/// Import query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImportParams {
    /// `item` or `user` (`i` and `u` are accepted too)
    pub kind: Option<String>,
}

/// Import a CSV table of items or users
///
/// Rows are read and created one at a time while the upload streams in. A
/// failing row is reported and skipped; it never stops the import.
#[utoipa::path(
    post,
    path = "/libraries/{slug}/import",
    tag = "import",
    params(
        ("slug" = String, Path, description = "Library slug"),
        ImportParams
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "CSV file in the `file` field"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 400, description = "Missing file or invalid kind", body = crate::error::ErrorResponse),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn import_table(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<ImportParams>,
    mut multipart: Multipart,
) -> AppResult<Json<ImportReport>> {
    let service = &state.services.import;
    let kind = service.prepare(&slug, params.kind.as_deref()).await?;

    let mut field = loop {
        match multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            Some(field) if field.name() == Some(UPLOAD_FIELD) => break field,
            Some(_) => continue,
            None => return Err(AppError::BadRequest(format!("Missing upload field '{}'", UPLOAD_FIELD))),
        }
    };

    let capacity = service.channel_capacity();
    let (chunks, reader) = upload_pipe(capacity);
    let rows = csv_rows(reader, capacity);

    let feed = async move {
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if chunks.send(Ok(chunk)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Upload aborted");
                    let _ = chunks.send(Err(io::Error::new(io::ErrorKind::Other, e.to_string()))).await;
                    break;
                }
            }
        }
    };

    let ((), report) = tokio::join!(feed, service.run(&slug, kind, rows));
    Ok(Json(report))
}
