//! Item (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::item::{ItemRow, ListingParams, LookupRequest, SearchParams},
    services::catalog::ColumnsResponse,
    AppState,
};

/// Columns query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ColumnsParams {
    /// Only this variant's extension; all variants when omitted
    pub variant: Option<String>,
}

/// Column schema of a library, with existing select options
#[utoipa::path(
    get,
    path = "/libraries/{slug}/columns",
    tag = "catalog",
    params(
        ("slug" = String, Path, description = "Library slug"),
        ColumnsParams
    ),
    responses(
        (status = 200, description = "Column schema", body = ColumnsResponse),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_columns(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<ColumnsParams>,
) -> AppResult<Json<ColumnsResponse>> {
    let columns = state.services.catalog.columns(&slug, params.variant.as_deref()).await?;
    Ok(Json(columns))
}

/// List items of a library
#[utoipa::path(
    get,
    path = "/libraries/{slug}/items",
    tag = "catalog",
    params(
        ("slug" = String, Path, description = "Library slug"),
        ListingParams
    ),
    responses(
        (status = 200, description = "Flattened item rows", body = Vec<Object>),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<ListingParams>,
) -> AppResult<Json<Vec<ItemRow>>> {
    let rows = state.services.catalog.list_items(&slug, &params).await?;
    Ok(Json(rows))
}

/// Search items by title and, per variant, other searchable fields
#[utoipa::path(
    get,
    path = "/libraries/{slug}/items/search",
    tag = "catalog",
    params(
        ("slug" = String, Path, description = "Library slug"),
        SearchParams
    ),
    responses(
        (status = 200, description = "Matching item rows", body = Vec<Object>),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_items(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<ItemRow>>> {
    let rows = state.services.catalog.search_items(&slug, &params).await?;
    Ok(Json(rows))
}

/// Fetch several items by id
#[utoipa::path(
    post,
    path = "/libraries/{slug}/items/lookup",
    tag = "catalog",
    params(("slug" = String, Path, description = "Library slug")),
    request_body = LookupRequest,
    responses(
        (status = 200, description = "Items with these ids", body = Vec<Object>),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn lookup_items(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<LookupRequest>,
) -> AppResult<Json<Vec<ItemRow>>> {
    let rows = state.services.catalog.lookup_items(&slug, &request.ids).await?;
    Ok(Json(rows))
}

/// Get one item
#[utoipa::path(
    get,
    path = "/libraries/{slug}/items/{id}",
    tag = "catalog",
    params(
        ("slug" = String, Path, description = "Library slug"),
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item", body = Object),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, i64)>,
) -> AppResult<Json<ItemRow>> {
    let row = state.services.catalog.get_item(&slug, id).await?;
    Ok(Json(row))
}

/// Create an item; the payload's `type` selects the variant
#[utoipa::path(
    post,
    path = "/libraries/{slug}/items",
    tag = "catalog",
    params(("slug" = String, Path, description = "Library slug")),
    request_body = Object,
    responses(
        (status = 201, description = "Item created", body = Object),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorResponse),
        (status = 409, description = "Accession number already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<ItemRow>)> {
    let created = state.services.catalog.create_item(&slug, &payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace an item's fields
#[utoipa::path(
    put,
    path = "/libraries/{slug}/items/{id}",
    tag = "catalog",
    params(
        ("slug" = String, Path, description = "Library slug"),
        ("id" = i64, Path, description = "Item ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Item updated", body = Object),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, i64)>,
    Json(payload): Json<Value>,
) -> AppResult<Json<ItemRow>> {
    let updated = state.services.catalog.update_item(&slug, id, &payload).await?;
    Ok(Json(updated))
}
