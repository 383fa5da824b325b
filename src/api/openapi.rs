//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, import, items};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Catalog API",
        version = "0.3.0",
        description = "Multi-tenant library catalog: schema-driven items, search and bulk import",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Catalog
        items::get_columns,
        items::list_items,
        items::search_items,
        items::lookup_items,
        items::get_item,
        items::create_item,
        items::update_item,
        // Import
        import::import_table,
    ),
    components(
        schemas(
            // Catalog
            crate::models::column::ColumnDescriptor,
            crate::models::column::SelectSource,
            crate::models::column::SelectOption,
            crate::models::enums::Variant,
            crate::models::enums::FieldKind,
            crate::models::enums::NamedEntity,
            crate::models::enums::ListMode,
            crate::models::item::LookupRequest,
            crate::services::catalog::ColumnView,
            crate::services::catalog::ColumnsResponse,
            // Import
            crate::models::enums::RowKind,
            crate::models::import_report::RowOutcome,
            crate::models::import_report::ImportReport,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::error::FieldError,
            crate::error::FieldErrorKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "catalog", description = "Columns, listings, search and item writes"),
        (name = "import", description = "Bulk import of item and user tables")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
