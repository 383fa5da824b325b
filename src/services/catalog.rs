//! Catalog service: item reads and writes for one library at a time.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::{
    catalog::{self, Listing},
    config::CatalogConfig,
    error::{AppError, AppResult},
    models::{
        column::{ColumnDescriptor, SelectOption},
        enums::{ListMode, Variant},
        item::{ItemRow, ListingParams, SearchParams},
    },
    repository::DynRepository,
};

/// A column plus, for selects, the options that already exist
#[derive(Debug, Serialize, ToSchema)]
pub struct ColumnView {
    #[serde(flatten)]
    pub descriptor: ColumnDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
}

/// Form schema of a library: base columns and each variant's extension
#[derive(Debug, Serialize, ToSchema)]
pub struct ColumnsResponse {
    pub base: Vec<ColumnView>,
    #[schema(value_type = Object)]
    pub variants: IndexMap<Variant, Vec<ColumnView>>,
}

#[derive(Clone)]
pub struct CatalogService {
    repository: DynRepository,
    limits: CatalogConfig,
}

impl CatalogService {
    pub fn new(repository: DynRepository, limits: CatalogConfig) -> Self {
        Self { repository, limits }
    }

    async fn ensure_library(&self, slug: &str) -> AppResult<()> {
        if self.repository.library_exists(slug).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Library '{}' not found", slug)))
        }
    }

    async fn fetch(&self, listing: Listing, present: bool) -> AppResult<Vec<ItemRow>> {
        let rows = self.repository.find_items(&listing.query).await?;
        let rows = catalog::apply_flatten(rows, listing.query.variant);
        Ok(if present {
            catalog::present_selects(rows, &listing.display_columns)
        } else {
            rows
        })
    }

    async fn column_views(&self, slug: &str, columns: &'static [ColumnDescriptor]) -> AppResult<Vec<ColumnView>> {
        let mut views = Vec::with_capacity(columns.len());
        for column in columns {
            let options = match column.select {
                Some(source) => {
                    let scope = source.tenant_scoped.then(|| slug.to_string());
                    Some(self.repository.list_named(source.entity, scope).await?)
                }
                None => None,
            };
            views.push(ColumnView {
                descriptor: *column,
                options,
            });
        }
        Ok(views)
    }

    /// Column schema with the library's current select options.
    pub async fn columns(&self, slug: &str, variant: Option<&str>) -> AppResult<ColumnsResponse> {
        self.ensure_library(slug).await?;
        let set = catalog::get_columns(variant);

        let base = self.column_views(slug, set.base).await?;
        let mut variants = IndexMap::with_capacity(set.variants.len());
        for (variant, columns) in set.variants {
            variants.insert(variant, self.column_views(slug, columns).await?);
        }
        Ok(ColumnsResponse { base, variants })
    }

    /// Tabular listing: flattened rows, relations shown by name.
    pub async fn list_items(&self, slug: &str, params: &ListingParams) -> AppResult<Vec<ItemRow>> {
        self.ensure_library(slug).await?;
        let listing = catalog::compose_listing(
            slug,
            params.show.as_deref(),
            params.mode.unwrap_or(ListMode::All),
            self.limits.preview_limit,
        );
        self.fetch(listing, true).await
    }

    pub async fn search_items(&self, slug: &str, params: &SearchParams) -> AppResult<Vec<ItemRow>> {
        self.ensure_library(slug).await?;
        let listing = catalog::compose_search(slug, &params.q, params.show.as_deref(), self.limits.search_limit);
        self.fetch(listing, true).await
    }

    /// Items with exactly these ids; relations stay `{id, name}` objects.
    pub async fn lookup_items(&self, slug: &str, ids: &[i64]) -> AppResult<Vec<ItemRow>> {
        self.ensure_library(slug).await?;
        self.fetch(catalog::compose_lookup(slug, ids), false).await
    }

    pub async fn get_item(&self, slug: &str, id: i64) -> AppResult<ItemRow> {
        self.ensure_library(slug).await?;
        let listing = catalog::compose_lookup(slug, &[id]);
        let row = self
            .repository
            .find_item(&listing.query)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))?;
        Ok(catalog::apply_flatten(vec![row], None).into_iter().next().unwrap_or_default())
    }

    /// Validates the payload and creates the item with its extension.
    pub async fn create_item(&self, slug: &str, payload: &Value) -> AppResult<ItemRow> {
        self.ensure_library(slug).await?;
        let command = catalog::build_item_command(slug, payload_object(payload)?)?;
        let id = self.repository.create_item(&command).await?;
        tracing::info!(library = slug, id, variant = %command.variant, "Item created");
        self.get_item(slug, id).await
    }

    pub async fn update_item(&self, slug: &str, id: i64, payload: &Value) -> AppResult<ItemRow> {
        self.ensure_library(slug).await?;
        let command = catalog::build_item_command(slug, payload_object(payload)?)?;
        self.repository.update_item(id, &command).await?;
        tracing::info!(library = slug, id, "Item updated");
        self.get_item(slug, id).await
    }
}

fn payload_object(payload: &Value) -> AppResult<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Expected a JSON object".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::ItemFilter;
    use crate::repository::MockRepository;
    use serde_json::json;
    use std::sync::Arc;

    fn service(mock: MockRepository) -> CatalogService {
        CatalogService::new(Arc::new(mock), CatalogConfig::default())
    }

    fn known_library() -> MockRepository {
        let mut mock = MockRepository::new();
        mock.expect_library_exists().returning(|_| Ok(true));
        mock
    }

    #[tokio::test]
    async fn test_invalid_payload_is_never_persisted() {
        let mut mock = known_library();
        mock.expect_create_item().never();

        let err = service(mock)
            .create_item("lib", &json!({ "type": "book", "acc_no": 1 }))
            .await
            .unwrap_err();
        match err {
            AppError::Fields(errors) => assert!(errors.contains("title")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_object_payload_is_bad_request() {
        let err = service(known_library()).create_item("lib", &json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_unknown_library_stops_before_reading() {
        let mut mock = MockRepository::new();
        mock.expect_library_exists().returning(|_| Ok(false));
        mock.expect_find_item().never();

        let err = service(mock).get_item("nowhere", 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_listing_flattens_and_names_relations() {
        let mut mock = known_library();
        mock.expect_find_items()
            .withf(|q| q.variant == Some(Variant::Book) && q.filter == ItemFilter::All && q.library_slug == "lib")
            .returning(|_| {
                Ok(vec![json!({
                    "id": 1,
                    "title": "Dune",
                    "publisher": { "id": 4, "name": "Chilton" },
                    "book": { "item_id": 1, "isbn": "123", "authors": [{ "id": 2, "name": "Frank Herbert" }] },
                })
                .as_object()
                .cloned()
                .unwrap()])
            });

        let params = ListingParams {
            show: Some("book".into()),
            mode: None,
        };
        let rows = service(mock).list_items("lib", &params).await.unwrap();
        assert_eq!(rows[0]["isbn"], json!("123"));
        assert_eq!(rows[0]["publisher"], json!("Chilton"));
        assert_eq!(rows[0]["authors"], json!(["Frank Herbert"]));
        assert!(!rows[0].contains_key("book"));
    }

    #[tokio::test]
    async fn test_columns_list_options_in_scope() {
        let mut mock = known_library();
        mock.expect_list_named().returning(|entity, scope| {
            Ok(vec![SelectOption {
                id: 1,
                name: format!("{}:{}", entity, scope.unwrap_or_else(|| "global".into())),
            }])
        });

        let response = service(mock).columns("lib", Some("book")).await.unwrap();
        let languages = response.base.iter().find(|c| c.descriptor.id == "languages").unwrap();
        assert_eq!(languages.options.as_ref().unwrap()[0].name, "language:global");
        let authors = &response.variants[&Variant::Book]
            .iter()
            .find(|c| c.descriptor.id == "authors")
            .unwrap();
        assert_eq!(authors.options.as_ref().unwrap()[0].name, "author:lib");
        assert!(response.base.iter().find(|c| c.descriptor.id == "title").unwrap().options.is_none());
    }
}
