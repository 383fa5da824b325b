//! Item commands, queries and the uniform row shape returned by reads.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::column::ColumnDescriptor;
use super::enums::Variant;

/// An item as returned by the repository: base fields at the top level,
/// relations as `{id, name}` objects, and (when a variant was requested) the
/// variant's fields nested under the variant key.
pub type ItemRow = Map<String, Value>;

/// Item status assigned when none is given
pub const DEFAULT_STATUS: &str = "IN";

/// Tenant-qualified lookup key for a named entity.
///
/// The fields are read-only and the constructor is crate-private: outside
/// this crate a key comes from [`crate::catalog::scoping`] (through the
/// validator), and an existing key cannot be re-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScopedName {
    library_slug: Option<String>,
    name: String,
}

impl ScopedName {
    pub(crate) fn new(library_slug: Option<String>, name: String) -> Self {
        Self { library_slug, name }
    }

    /// Owning library; `None` for global options
    pub fn library_slug(&self) -> Option<&str> {
        self.library_slug.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ScopedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.library_slug {
            Some(ref slug) => write!(f, "{}/{}", slug, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A payload value after coercion to its column's kind
#[derive(Debug, Clone, PartialEq)]
pub enum CleanedValue {
    Null,
    Text(String),
    Number(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    Select(ScopedName),
    MultiSelect(Vec<ScopedName>),
}

impl CleanedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CleanedValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CleanedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            CleanedValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One cleaned column value together with its descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedField {
    pub column: &'static ColumnDescriptor,
    pub value: CleanedValue,
}

/// Validated fields, in column declaration order. Every declared column is
/// present; absent optional values are [`CleanedValue::Null`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedFields(pub Vec<CleanedField>);

impl CleanedFields {
    pub fn get(&self, id: &str) -> Option<&CleanedValue> {
        self.0.iter().find(|f| f.column.id == id).map(|f| &f.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CleanedField> {
        self.0.iter()
    }
}

/// Persistence command for an item plus its variant extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCommand {
    pub library_slug: String,
    pub variant: Variant,
    pub base: CleanedFields,
    pub extension: CleanedFields,
}

impl ItemCommand {
    /// Accession number, the item's natural key within its library
    pub fn acc_no(&self) -> Option<Decimal> {
        self.base.get("acc_no").and_then(CleanedValue::as_number)
    }

    pub fn status(&self) -> &str {
        self.base
            .get("status")
            .and_then(CleanedValue::as_text)
            .unwrap_or(DEFAULT_STATUS)
    }
}

/// Which items a query selects
#[derive(Debug, Clone, PartialEq)]
pub enum ItemFilter {
    All,
    /// Case-insensitive substring match over the given columns
    Search {
        term: String,
        columns: Vec<&'static ColumnDescriptor>,
    },
    Ids(Vec<i64>),
}

/// Result ordering. Every ordering ends with accession number then id so
/// ties are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOrder {
    AccessionNumber,
    /// Acquisition date (purchase date, else creation date) descending
    RecentlyAcquired,
    /// Transaction count descending
    MostUsed,
}

/// A tenant-scoped retrieval request built by the query composer.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemQuery {
    pub library_slug: String,
    /// Restrict to items that have this variant's extension, and nest it
    pub variant: Option<Variant>,
    /// Select columns whose relations are loaded
    pub includes: Vec<&'static ColumnDescriptor>,
    pub filter: ItemFilter,
    pub order: ItemOrder,
    pub limit: Option<i64>,
}

/// Listing query parameters
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListingParams {
    /// Variant to show (`book`, `magazine`); unknown values are ignored
    pub show: Option<String>,
    pub mode: Option<super::enums::ListMode>,
}

/// Search query parameters
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    pub q: String,
    pub show: Option<String>,
}

/// Body of a lookup-by-identifiers request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LookupRequest {
    pub ids: Vec<i64>,
}
