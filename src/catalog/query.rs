//! Query composer: builds tenant-scoped item queries and reshapes the rows
//! they return.

use serde_json::Value;

use super::columns;
use crate::models::{
    column::ColumnDescriptor,
    enums::{ListMode, Variant},
    item::{ItemFilter, ItemOrder, ItemQuery, ItemRow},
};

/// Foreign key of an extension row, never lifted into the item
const EXTENSION_KEY: &str = "item_id";

/// A composed query plus the columns a caller should display for it
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub query: ItemQuery,
    /// Base columns plus the filtered variant's columns
    pub columns: Vec<&'static ColumnDescriptor>,
    /// Every column a returned row can carry once flattened: the base columns
    /// plus the extension columns of each variant in scope
    pub display_columns: Vec<&'static ColumnDescriptor>,
}

/// Resolves a `show` parameter. Unknown variants are tolerated and behave as
/// no variant filter.
fn resolve_variant(variant_id: Option<&str>) -> Option<Variant> {
    let id = variant_id.map(str::trim).filter(|s| !s.is_empty())?;
    match id.parse::<Variant>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::debug!(variant = id, "Ignoring unknown variant filter");
            None
        }
    }
}

fn listing_columns(variant: Option<Variant>) -> Vec<&'static ColumnDescriptor> {
    let extension = variant.map(columns::variant_columns).unwrap_or(&[]);
    columns::base_columns().iter().chain(extension.iter()).collect()
}

fn compose(
    library_slug: &str,
    variant: Option<Variant>,
    filter: ItemFilter,
    order: ItemOrder,
    limit: Option<i64>,
) -> Listing {
    let columns = listing_columns(variant);
    let extensions: &[Variant] = match variant {
        Some(ref v) => std::slice::from_ref(v),
        None => &Variant::ALL,
    };
    let display_columns: Vec<&'static ColumnDescriptor> = columns::base_columns()
        .iter()
        .chain(extensions.iter().flat_map(|v| columns::variant_columns(*v).iter()))
        .collect();
    let includes = display_columns.iter().copied().filter(|c| c.kind.is_select()).collect();
    Listing {
        query: ItemQuery {
            library_slug: library_slug.to_string(),
            variant,
            includes,
            filter,
            order,
            limit,
        },
        columns,
        display_columns,
    }
}

/// Listing in one of the three modes. `all` is unbounded; `recent` and
/// `popular` are bounded by `preview_limit`.
pub fn compose_listing(library_slug: &str, variant_id: Option<&str>, mode: ListMode, preview_limit: i64) -> Listing {
    let variant = resolve_variant(variant_id);
    let (order, limit) = match mode {
        ListMode::All => (ItemOrder::AccessionNumber, None),
        ListMode::Recent => (ItemOrder::RecentlyAcquired, Some(preview_limit)),
        ListMode::Popular => (ItemOrder::MostUsed, Some(preview_limit)),
    };
    compose(library_slug, variant, ItemFilter::All, order, limit)
}

/// Case-insensitive substring search over the searchable columns of the base
/// item and, when given, the variant.
pub fn compose_search(library_slug: &str, term: &str, variant_id: Option<&str>, search_limit: i64) -> Listing {
    let variant = resolve_variant(variant_id);
    let searched = listing_columns(variant)
        .into_iter()
        .filter(|c| c.searchable)
        .collect();
    compose(
        library_slug,
        variant,
        ItemFilter::Search {
            term: term.trim().to_string(),
            columns: searched,
        },
        ItemOrder::AccessionNumber,
        Some(search_limit),
    )
}

/// Exactly the given ids, restricted to the tenant. Every variant is
/// included so each row carries its own extension.
pub fn compose_lookup(library_slug: &str, ids: &[i64]) -> Listing {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    compose(
        library_slug,
        None,
        ItemFilter::Ids(ids),
        ItemOrder::AccessionNumber,
        None,
    )
}

/// Escapes LIKE wildcards so the term matches literally (`\` is the escape).
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Lifts nested variant objects into top-level fields. With no variant every
/// known variant key is lifted. Existing top-level fields win; applying the
/// function twice gives the same rows as applying it once.
pub fn apply_flatten(rows: Vec<ItemRow>, variant: Option<Variant>) -> Vec<ItemRow> {
    let variants: &[Variant] = match variant {
        Some(ref v) => std::slice::from_ref(v),
        None => &Variant::ALL,
    };

    rows.into_iter()
        .map(|mut row| {
            for v in variants {
                match row.get(v.as_str()) {
                    Some(Value::Object(_)) => {}
                    // items of another variant carry a null extension
                    Some(Value::Null) => {
                        row.remove(v.as_str());
                        continue;
                    }
                    _ => continue,
                }
                if let Some(Value::Object(nested)) = row.remove(v.as_str()) {
                    for (key, value) in nested {
                        if key != EXTENSION_KEY && !row.contains_key(&key) {
                            row.insert(key, value);
                        }
                    }
                }
            }
            row
        })
        .collect()
}

/// Replaces `{id, name}` relation objects of select columns with their
/// names. Values that are already names are left alone.
pub fn present_selects(rows: Vec<ItemRow>, columns: &[&'static ColumnDescriptor]) -> Vec<ItemRow> {
    fn name_of(value: Value) -> Value {
        match value {
            Value::Object(mut o) => o.remove("name").unwrap_or(Value::Null),
            other => other,
        }
    }

    rows.into_iter()
        .map(|mut row| {
            for column in columns.iter().filter(|c| c.kind.is_select()) {
                if let Some(value) = row.get_mut(column.id) {
                    *value = match value.take() {
                        Value::Array(items) => Value::Array(items.into_iter().map(name_of).collect()),
                        other => name_of(other),
                    };
                }
            }
            row
        })
        .collect()
}
