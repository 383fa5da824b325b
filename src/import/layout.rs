//! Spreadsheet layouts: which upload header feeds which catalog column.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    catalog::columns,
    models::{
        enums::{FieldKind, RowKind, Variant},
        item::DEFAULT_STATUS,
    },
};

/// Separator of multi-value cells (`Jane Doe/John Roe`)
pub const MULTI_VALUE_SEPARATOR: char = '/';

/// Header of the reference flag; a cell equal to this marks a reference copy
const REFERENCE_HEADER: &str = "Ref";

/// Imported rows are books
const IMPORTED_VARIANT: Variant = Variant::Book;

const ITEM_LAYOUT: &[(&str, &str)] = &[
    ("Acc. No.", "acc_no"),
    ("Title of the Book", "title"),
    ("SubTitle", "subtitle"),
    ("Author", "authors"),
    ("Edition/Year", "edition"),
    ("ISBN No.", "isbn"),
    ("Publisher's Name", "publisher"),
    ("Subject", "categories"),
    ("Medium", "languages"),
    ("Pages", "no_of_pages"),
    ("Call no.", "call_no"),
    ("Level", "level"),
    ("Purchase Details", "purchase_details"),
    ("Price", "purchase_price"),
    ("Remarks", "remarks"),
];

const USER_LAYOUT: &[(&str, &str)] = &[
    ("Name", "name"),
    ("Email address", "email_address"),
    ("Gender", "gender"),
    ("Phone number", "phone_number"),
    ("Date of birth", "date_of_birth"),
];

/// Text form of a cell, `None` when blank
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        other => Some(other.to_string()),
    }
}

/// Splits a multi-value cell into trimmed, non-empty parts.
pub fn split_multi(value: &Value) -> Value {
    match cell_text(value) {
        None => Value::Null,
        Some(text) => Value::Array(
            text.split(MULTI_VALUE_SEPARATOR)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
    }
}

/// Maps an item row to a create payload for the validator.
pub fn item_payload(cells: &IndexMap<String, Value>) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("type".into(), Value::String(IMPORTED_VARIANT.as_str().into()));
    payload.insert("status".into(), Value::String(DEFAULT_STATUS.into()));

    for (header, column_id) in ITEM_LAYOUT {
        let Some(value) = cells.get(*header) else { continue };
        let multi = columns::find_column(column_id).is_some_and(|c| c.kind == FieldKind::MultiSelect);
        let value = if multi { split_multi(value) } else { value.clone() };
        payload.insert(column_id.to_string(), value);
    }

    let reference = cells
        .get(REFERENCE_HEADER)
        .and_then(cell_text)
        .is_some_and(|cell| cell == REFERENCE_HEADER);
    payload.insert("reference".into(), Value::Bool(reference));
    payload
}

/// Maps a user row to a payload keyed by user column ids.
pub fn user_payload(cells: &IndexMap<String, Value>) -> Map<String, Value> {
    USER_LAYOUT
        .iter()
        .filter_map(|(header, column_id)| cells.get(*header).map(|v| (column_id.to_string(), v.clone())))
        .collect()
}

/// Natural key reported with a row outcome: accession number or email.
pub fn natural_key(kind: RowKind, cells: &IndexMap<String, Value>) -> Option<String> {
    let header = match kind {
        RowKind::Item => ITEM_LAYOUT[0].0,
        RowKind::User => USER_LAYOUT[1].0,
    };
    cells.get(header).and_then(cell_text)
}
