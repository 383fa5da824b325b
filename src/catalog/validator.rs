//! Validator/cleaner: decodes untyped payloads against column descriptors.
//!
//! Never touches storage. Every declared column is visited and every problem
//! is collected before returning, so callers can report all of them at once.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use validator::Validate;

use super::{columns, scoping};
use crate::{
    error::{FieldErrorKind, FieldErrors},
    models::{
        column::{ColumnDescriptor, ColumnOwner},
        enums::{FieldKind, Variant},
        item::{CleanedField, CleanedFields, CleanedValue, ItemCommand},
        user::UserCommand,
    },
};

/// Payload key carrying the variant discriminator
pub const VARIANT_KEY: &str = "type";

type Coerced = Result<CleanedValue, (FieldErrorKind, String)>;

/// Validates `payload` against `columns`.
///
/// Keys not declared by a column are ignored. `null`, blank strings and empty
/// arrays count as absent. Select values are scoped to `library_slug`; a
/// tenant-scoped select without a tenant is a scoping failure.
pub fn validate<I>(
    payload: &Map<String, Value>,
    columns: I,
    library_slug: Option<&str>,
) -> Result<CleanedFields, FieldErrors>
where
    I: IntoIterator<Item = &'static ColumnDescriptor>,
{
    let mut cleaned = Vec::new();
    let mut errors = FieldErrors::default();

    for column in columns {
        let raw = payload.get(column.id).filter(|v| !is_absent(v));
        let value = match raw {
            None => {
                if column.required {
                    errors.push(
                        FieldErrorKind::Missing,
                        column.id,
                        format!("{} is required", column.label),
                    );
                }
                CleanedValue::Null
            }
            Some(raw) => match coerce(column, raw, library_slug) {
                Ok(value) => value,
                Err((kind, message)) => {
                    errors.push(kind, column.id, message);
                    CleanedValue::Null
                }
            },
        };
        cleaned.push(CleanedField { column, value });
    }

    if errors.is_empty() {
        Ok(CleanedFields(cleaned))
    } else {
        Err(errors)
    }
}

/// Builds the create/update command for an item. The variant comes from the
/// payload's `type` key; base and extension columns are validated together.
pub fn build_item_command(library_slug: &str, payload: &Map<String, Value>) -> Result<ItemCommand, FieldErrors> {
    let mut errors = FieldErrors::default();

    let variant = match payload.get(VARIANT_KEY).and_then(Value::as_str) {
        Some(raw) => match raw.parse::<Variant>() {
            Ok(v) => Some(v),
            Err(e) => {
                errors.push(FieldErrorKind::InvalidSelect, VARIANT_KEY, e);
                None
            }
        },
        None => {
            errors.push(FieldErrorKind::Missing, VARIANT_KEY, "Item type is required");
            None
        }
    };

    let base = validate(payload, columns::base_columns(), Some(library_slug));
    let extension = variant.map(|v| validate(payload, columns::variant_columns(v), Some(library_slug)));

    let base = base.unwrap_or_else(|e| {
        errors.0.extend(e.0);
        CleanedFields::default()
    });
    let extension = match extension {
        Some(Ok(fields)) => fields,
        Some(Err(e)) => {
            errors.0.extend(e.0);
            CleanedFields::default()
        }
        None => CleanedFields::default(),
    };

    match variant {
        Some(variant) if errors.is_empty() => Ok(ItemCommand {
            library_slug: library_slug.to_string(),
            variant,
            base,
            extension,
        }),
        _ => Err(errors),
    }
}

/// Builds a user from a payload keyed by user column ids.
pub fn build_user_command(payload: &Map<String, Value>) -> Result<UserCommand, FieldErrors> {
    let fields = validate(payload, columns::user_columns(), None)?;
    let text = |id: &str| fields.get(id).and_then(CleanedValue::as_text).map(str::to_string);

    let user = UserCommand {
        name: text("name").unwrap_or_default(),
        email_address: text("email_address").unwrap_or_default(),
        gender: text("gender"),
        phone_number: text("phone_number"),
        date_of_birth: match fields.get("date_of_birth") {
            Some(CleanedValue::Date(d)) => Some(*d),
            _ => None,
        },
    };
    user.validate()?;
    Ok(user)
}

/// True when the column belongs to `variant`'s extension.
pub fn belongs_to(column: &ColumnDescriptor, variant: Variant) -> bool {
    column.owner == ColumnOwner::Variant(variant)
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn coerce(column: &ColumnDescriptor, raw: &Value, library_slug: Option<&str>) -> Coerced {
    match column.kind {
        FieldKind::Text => coerce_text(raw),
        FieldKind::Number if column.positive_integer => coerce_positive_integer(raw),
        FieldKind::Number => coerce_number(raw),
        FieldKind::Boolean => coerce_boolean(raw),
        FieldKind::Date => coerce_date(raw),
        FieldKind::Select | FieldKind::MultiSelect => coerce_select(column, raw, library_slug),
    }
}

fn coerce_text(raw: &Value) -> Coerced {
    match raw {
        Value::String(s) => Ok(CleanedValue::Text(s.trim().to_string())),
        Value::Number(n) => Ok(CleanedValue::Text(n.to_string())),
        Value::Bool(b) => Ok(CleanedValue::Text(b.to_string())),
        _ => Err((FieldErrorKind::InvalidText, "Expected a text value".to_string())),
    }
}

pub(crate) fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
        .map(|d| d.normalize())
}

fn coerce_number(raw: &Value) -> Coerced {
    let parsed = match raw {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    };
    parsed
        .map(CleanedValue::Number)
        .ok_or_else(|| (FieldErrorKind::InvalidNumber, format!("Not a number: {}", raw)))
}

fn coerce_positive_integer(raw: &Value) -> Coerced {
    match coerce_number(raw)? {
        CleanedValue::Number(n) if n.fract().is_zero() && n.is_sign_positive() && !n.is_zero() => {
            Ok(CleanedValue::Number(n))
        }
        _ => Err((
            FieldErrorKind::InvalidNumber,
            format!("Expected a whole number greater than zero: {}", raw),
        )),
    }
}

fn coerce_boolean(raw: &Value) -> Coerced {
    let parsed = match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Some(true),
            "false" | "off" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(CleanedValue::Boolean)
        .ok_or_else(|| (FieldErrorKind::InvalidBoolean, format!("Not a boolean: {}", raw)))
}

/// Accepts ISO dates, RFC 3339 timestamps, ISO datetimes without offset and
/// US-style `month/day/year`.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date()))
        .or_else(|| NaiveDate::parse_from_str(s, "%m/%d/%Y").ok())
}

fn coerce_date(raw: &Value) -> Coerced {
    raw.as_str()
        .and_then(parse_date)
        .map(CleanedValue::Date)
        .ok_or_else(|| (FieldErrorKind::InvalidDate, format!("Not a date: {}", raw)))
}

/// Option names may arrive as strings, numbers, or `{ "name": .. }` objects
/// (the shape reads return, so a fetched row can be posted back unchanged).
fn option_name(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn coerce_select(column: &ColumnDescriptor, raw: &Value, library_slug: Option<&str>) -> Coerced {
    let Some(source) = column.select else {
        return Err((FieldErrorKind::InvalidSelect, "Column has no option source".to_string()));
    };
    let slug = match (source.tenant_scoped, library_slug) {
        (true, None) => {
            return Err((
                FieldErrorKind::InvalidSelect,
                format!("{} options need a library", column.label),
            ))
        }
        (_, slug) => slug.unwrap_or_default(),
    };

    if column.kind == FieldKind::Select {
        return option_name(raw)
            .and_then(|name| scoping::scope_select_value(&name, slug, &source))
            .map(CleanedValue::Select)
            .ok_or_else(|| (FieldErrorKind::InvalidSelect, format!("Not a valid option: {}", raw)));
    }

    let names: Vec<String> = match raw {
        Value::Array(items) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match option_name(item) {
                    Some(name) => names.push(name),
                    None => {
                        return Err((FieldErrorKind::InvalidSelect, format!("Not a valid option: {}", item)))
                    }
                }
            }
            names
        }
        other => match option_name(other) {
            Some(name) => vec![name],
            None => return Err((FieldErrorKind::InvalidSelect, format!("Not a valid option: {}", other))),
        },
    };

    Ok(CleanedValue::MultiSelect(scoping::scope_select_values(
        names.iter().map(String::as_str),
        slug,
        &source,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let errors = build_item_command("test", &payload(json!({ "type": "book" }))).unwrap_err();
        assert!(errors.contains("acc_no"));
        assert!(errors.contains("title"));
        assert!(errors.0.iter().all(|e| e.kind == FieldErrorKind::Missing));
    }

    #[test]
    fn test_accession_number_must_be_a_positive_whole_number() {
        for bad in [json!(1.5), json!("-0"), json!(0), json!(-3), json!("2.5")] {
            let errors = build_item_command("test", &payload(json!({ "type": "book", "acc_no": bad, "title": "T" })))
                .unwrap_err();
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["acc_no"], "accepted {}", bad);
            assert_eq!(errors.0[0].kind, FieldErrorKind::InvalidNumber);
        }

        let command = build_item_command("test", &payload(json!({ "type": "book", "acc_no": "7.0", "title": "T" })))
            .unwrap();
        assert_eq!(command.acc_no(), Some(dec(7)));
    }

    #[test]
    fn test_coercion_errors_are_collected_in_one_pass() {
        let errors = build_item_command(
            "test",
            &payload(json!({
                "type": "book",
                "acc_no": "twelve",
                "title": "Dune",
                "reference": "maybe",
                "purchased_on": "yesterday",
            })),
        )
        .unwrap_err();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["acc_no", "reference", "purchased_on"]);
    }

    #[test]
    fn test_cleaned_command_splits_base_and_extension() {
        let command = build_item_command(
            "test",
            &payload(json!({
                "id": 99,
                "type": "book",
                "acc_no": "12",
                "title": " Dune ",
                "reference": "on",
                "purchase_price": 350.5,
                "purchased_on": "2023-12-28",
                "publisher": "Chilton",
                "categories": ["Fiction", "Sci-Fi"],
                "languages": "English",
                "authors": ["Frank Herbert"],
                "isbn": 9780441013593u64,
                "unknown": "ignored",
            })),
        )
        .unwrap();

        assert_eq!(command.variant, Variant::Book);
        assert_eq!(command.acc_no(), Some(dec(12)));
        assert_eq!(command.base.get("title"), Some(&CleanedValue::Text("Dune".into())));
        assert_eq!(command.base.get("reference"), Some(&CleanedValue::Boolean(true)));
        assert_eq!(
            command.base.get("purchased_on"),
            Some(&CleanedValue::Date(NaiveDate::from_ymd_opt(2023, 12, 28).unwrap()))
        );
        assert_eq!(command.extension.get("isbn"), Some(&CleanedValue::Text("9780441013593".into())));

        match command.base.get("publisher") {
            Some(CleanedValue::Select(key)) => {
                assert_eq!(key.library_slug(), Some("test"));
                assert_eq!(key.name(), "Chilton");
            }
            other => panic!("unexpected publisher value: {:?}", other),
        }
        match command.base.get("languages") {
            Some(CleanedValue::MultiSelect(keys)) => {
                assert_eq!(keys.len(), 1);
                assert_eq!(keys[0].library_slug(), None);
            }
            other => panic!("unexpected languages value: {:?}", other),
        }
        assert!(command.base.get("id").is_none());
        assert!(command.extension.iter().all(|f| belongs_to(f.column, Variant::Book)));
    }

    #[test]
    fn test_missing_or_unknown_type_is_a_field_error() {
        let errors = build_item_command("test", &payload(json!({ "acc_no": 1, "title": "x" }))).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["type"]);

        let errors =
            build_item_command("test", &payload(json!({ "type": "dvd", "acc_no": 1, "title": "x" }))).unwrap_err();
        assert!(errors.contains("type"));
    }

    #[test]
    fn test_blank_values_count_as_absent() {
        let fields = validate(
            &payload(json!({ "acc_no": "", "title": "T", "categories": [] })),
            columns::base_columns(),
            Some("test"),
        )
        .unwrap_err();
        assert_eq!(fields.fields().collect::<Vec<_>>(), vec!["acc_no"]);
    }

    #[test]
    fn test_tenant_scoped_select_without_tenant_fails() {
        let errors = validate(
            &payload(json!({ "acc_no": 1, "title": "T", "publisher": "Chilton" })),
            columns::base_columns(),
            None,
        )
        .unwrap_err();
        assert_eq!(errors.0[0].kind, FieldErrorKind::InvalidSelect);
        assert_eq!(errors.0[0].field, "publisher");
    }

    #[test]
    fn test_select_accepts_relation_objects() {
        let fields = validate(
            &payload(json!({
                "acc_no": 1,
                "title": "T",
                "publisher": { "id": 3, "name": "Chilton" },
                "categories": [{ "id": 1, "name": "Fiction" }],
            })),
            columns::base_columns(),
            Some("test"),
        )
        .unwrap();
        assert!(matches!(fields.get("publisher"), Some(CleanedValue::Select(k)) if k.name() == "Chilton"));
    }

    #[test]
    fn test_user_command_checks_email_format() {
        let errors = build_user_command(&payload(json!({
            "name": "Naqeeb",
            "email_address": "not-an-email",
        })))
        .unwrap_err();
        assert_eq!(errors.0[0].kind, FieldErrorKind::InvalidFormat);
        assert_eq!(errors.0[0].field, "email_address");

        let user = build_user_command(&payload(json!({
            "name": "Naqeeb",
            "email_address": "naqeeb@example.org",
            "date_of_birth": "12/28/2001",
        })))
        .unwrap();
        assert_eq!(user.date_of_birth, NaiveDate::from_ymd_opt(2001, 12, 28));
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(parse_decimal("12"), Some(dec(12)));
        assert_eq!(parse_decimal(" 350.50 "), Some(Decimal::new(3505, 1)));
        assert_eq!(parse_decimal("1e3"), Some(dec(1000)));
        assert_eq!(parse_decimal("abc"), None);
    }
}
