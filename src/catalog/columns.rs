//! Column registry: the single source of truth for which fields an item has.
//!
//! The schema is declared once as static data. Adding a variant means adding
//! an arm to [`Variant`], a slice here and an extension table in the
//! migrations; the validator and query composer pick it up from the registry.

use indexmap::IndexMap;

use crate::models::{
    column::{ColumnDescriptor, ColumnSet},
    enums::{NamedEntity, Variant},
};

static BASE_COLUMNS: [ColumnDescriptor; 14] = [
    ColumnDescriptor::number("acc_no", "Accession number").required().positive_integer(),
    ColumnDescriptor::text("title", "Title").required().searchable(),
    ColumnDescriptor::text("status", "Status"),
    ColumnDescriptor::boolean("reference", "Reference"),
    ColumnDescriptor::number("no_of_pages", "Pages"),
    ColumnDescriptor::number("call_no", "Call number"),
    ColumnDescriptor::text("level", "Level"),
    ColumnDescriptor::select("publisher", "Publisher", NamedEntity::Publisher, true),
    ColumnDescriptor::text("purchase_details", "Purchase details"),
    ColumnDescriptor::number("purchase_price", "Price"),
    ColumnDescriptor::date("purchased_on", "Purchased on"),
    ColumnDescriptor::text("remarks", "Remarks"),
    ColumnDescriptor::multi_select("categories", "Categories", NamedEntity::Category, true),
    ColumnDescriptor::multi_select("languages", "Languages", NamedEntity::Language, false),
];

static BOOK_COLUMNS: [ColumnDescriptor; 4] = [
    ColumnDescriptor::text("subtitle", "Subtitle").searchable().owned_by(Variant::Book),
    ColumnDescriptor::multi_select("authors", "Authors", NamedEntity::Author, true)
        .searchable()
        .owned_by(Variant::Book),
    ColumnDescriptor::text("edition", "Edition").owned_by(Variant::Book),
    ColumnDescriptor::text("isbn", "ISBN").searchable().owned_by(Variant::Book),
];

static MAGAZINE_COLUMNS: [ColumnDescriptor; 4] = [
    ColumnDescriptor::text("issn", "ISSN").owned_by(Variant::Magazine),
    ColumnDescriptor::number("volume", "Volume").owned_by(Variant::Magazine),
    ColumnDescriptor::number("issue", "Issue").owned_by(Variant::Magazine),
    ColumnDescriptor::date("issued_on", "Issued on").owned_by(Variant::Magazine),
];

static USER_COLUMNS: [ColumnDescriptor; 5] = [
    ColumnDescriptor::text("name", "Name").required(),
    ColumnDescriptor::text("email_address", "Email address").required(),
    ColumnDescriptor::text("gender", "Gender"),
    ColumnDescriptor::text("phone_number", "Phone number"),
    ColumnDescriptor::date("date_of_birth", "Date of birth"),
];

/// Columns shared by every item.
pub fn base_columns() -> &'static [ColumnDescriptor] {
    &BASE_COLUMNS
}

/// Extension columns of one variant.
pub fn variant_columns(variant: Variant) -> &'static [ColumnDescriptor] {
    match variant {
        Variant::Book => &BOOK_COLUMNS,
        Variant::Magazine => &MAGAZINE_COLUMNS,
    }
}

/// Extension columns for a discriminator string; unknown variants have none.
pub fn extension_columns(variant_id: &str) -> &'static [ColumnDescriptor] {
    variant_id
        .parse::<Variant>()
        .map(variant_columns)
        .unwrap_or(&[])
}

/// Registry lookup. With no variant id every variant's extension is
/// returned; an unknown id yields an empty extension map.
pub fn get_columns(variant_id: Option<&str>) -> ColumnSet {
    let variants: IndexMap<Variant, &'static [ColumnDescriptor]> = match variant_id {
        None => Variant::ALL
            .iter()
            .map(|v| (*v, variant_columns(*v)))
            .collect(),
        Some(id) => match id.parse::<Variant>() {
            Ok(v) => IndexMap::from([(v, variant_columns(v))]),
            Err(_) => {
                tracing::debug!(variant = id, "Unknown variant requested, no extension columns");
                IndexMap::new()
            }
        },
    };

    ColumnSet {
        base: base_columns(),
        variants,
    }
}

/// Columns of a user import row.
pub fn user_columns() -> &'static [ColumnDescriptor] {
    &USER_COLUMNS
}

/// Looks a column up by id among the base and all variant columns.
pub fn find_column(id: &str) -> Option<&'static ColumnDescriptor> {
    base_columns()
        .iter()
        .chain(Variant::ALL.iter().flat_map(|v| variant_columns(*v).iter()))
        .find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::column::ColumnOwner;
    use crate::models::enums::FieldKind;

    #[test]
    fn test_every_variant_has_base_and_its_own_extension() {
        for variant in Variant::ALL {
            let set = get_columns(Some(variant.as_str()));
            assert!(!set.base.is_empty());
            assert_eq!(set.variants.len(), 1);
            assert_eq!(set.variants[&variant], variant_columns(variant));
            assert!(set.variants[&variant]
                .iter()
                .all(|c| c.owner == ColumnOwner::Variant(variant)));
        }
    }

    #[test]
    fn test_unknown_variant_is_empty_not_an_error() {
        let set = get_columns(Some("dvd"));
        assert!(!set.base.is_empty());
        assert!(set.variants.is_empty());
        assert!(extension_columns("dvd").is_empty());
    }

    #[test]
    fn test_no_variant_returns_all_extensions() {
        let set = get_columns(None);
        assert_eq!(set.variants.len(), Variant::ALL.len());
    }

    #[test]
    fn test_repeated_calls_share_static_schema() {
        let a = get_columns(Some("book"));
        let b = get_columns(Some("book"));
        assert!(std::ptr::eq(a.base, b.base));
        assert!(std::ptr::eq(a.variants[&Variant::Book], b.variants[&Variant::Book]));
    }

    #[test]
    fn test_select_columns_declare_their_scope() {
        let publisher = find_column("publisher").unwrap();
        assert_eq!(publisher.kind, FieldKind::Select);
        assert!(publisher.select.unwrap().tenant_scoped);

        let languages = find_column("languages").unwrap();
        assert_eq!(languages.kind, FieldKind::MultiSelect);
        assert!(!languages.select.unwrap().tenant_scoped);

        let authors = find_column("authors").unwrap();
        assert_eq!(authors.select.unwrap().entity, NamedEntity::Author);
        assert_eq!(authors.owner, ColumnOwner::Variant(Variant::Book));
    }

    #[test]
    fn test_joined_appends_extension_after_base() {
        let joined = get_columns(Some("book")).joined(Variant::Book);
        assert_eq!(joined.len(), base_columns().len() + BOOK_COLUMNS.len());
        assert_eq!(joined[0].id, "acc_no");
        assert_eq!(joined.last().unwrap().id, "isbn");
    }
}
