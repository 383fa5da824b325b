//! Select scoping: turns raw option names into tenant-qualified lookup keys.
//!
//! Scoping is a property of the column (see [`SelectSource::tenant_scoped`])
//! and is applied exactly once, by the validator. [`ScopedName`] can only be
//! produced here, so an already scoped value cannot be scoped again.

use crate::models::{column::SelectSource, item::ScopedName};

/// Scopes one raw option name. Tenant-scoped sources carry the library slug
/// in the key, global sources do not. Returns `None` for blank names.
pub fn scope_select_value(raw: &str, library_slug: &str, source: &SelectSource) -> Option<ScopedName> {
    let name = raw.trim();
    if name.is_empty() {
        return None;
    }
    let slug = source.tenant_scoped.then(|| library_slug.to_string());
    Some(ScopedName::new(slug, name.to_string()))
}

/// Element-wise [`scope_select_value`]. Blank names are dropped and repeated
/// names collapse to one key, keeping first-seen order.
pub fn scope_select_values<'a, I>(raws: I, library_slug: &str, source: &SelectSource) -> Vec<ScopedName>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scoped: Vec<ScopedName> = Vec::new();
    for raw in raws {
        if let Some(key) = scope_select_value(raw, library_slug, source) {
            if !scoped.contains(&key) {
                scoped.push(key);
            }
        }
    }
    scoped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::NamedEntity;

    const AUTHORS: SelectSource = SelectSource {
        entity: NamedEntity::Author,
        tenant_scoped: true,
    };
    const LANGUAGES: SelectSource = SelectSource {
        entity: NamedEntity::Language,
        tenant_scoped: false,
    };

    #[test]
    fn test_scoped_key_carries_tenant() {
        let key = scope_select_value(" Jane Doe ", "unity-public", &AUTHORS).unwrap();
        assert_eq!(key.library_slug(), Some("unity-public"));
        assert_eq!(key.name(), "Jane Doe");
        assert_eq!(key.to_string(), "unity-public/Jane Doe");
    }

    #[test]
    fn test_global_key_has_no_tenant() {
        let key = scope_select_value("English", "unity-public", &LANGUAGES).unwrap();
        assert_eq!(key.library_slug(), None);
    }

    #[test]
    fn test_same_name_differs_between_tenants() {
        let a = scope_select_value("Fiction", "a", &AUTHORS).unwrap();
        let b = scope_select_value("Fiction", "b", &AUTHORS).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_multi_values_skip_blanks_and_duplicates() {
        let keys = scope_select_values(["Jane Doe", " ", "John Roe", "Jane Doe "], "t", &AUTHORS);
        let names: Vec<&str> = keys.iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["Jane Doe", "John Roe"]);
    }
}
