//! Column descriptors: static metadata describing catalog fields

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use utoipa::ToSchema;

use super::enums::{FieldKind, NamedEntity, Variant};

/// Which entity a column lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnOwner {
    Base,
    Variant(Variant),
}

impl ColumnOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnOwner::Base => "base",
            ColumnOwner::Variant(v) => v.as_str(),
        }
    }
}

impl Serialize for ColumnOwner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Where a select column takes its options from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct SelectSource {
    pub entity: NamedEntity,
    /// Options exist per library rather than globally
    pub tenant_scoped: bool,
}

/// One field of the catalog schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ColumnDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    #[schema(value_type = String)]
    pub owner: ColumnOwner,
    pub required: bool,
    /// Matched by catalog search
    pub searchable: bool,
    /// Numbers must be whole and greater than zero
    pub positive_integer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<SelectSource>,
}

impl ColumnDescriptor {
    pub const fn text(id: &'static str, label: &'static str) -> Self {
        Self::new(id, label, FieldKind::Text)
    }

    pub const fn number(id: &'static str, label: &'static str) -> Self {
        Self::new(id, label, FieldKind::Number)
    }

    pub const fn boolean(id: &'static str, label: &'static str) -> Self {
        Self::new(id, label, FieldKind::Boolean)
    }

    pub const fn date(id: &'static str, label: &'static str) -> Self {
        Self::new(id, label, FieldKind::Date)
    }

    pub const fn select(id: &'static str, label: &'static str, entity: NamedEntity, tenant_scoped: bool) -> Self {
        let mut column = Self::new(id, label, FieldKind::Select);
        column.select = Some(SelectSource { entity, tenant_scoped });
        column
    }

    pub const fn multi_select(id: &'static str, label: &'static str, entity: NamedEntity, tenant_scoped: bool) -> Self {
        let mut column = Self::new(id, label, FieldKind::MultiSelect);
        column.select = Some(SelectSource { entity, tenant_scoped });
        column
    }

    const fn new(id: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            id,
            label,
            kind,
            owner: ColumnOwner::Base,
            required: false,
            searchable: false,
            positive_integer: false,
            select: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub const fn positive_integer(mut self) -> Self {
        self.positive_integer = true;
        self
    }

    pub const fn owned_by(mut self, variant: Variant) -> Self {
        self.owner = ColumnOwner::Variant(variant);
        self
    }
}

/// Result of a registry lookup: base columns plus the extension columns of
/// each requested variant.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSet {
    pub base: &'static [ColumnDescriptor],
    pub variants: IndexMap<Variant, &'static [ColumnDescriptor]>,
}

impl ColumnSet {
    /// Base columns followed by the extension columns of `variant`.
    pub fn joined(&self, variant: Variant) -> Vec<&'static ColumnDescriptor> {
        let extension = self.variants.get(&variant).copied().unwrap_or(&[]);
        self.base.iter().chain(extension.iter()).collect()
    }
}

/// An existing option for a select column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow, ToSchema)]
pub struct SelectOption {
    pub id: i64,
    pub name: String,
}
