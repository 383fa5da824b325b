//! Shared domain enums

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// Item variant discriminator. The string form is what clients send in the
/// `type` key and what the repository stores on the item row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Book,
    Magazine,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Book, Variant::Magazine];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Book => "book",
            Variant::Magazine => "magazine",
        }
    }

    /// Extension table holding this variant's fields (one row per item).
    pub fn table(&self) -> &'static str {
        match self {
            Variant::Book => "books",
            Variant::Magazine => "magazines",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "book" => Ok(Variant::Book),
            "magazine" => Ok(Variant::Magazine),
            _ => Err(format!("Unknown item variant: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldKind
// ---------------------------------------------------------------------------

/// Value kind of a catalog column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Date,
    Select,
    MultiSelect,
}

impl FieldKind {
    pub fn is_select(&self) -> bool {
        matches!(self, FieldKind::Select | FieldKind::MultiSelect)
    }
}

// ---------------------------------------------------------------------------
// NamedEntity
// ---------------------------------------------------------------------------

/// Entities referenced by name from select columns. They outlive the items
/// that reference them and are created on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NamedEntity {
    Publisher,
    Category,
    Author,
    Language,
}

impl NamedEntity {
    pub fn table(&self) -> &'static str {
        match self {
            NamedEntity::Publisher => "publishers",
            NamedEntity::Category => "categories",
            NamedEntity::Author => "authors",
            NamedEntity::Language => "languages",
        }
    }

    /// Foreign key column used by single selects and junction tables.
    pub fn key_column(&self) -> &'static str {
        match self {
            NamedEntity::Publisher => "publisher_id",
            NamedEntity::Category => "category_id",
            NamedEntity::Author => "author_id",
            NamedEntity::Language => "language_id",
        }
    }
}

impl std::fmt::Display for NamedEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NamedEntity::Publisher => "publisher",
            NamedEntity::Category => "category",
            NamedEntity::Author => "author",
            NamedEntity::Language => "language",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// ListMode
// ---------------------------------------------------------------------------

/// Listing shapes offered by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    /// Full tenant listing ordered by accession number
    #[default]
    All,
    /// Most recently acquired items, bounded
    Recent,
    /// Most used items, bounded
    Popular,
}

// ---------------------------------------------------------------------------
// RowKind
// ---------------------------------------------------------------------------

/// What the rows of an uploaded table describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Item,
    User,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Item => "item",
            RowKind::User => "user",
        }
    }
}

impl std::fmt::Display for RowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RowKind {
    type Err = String;

    /// Accepts the long names and the single-letter codes older upload forms send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "item" | "i" => Ok(RowKind::Item),
            "user" | "u" => Ok(RowKind::User),
            other => Err(format!("Import type not provided or invalid: '{}'", other)),
        }
    }
}
