//! Data models for the catalog

pub mod column;
pub mod enums;
pub mod import_report;
pub mod item;
pub mod user;

// Re-export commonly used types
pub use column::{ColumnDescriptor, ColumnSet, SelectOption};
pub use enums::{FieldKind, ListMode, NamedEntity, RowKind, Variant};
pub use import_report::{ImportReport, RowOutcome};
pub use item::{CleanedValue, ItemCommand, ItemQuery, ItemRow, ScopedName};
pub use user::UserCommand;
