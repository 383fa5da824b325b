//! Catalog core: column registry, select scoping, validation and query
//! composition. Nothing in here touches storage.

pub mod columns;
pub mod query;
pub mod scoping;
pub mod validator;

pub use columns::{get_columns, user_columns};
pub use query::{apply_flatten, compose_listing, compose_lookup, compose_search, present_selects, Listing};
pub use validator::{build_item_command, build_user_command, validate};
