//! Bulk import of uploaded tables.

pub mod layout;
pub mod pipeline;
pub mod source;

pub use pipeline::{import_into, import_rows, RowError};
pub use source::{csv_rows, upload_pipe, RawRow, RowParseError, RowResult};
