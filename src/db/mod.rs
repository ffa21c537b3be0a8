//! The metadata index: one `files` row per stored original plus the
//! append-only `meta` history.

mod schema;
pub mod sqlite;

pub use schema::{MIGRATIONS, SCHEMA};
pub use sqlite::{is_unique_violation, SqliteIndex};

use crate::ingest::ContentHash;

/// File name of the index inside the library root.
pub const INDEX_FILE: &str = "piclib.sqlite";

/// Meta field used for free-text notes.
pub const NOTES_FIELD: &str = "Notes";

/// A `files` row without its thumbnail blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub id: i64,
    pub sum: ContentHash,
    pub name: String,
    /// Epoch seconds.
    pub added: i64,
    /// Epoch seconds, 0 when unknown.
    pub taken: i64,
    /// 1..=8, 0 when unknown.
    pub orient: u8,
}

/// Values for a new `files` row.
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub sum: ContentHash,
    pub name: &'a str,
    pub added: i64,
    pub taken: i64,
    pub orient: u8,
    pub thumb: Option<&'a [u8]>,
}

/// One entry of a field's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRecord {
    /// Epoch seconds.
    pub time: i64,
    pub value: String,
}
