//! Storage engine for a personal photo library.
//!
//! Originals are kept in a content-addressed directory, named by the
//! SHA-256 of their bytes and made read-only, next to a SQLite index
//! (`piclib.sqlite`) holding one row per picture plus an append-only
//! history of user-editable fields such as notes.
//!
//! ```no_run
//! use piclib::Library;
//! use std::path::Path;
//!
//! # fn main() -> piclib::Result<()> {
//! let lib = Library::open("/home/me/.piclib")?;
//! match lib.add_file(Path::new("IMG_0042.JPG")) {
//!     Ok(pic) => pic.set_notes("first day of the trip")?,
//!     Err(e) if e.is_duplicate() => {}
//!     Err(e) => return Err(e),
//! }
//! for pic in lib.list(20, 0)? {
//!     println!("{} {}", pic.id, pic.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod integrity;
pub mod library;
pub mod logging;
pub mod picture;
pub mod store;

#[cfg(test)]
mod test_helpers;

pub use config::{Config, ThumbnailConfig};
pub use error::{ConfigError, Error, Result};
pub use ingest::{ContentHash, DecodeWarning};
pub use integrity::{
    IntegrityChecker, IntegrityProgress, RepairFailure, RepairReport, ValidationReport,
};
pub use library::{Ingested, Library};
pub use picture::Picture;
