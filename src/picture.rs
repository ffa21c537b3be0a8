//! Picture handles returned by [`Library`].

use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::File;
use std::path::PathBuf;

use crate::db::{FileRow, MetaRecord, NOTES_FIELD};
use crate::error::{Error, Result};
use crate::ingest::{hash_file, ContentHash};
use crate::library::Library;
use crate::store::canonical_ext;

/// A snapshot of one stored original.
///
/// The public fields are copies of the index row; changing them does not
/// touch the index. Mutable metadata goes through [`set_meta`](Self::set_meta).
/// The handle borrows the library it came from, so it cannot outlive it.
#[derive(Clone)]
pub struct Picture<'lib> {
    pub id: i64,
    pub sum: ContentHash,
    /// Original base filename, display only.
    pub name: String,
    pub added: DateTime<Utc>,
    /// Capture time from EXIF, `None` when unknown.
    pub taken: Option<DateTime<Utc>>,
    /// EXIF orientation 1..=8, 0 when unknown.
    pub orient: u8,
    lib: &'lib Library,
}

impl<'lib> Picture<'lib> {
    pub(crate) fn from_row(lib: &'lib Library, row: FileRow) -> Self {
        Self {
            id: row.id,
            sum: row.sum,
            name: row.name,
            added: DateTime::from_timestamp(row.added, 0).unwrap_or_default(),
            taken: match row.taken {
                0 => None,
                secs => DateTime::from_timestamp(secs, 0),
            },
            orient: row.orient,
            lib,
        }
    }

    /// Lowercased extension of the original name, with its dot.
    pub fn ext(&self) -> String {
        canonical_ext(&self.name)
    }

    /// Canonical on-disk location.
    pub fn filepath(&self) -> PathBuf {
        self.lib.store().path(&self.sum, &self.ext())
    }

    /// Capture time in epoch seconds, 0 when unknown.
    pub fn taken_timestamp(&self) -> i64 {
        self.taken.map_or(0, |t| t.timestamp())
    }

    pub fn open(&self) -> Result<File> {
        Ok(self.lib.store().open(&self.sum, &self.ext())?)
    }

    /// The stored upright JPEG thumbnail; empty when none could be made.
    pub fn thumb(&self) -> Result<Vec<u8>> {
        self.lib
            .index()
            .thumb_of(self.id)?
            .ok_or(Error::NotFound(self.id))
    }

    /// Re-hash the stored file and compare with `sum`.
    pub fn validate(&self) -> Result<()> {
        let path = self.filepath();
        let hashed = hash_file(&path)?;
        if hashed.sum != self.sum {
            return Err(Error::BadSum {
                id: self.id,
                name: self.name.clone(),
                path,
            });
        }
        Ok(())
    }

    /// Current notes, empty when none were ever set.
    pub fn notes(&self) -> Result<String> {
        Ok(self.meta(NOTES_FIELD)?.unwrap_or_default())
    }

    pub fn set_notes(&self, notes: &str) -> Result<()> {
        self.set_meta(NOTES_FIELD, notes)
    }

    /// Most recently recorded value of `field`.
    pub fn meta(&self, field: &str) -> Result<Option<String>> {
        self.lib.index().latest_meta(self.id, field)
    }

    /// Record a new value for `field`. Earlier values are kept.
    pub fn set_meta(&self, field: &str, value: &str) -> Result<()> {
        self.lib.append_meta(self.id, field, value)
    }

    /// All values ever recorded for `field`, newest first.
    pub fn meta_history(&self, field: &str) -> Result<Vec<MetaRecord>> {
        self.lib.index().meta_history(self.id, field)
    }
}

impl fmt::Debug for Picture<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picture")
            .field("id", &self.id)
            .field("sum", &self.sum.to_hex())
            .field("name", &self.name)
            .field("added", &self.added)
            .field("taken", &self.taken)
            .field("orient", &self.orient)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{plain_png, write_file};
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_fields_and_paths() {
        let dir = tempdir().unwrap();
        let lib = Library::open(dir.path().join("lib")).unwrap();
        let src = write_file(dir.path(), "Holiday.PNG", &plain_png(8, 8));

        let pic = lib.add_file(&src).unwrap();
        assert_eq!(pic.ext(), ".png");
        assert_eq!(pic.name, "Holiday.PNG");
        assert_eq!(
            pic.filepath(),
            lib.root().join(format!("{}.png", pic.sum.to_hex()))
        );
        assert!(pic.taken.is_none());
        assert_eq!(pic.taken_timestamp(), 0);

        let mut stored = Vec::new();
        pic.open().unwrap().read_to_end(&mut stored).unwrap();
        assert_eq!(stored, plain_png(8, 8));
    }

    #[test]
    fn test_meta_fields_are_independent() {
        let dir = tempdir().unwrap();
        let lib = Library::open(dir.path().join("lib")).unwrap();
        let src = write_file(dir.path(), "a.png", &plain_png(4, 4));
        let pic = lib.add_file(&src).unwrap();

        assert_eq!(pic.notes().unwrap(), "");
        assert_eq!(pic.meta("Album").unwrap(), None);

        pic.set_meta("Album", "summer").unwrap();
        pic.set_notes("beach").unwrap();
        assert_eq!(pic.meta("Album").unwrap().as_deref(), Some("summer"));
        assert_eq!(pic.notes().unwrap(), "beach");
        assert_eq!(pic.meta_history("Album").unwrap().len(), 1);
    }

    #[test]
    fn test_debug_omits_library() {
        let dir = tempdir().unwrap();
        let lib = Library::open(dir.path().join("lib")).unwrap();
        let src = write_file(dir.path(), "a.png", &plain_png(4, 4));
        let pic = lib.add_file(&src).unwrap();

        let shown = format!("{:?}", pic);
        assert!(shown.contains("a.png"));
        assert!(shown.contains(&pic.sum.to_hex()));
    }
}
