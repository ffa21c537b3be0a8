//! The library façade: content store, metadata index and ingest pipeline
//! bound to one root directory.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::ThumbnailConfig;
use crate::db::{is_unique_violation, NewFile, SqliteIndex, INDEX_FILE};
use crate::error::{Error, Result};
use crate::ingest::{self, hash_reader, ContentHash, DecodeWarning, HashResult, Thumbnailer};
use crate::picture::Picture;
use crate::store::{canonical_ext, ContentStore};

/// Result of a successful ingest.
#[derive(Debug)]
pub struct Ingested<'lib> {
    pub picture: Picture<'lib>,
    /// Non-fatal problems met while deriving metadata.
    pub warnings: Vec<DecodeWarning>,
}

pub struct Library {
    root: PathBuf,
    store: ContentStore,
    index: SqliteIndex,
    thumbnailer: Thumbnailer,
    /// Serializes every write to the store and index.
    writes: Mutex<()>,
}

impl Library {
    /// Open (creating if needed) the library rooted at `path` with default
    /// thumbnail settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &ThumbnailConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, thumbnails: &ThumbnailConfig) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not a directory", root.display()),
            )));
        }

        let index = SqliteIndex::open(&root.join(INDEX_FILE))?;
        index.initialize()?;
        debug!(root = %root.display(), "opened library");

        Ok(Self {
            store: ContentStore::new(&root),
            root,
            index,
            thumbnailer: Thumbnailer::new(thumbnails),
            writes: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn store(&self) -> &ContentStore {
        &self.store
    }

    pub(crate) fn index(&self) -> &SqliteIndex {
        &self.index
    }

    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ingest `source`, discarding decode warnings.
    pub fn add_file(&self, source: &Path) -> Result<Picture<'_>> {
        Ok(self.ingest(source)?.picture)
    }

    /// Hash `source`, store a copy under its content hash, derive capture
    /// time, orientation and thumbnail, and record a new row.
    ///
    /// Byte-identical content already in the library is rejected with
    /// [`Error::Duplicate`] whatever the file is called. Failures to read
    /// EXIF or decode the image are not errors; they come back as warnings
    /// and the picture is stored with unknown time and orientation and no
    /// thumbnail.
    pub fn ingest(&self, source: &Path) -> Result<Ingested<'_>> {
        let file = File::open(source)?;
        self.ingest_from(source, file)
    }

    /// Hashing and copying both read the one open handle, so the stored
    /// bytes are the hashed bytes even if `source` is replaced meanwhile.
    /// Metadata is derived from the stored copy for the same reason.
    fn ingest_from(&self, source: &Path, mut file: File) -> Result<Ingested<'_>> {
        let _writes = self.lock_writes();

        let hashed = hash_reader(&mut file)?;
        if self.index.exists(&hashed.sum)? {
            debug!(path = %source.display(), sum = %hashed.sum, "already in library");
            return Err(Error::Duplicate {
                path: source.to_path_buf(),
            });
        }

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = canonical_ext(&name);

        file.seek(SeekFrom::Start(0))?;
        let stored = self
            .store
            .put(&hashed.sum, &ext, &mut BufReader::new(file))?;

        let (id, warnings) = match self.record(source, &name, &hashed, &stored.path) {
            Ok(recorded) => recorded,
            Err(e) => {
                // A duplicate's copy belongs to whoever recorded it first.
                if stored.created && !e.is_duplicate() {
                    if let Err(rm) = self.store.remove(&hashed.sum, &ext) {
                        warn!(path = %stored.path.display(), error = %rm, "could not remove orphaned copy");
                    }
                }
                return Err(e);
            }
        };
        debug!(id, name = %name, bytes = hashed.len, path = %stored.path.display(), "added");

        Ok(Ingested {
            picture: self.picture(id)?,
            warnings,
        })
    }

    /// Derive metadata from the stored copy at `stored` and insert the row.
    fn record(
        &self,
        source: &Path,
        name: &str,
        hashed: &HashResult,
        stored: &Path,
    ) -> Result<(i64, Vec<DecodeWarning>)> {
        let derived = ingest::derive(stored, &self.thumbnailer)?;
        for warning in &derived.warnings {
            debug!(path = %source.display(), %warning, "decode warning");
        }

        let row = NewFile {
            sum: hashed.sum,
            name,
            added: Utc::now().timestamp(),
            taken: derived.taken.map_or(0, |t| t.timestamp()),
            orient: derived.orient,
            thumb: derived.thumb.as_deref(),
        };
        match self.index.insert(&row) {
            Ok(id) => Ok((id, derived.warnings)),
            Err(Error::Database(e)) if is_unique_violation(&e) => Err(Error::Duplicate {
                path: source.to_path_buf(),
            }),
            Err(e) => Err(e),
        }
    }

    pub fn picture(&self, id: i64) -> Result<Picture<'_>> {
        let row = self.index.get(id)?.ok_or(Error::NotFound(id))?;
        Ok(Picture::from_row(self, row))
    }

    /// Pictures newest-taken first; undated pictures sort last. A `limit` of
    /// 0 means no limit.
    pub fn list(&self, limit: u32, offset: u32) -> Result<Vec<Picture<'_>>> {
        let rows = self.index.list(limit, offset)?;
        Ok(rows.into_iter().map(|row| Picture::from_row(self, row)).collect())
    }

    /// Pictures taken within `[start, end]`, newest first.
    pub fn list_time(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Picture<'_>>> {
        let rows = self.index.list_between(start.timestamp(), end.timestamp())?;
        Ok(rows.into_iter().map(|row| Picture::from_row(self, row)).collect())
    }

    pub fn count(&self) -> Result<u64> {
        self.index.count()
    }

    pub fn find_by_sum(&self, sum: &ContentHash) -> Result<Option<Picture<'_>>> {
        Ok(self
            .index
            .find_by_sum(sum)?
            .map(|row| Picture::from_row(self, row)))
    }

    /// Rebuild the thumbnail and orientation of `id` from its stored
    /// original.
    pub fn refresh_thumbnail(&self, id: i64) -> Result<Vec<DecodeWarning>> {
        let picture = self.picture(id)?;
        let derived = ingest::derive(&picture.filepath(), &self.thumbnailer)?;

        let _writes = self.lock_writes();
        if !self
            .index
            .set_thumb(id, derived.orient, derived.thumb.as_deref())?
        {
            return Err(Error::NotFound(id));
        }
        debug!(id, orient = derived.orient, "refreshed thumbnail");
        Ok(derived.warnings)
    }

    /// Remove a picture: its stored file first, then its row. The `meta`
    /// history is kept, and since ids are never reused it cannot attach to
    /// a later picture. A file that is already gone does not stop the row
    /// from being removed.
    pub fn delete(&self, id: i64) -> Result<()> {
        let _writes = self.lock_writes();
        let row = self.index.get(id)?.ok_or(Error::NotFound(id))?;
        let ext = canonical_ext(&row.name);

        match self.store.remove(&row.sum, &ext) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(id, "stored file already missing");
            }
            Err(e) => return Err(e.into()),
        }
        self.index.delete(id)?;
        info!(id, name = %row.name, "deleted picture");
        Ok(())
    }

    /// Files under the root that are neither the index nor the canonical
    /// path of any picture.
    pub fn untracked(&self) -> Result<Vec<PathBuf>> {
        let tracked: HashSet<PathBuf> = self
            .index
            .list(0, 0)?
            .into_iter()
            .map(|row| self.store.path(&row.sum, &canonical_ext(&row.name)))
            .collect();

        let files = self.store.entries()?;
        Ok(files
            .into_iter()
            .filter(|path| !is_index_file(path) && !tracked.contains(path))
            .collect())
    }

    pub(crate) fn append_meta(&self, id: i64, field: &str, value: &str) -> Result<()> {
        let _writes = self.lock_writes();
        self.index
            .append_meta(id, Utc::now().timestamp(), field, value)
    }
}

/// The index database and the journal files SQLite keeps next to it.
fn is_index_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    match name.strip_prefix(INDEX_FILE) {
        Some(suffix) => matches!(suffix, "" | "-journal" | "-wal" | "-shm"),
        None => false,
    }
}
