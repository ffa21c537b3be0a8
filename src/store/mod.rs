//! Content-addressed file store.
//!
//! Originals live directly under the library root as
//! `{hex(sum)}{ext}`. A stored file is never rewritten; once present it is
//! made read-only.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::ingest::ContentHash;

/// Lowercased extension of `name` including the leading dot, or an empty
/// string. Taken from the last dot of the base name.
pub fn canonical_ext(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    match base.rfind('.') {
        Some(i) => base[i..].to_lowercase(),
        None => String::new(),
    }
}

/// `lowercase_hex(sum) + ext`.
pub fn diskname(sum: &ContentHash, ext: &str) -> String {
    format!("{}{}", sum.to_hex(), ext)
}

/// Where `put` left an original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub path: PathBuf,
    /// False when a file was already at the canonical path.
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical location for `sum` with extension `ext`. No I/O.
    pub fn path(&self, sum: &ContentHash, ext: &str) -> PathBuf {
        self.root.join(diskname(sum, ext))
    }

    /// Copy `reader` to the canonical path and make the result read-only.
    /// An existing file at that path is left alone. A failed copy leaves no
    /// partial file behind.
    pub fn put<R: Read>(&self, sum: &ContentHash, ext: &str, reader: &mut R) -> io::Result<Stored> {
        let path = self.path(sum, ext);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(Stored { path, created: false })
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = io::copy(reader, &mut file) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        drop(file);

        make_read_only(&path)?;
        Ok(Stored { path, created: true })
    }

    pub fn open(&self, sum: &ContentHash, ext: &str) -> io::Result<File> {
        File::open(self.path(sum, ext))
    }

    /// Delete a stored original.
    pub fn remove(&self, sum: &ContentHash, ext: &str) -> io::Result<()> {
        let path = self.path(sum, ext);
        #[cfg(not(unix))]
        {
            // Read-only files cannot be deleted on Windows.
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_readonly(false);
            fs::set_permissions(&path, perms)?;
        }
        fs::remove_file(path)
    }

    /// Move an existing file under the root onto the canonical path for
    /// `sum`. Refuses to replace anything already at that path, dangling
    /// symlinks included.
    pub fn adopt(&self, from: &Path, sum: &ContentHash, ext: &str) -> io::Result<PathBuf> {
        let target = self.path(sum, ext);
        if fs::symlink_metadata(&target).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", target.display()),
            ));
        }

        // Try rename first (same filesystem)
        match fs::rename(from, &target) {
            Ok(_) => {}
            Err(_) => {
                // Fall back to copy + delete
                fs::copy(from, &target)?;
                fs::remove_file(from)?;
            }
        }

        make_read_only(&target)?;
        Ok(target)
    }

    /// Regular files directly under the root, sorted by path.
    pub fn entries(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(unix)]
fn make_read_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o444))
}

#[cfg(not(unix))]
fn make_read_only(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn sum() -> ContentHash {
        ContentHash([0xab; 32])
    }

    #[test]
    fn test_canonical_ext() {
        assert_eq!(canonical_ext("IMG_0001.JPG"), ".jpg");
        assert_eq!(canonical_ext("/some/dir.d/clip.Mp4"), ".mp4");
        assert_eq!(canonical_ext("archive.tar.GZ"), ".gz");
        assert_eq!(canonical_ext("README"), "");
    }

    #[test]
    fn test_path_is_pure() {
        let store = ContentStore::new("/nonexistent/lib");
        let path = store.path(&sum(), ".jpg");
        assert_eq!(path, Path::new("/nonexistent/lib").join(format!("{}.jpg", "ab".repeat(32))));
    }

    #[test]
    fn test_put_writes_once() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let first = store.put(&sum(), ".jpg", &mut Cursor::new(b"first".to_vec())).unwrap();
        assert!(first.created);
        let path = first.path;
        assert_eq!(fs::read(&path).unwrap(), b"first");

        let again = store.put(&sum(), ".jpg", &mut Cursor::new(b"second".to_vec())).unwrap();
        assert_eq!(again, Stored { path: path.clone(), created: false });
        assert_eq!(fs::read(&path).unwrap(), b"first");
        assert!(fs::metadata(&path).unwrap().permissions().readonly());
    }

    #[cfg(unix)]
    #[test]
    fn test_put_sets_mode_0444() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let path = store.put(&sum(), ".png", &mut Cursor::new(vec![1, 2, 3])).unwrap().path;
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
    }

    #[test]
    fn test_failed_put_leaves_nothing() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
            }
        }

        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        assert!(store.put(&sum(), ".jpg", &mut Failing).is_err());
        assert!(!store.path(&sum(), ".jpg").exists());
    }

    #[test]
    fn test_adopt_and_entries() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let stray = dir.path().join("stray.png");
        fs::write(&stray, b"pixels").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        assert_eq!(store.entries().unwrap(), vec![stray.clone()]);

        let target = store.adopt(&stray, &sum(), ".png").unwrap();
        assert!(!stray.exists());
        assert_eq!(fs::read(&target).unwrap(), b"pixels");

        fs::write(&stray, b"other").unwrap();
        let err = store.adopt(&stray, &sum(), ".png").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(stray.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_adopt_refuses_dangling_symlink() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let stray = dir.path().join("stray.png");
        fs::write(&stray, b"pixels").unwrap();
        let target = store.path(&sum(), ".png");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &target).unwrap();

        let err = store.adopt(&stray, &sum(), ".png").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(stray.exists());
        assert!(fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_remove_read_only_original() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let path = store.put(&sum(), ".jpg", &mut Cursor::new(b"x".to_vec())).unwrap().path;
        store.remove(&sum(), ".jpg").unwrap();
        assert!(!path.exists());
    }
}
