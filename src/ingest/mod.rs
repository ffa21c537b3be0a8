//! The per-file pieces of ingest: hashing, EXIF, decoding, thumbnails.

pub mod decode;
pub mod discovery;
pub mod exif;
pub mod hashing;
pub mod thumbnails;

use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

pub use decode::Decoded;
pub use discovery::{discover_files, Discovered};
pub use self::exif::ExifInfo;
pub use hashing::{hash_file, hash_reader, ContentHash, HashResult};
pub use thumbnails::Thumbnailer;

/// A non-fatal failure while deriving metadata from an otherwise acceptable
/// file. Ingest proceeds with the corresponding fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// EXIF block present but unreadable; taken and orient are unknown.
    Exif(String),
    /// Not a decodable image; no thumbnail.
    Unsupported(String),
    /// Damaged image data; no thumbnail.
    Corrupt(String),
    /// Decoded fine but the thumbnail could not be encoded.
    Thumbnail(String),
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::Exif(m) => write!(f, "unreadable EXIF: {}", m),
            DecodeWarning::Unsupported(m) => write!(f, "unsupported format: {}", m),
            DecodeWarning::Corrupt(m) => write!(f, "corrupt image: {}", m),
            DecodeWarning::Thumbnail(m) => write!(f, "thumbnail failed: {}", m),
        }
    }
}

/// Metadata derived from an original's bytes.
#[derive(Debug, Clone, Default)]
pub struct Derived {
    pub taken: Option<DateTime<Utc>>,
    /// 1..=8, or 0 when unknown.
    pub orient: u8,
    pub thumb: Option<Vec<u8>>,
    pub warnings: Vec<DecodeWarning>,
}

/// Read EXIF and build a thumbnail from `path`, each from its own freshly
/// opened reader. Only failing to open the file is an error.
pub fn derive(path: &Path, thumbnailer: &Thumbnailer) -> io::Result<Derived> {
    let mut derived = Derived::default();

    let mut reader = BufReader::new(File::open(path)?);
    match exif::extract(&mut reader) {
        Ok(info) => {
            derived.taken = info.taken;
            derived.orient = info.orientation.unwrap_or(0);
        }
        Err(e) => derived.warnings.push(DecodeWarning::Exif(e.to_string())),
    }

    let reader = BufReader::new(File::open(path)?);
    derived.thumb = match decode::decode(reader) {
        Ok(Decoded::Image(img)) => match thumbnailer.make(&img, derived.orient) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                derived.warnings.push(DecodeWarning::Thumbnail(e.to_string()));
                None
            }
        },
        Ok(Decoded::Unsupported(m)) => {
            derived.warnings.push(DecodeWarning::Unsupported(m));
            None
        }
        Ok(Decoded::Corrupt(m)) => {
            derived.warnings.push(DecodeWarning::Corrupt(m));
            None
        }
        Err(e) => {
            derived.warnings.push(DecodeWarning::Corrupt(e.to_string()));
            None
        }
    };

    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThumbnailConfig;
    use crate::test_helpers::{jpeg_with_exif, plain_png, write_file};
    use tempfile::tempdir;

    fn small() -> Thumbnailer {
        Thumbnailer::new(&ThumbnailConfig { width: 32, height: 0, quality: 75 })
    }

    #[test]
    fn test_derive_tagged_jpeg() {
        let dir = tempdir().unwrap();
        let data = jpeg_with_exif(64, 32, Some(8), Some("2020:02:29 12:00:00"), None);
        let path = write_file(dir.path(), "leap.jpg", &data);

        let derived = derive(&path, &small()).unwrap();
        assert_eq!(derived.orient, 8);
        assert_eq!(derived.taken.unwrap().timestamp(), 1582977600);
        assert!(derived.thumb.is_some());
        assert!(derived.warnings.is_empty());
    }

    #[test]
    fn test_derive_untagged_png() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "plain.png", &plain_png(20, 10));

        let derived = derive(&path, &small()).unwrap();
        assert_eq!(derived.orient, 0);
        assert!(derived.taken.is_none());
        assert!(derived.thumb.is_some());
    }

    #[test]
    fn test_derive_tall_strip_thumbnail_is_bounded() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "strip.png", &plain_png(1, 20_000));

        let derived = derive(&path, &small()).unwrap();
        assert!(derived.warnings.is_empty());
        let thumb = image::load_from_memory(&derived.thumb.unwrap()).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (1, 128));
    }

    #[test]
    fn test_derive_non_image_warns() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "clip.mov", b"definitely not pixels");

        let derived = derive(&path, &small()).unwrap();
        assert!(derived.thumb.is_none());
        assert!(derived
            .warnings
            .iter()
            .any(|w| matches!(w, DecodeWarning::Unsupported(_))));
    }

    #[test]
    fn test_derive_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(derive(&dir.path().join("gone.jpg"), &small()).is_err());
    }
}
