//! Error types for library operations.
//!
//! Every failure either surfaces here with enough context (source path or
//! picture id) for the caller to act, or is recovered with an explicit
//! fallback and reported as a [`crate::ingest::DecodeWarning`].

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for piclib operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A picture with the same content hash is already in the library.
    #[error("{} already exists in the library", path.display())]
    Duplicate { path: PathBuf },

    /// The stored original no longer hashes to its recorded sum.
    #[error("file '{}' (pic '{name}', id {id}) failed checksum validation", path.display())]
    BadSum { id: i64, name: String, path: PathBuf },

    /// No picture row with this id.
    #[error("picture {0} not found")]
    NotFound(i64),

    /// Filesystem failure, passed through unchanged.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index failure, passed through unchanged.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Thumbnail encoding failed.
    #[error("thumbnail error: {0}")]
    Thumbnail(#[from] image::ImageError),

    /// EXIF data present but structurally broken.
    #[error("EXIF error: {0}")]
    Exif(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate { .. })
    }

    pub fn is_bad_sum(&self) -> bool {
        matches!(self, Error::BadSum { .. })
    }

    /// True for a missing row as well as a missing file on disk.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Convenience type alias for piclib results.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let dup = Error::Duplicate { path: PathBuf::from("/tmp/a.jpg") };
        assert!(dup.is_duplicate());
        assert!(!dup.is_bad_sum());
        assert_eq!(dup.to_string(), "/tmp/a.jpg already exists in the library");

        let missing = Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(missing.is_not_found());
        assert!(Error::NotFound(3).is_not_found());
    }
}
