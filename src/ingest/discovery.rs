use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Result of [`discover_files`]. A walk that hits unreadable entries still
/// returns every file it could reach.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Sorted by path.
    pub files: Vec<PathBuf>,
    pub errors: Vec<walkdir::Error>,
}

/// Recursively collect files under `directory` whose extension is in
/// `extensions` (case-insensitive, leading dot optional).
pub fn discover_files(directory: &Path, extensions: &[String]) -> Discovered {
    let wanted: HashSet<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();
    let mut found = Discovered::default();

    for entry in WalkDir::new(directory).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                found.errors.push(e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .is_some_and(|ext| wanted.contains(&ext.to_string_lossy().to_lowercase()));
        if matches {
            found.files.push(entry.into_path());
        }
    }

    found.files.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn image_extensions() -> Vec<String> {
        vec!["jpg".to_string(), ".JPEG".to_string(), "png".to_string()]
    }

    #[test]
    fn test_discover_files() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("photo1.JPG")).unwrap();
        File::create(dir.path().join("photo2.png")).unwrap();
        File::create(dir.path().join("document.txt")).unwrap();
        File::create(dir.path().join("no_extension")).unwrap();

        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/photo3.jpeg")).unwrap();

        let found = discover_files(dir.path(), &image_extensions());

        assert!(found.errors.is_empty());
        assert_eq!(
            found.files,
            vec![
                dir.path().join("photo1.JPG"),
                dir.path().join("photo2.png"),
                dir.path().join("subdir/photo3.jpeg"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_reported() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("gone");

        let found = discover_files(&gone, &image_extensions());
        assert!(found.files.is_empty());
        assert_eq!(found.errors.len(), 1);
        assert_eq!(found.errors[0].path(), Some(gone.as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdir_is_reported_with_the_rest_found() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        File::create(dir.path().join("ok.png")).unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        File::create(locked.join("hidden.png")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores directory permissions; nothing to observe then.
        let readable = fs::read_dir(&locked).is_ok();
        let found = discover_files(dir.path(), &image_extensions());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(found.files.contains(&dir.path().join("ok.png")));
        if !readable {
            assert_eq!(found.errors.len(), 1);
            assert!(!found.files.contains(&locked.join("hidden.png")));
        }
    }
}
