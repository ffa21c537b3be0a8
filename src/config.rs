use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable naming the library root.
pub const LIBRARY_ENV: &str = "PICLIB";
/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PICLIB_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_library_path")]
    pub library: PathBuf,

    #[serde(default)]
    pub thumbnails: ThumbnailConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThumbnailConfig {
    /// Target width in pixels.
    #[serde(default = "default_thumb_width")]
    pub width: u32,

    /// Target height in pixels, 0 keeps the aspect ratio.
    #[serde(default)]
    pub height: u32,

    /// JPEG quality (1-100).
    #[serde(default = "default_thumb_quality")]
    pub quality: u8,
}

fn default_thumb_width() -> u32 {
    1000
}

fn default_thumb_quality() -> u8 {
    75
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: default_thumb_width(),
            height: 0,
            quality: default_thumb_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Extensions picked up when walking directories.
    #[serde(default = "default_image_extensions")]
    pub extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    [
        "jpg", "jpeg", "png", "gif", "webp", "tif", "tiff", "bmp", "heic", "heif", "cr2",
        "nef", "arw", "mp4", "mov", "avi",
    ]
    .iter()
    .map(|e| e.to_string())
    .collect()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Stderr,
    File,
    Journald,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub target: LogTarget,

    /// Directory for the `file` target.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// `$PICLIB`, falling back to `$HOME/.piclib`.
pub fn default_library_path() -> PathBuf {
    if let Ok(path) = std::env::var(LIBRARY_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".piclib")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: default_library_path(),
            thumbnails: ThumbnailConfig::default(),
            import: ImportConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("piclib")
    }

    /// Default directory for the `file` log target.
    pub fn log_dir(&self) -> PathBuf {
        self.log.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("piclib")
                .join("logs")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "library = \"/srv/pics\"\n\n[thumbnails]\nwidth = 320\n\n[log]\ntarget = \"journald\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.library, PathBuf::from("/srv/pics"));
        assert_eq!(config.thumbnails.width, 320);
        assert_eq!(config.thumbnails.height, 0);
        assert_eq!(config.thumbnails.quality, 75);
        assert_eq!(config.log.target, LogTarget::Journald);
        assert!(config.import.extensions.iter().any(|e| e == "jpg"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.library = PathBuf::from("/tmp/lib");
        let text = config.to_toml().unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.library, config.library);
        assert_eq!(back.thumbnails, config.thumbnails);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "thumbnails = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }
}
