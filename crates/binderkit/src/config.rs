//! # Configuration
//!
//! Binderkit configuration is loaded with [`confique`] from a `binderkit.toml`
//! file plus `BINDERKIT_*` environment variables.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `BINDERKIT_UTC_OFFSET_MINUTES`, `BINDERKIT_READ_ONLY`, ...
//! 2. **Config file**: `binderkit.toml` in the directory passed to [`BinderkitConfig::load`],
//!    usually [`BinderkitConfig::default_dir`] (via the `directories` crate).
//! 3. **Compiled defaults**: built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `utc_offset_minutes` | `540` | Zone for naive dates and for presenting decoded dates |
//! | `read_only` | `false` | Open containers read-only |
//! | `authenticate` | `true` | Let the engine prompt for protected containers |
//! | `log_level` | `info` | Level passed to [`crate::logging::init_logging`] |

use chrono::FixedOffset;
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::OpenMode;
use crate::error::{BinderError, Result};

/// Configuration for binderkit, stored in `binderkit.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BinderkitConfig {
    /// Offset from UTC in minutes. The default is the containers' home zone (UTC+9).
    #[config(default = 540, env = "BINDERKIT_UTC_OFFSET_MINUTES")]
    pub utc_offset_minutes: i32,

    /// Open every container read-only.
    #[config(default = false, env = "BINDERKIT_READ_ONLY")]
    pub read_only: bool,

    /// Allow the engine to authenticate protected containers on open.
    #[config(default = true, env = "BINDERKIT_AUTHENTICATE")]
    pub authenticate: bool,

    /// trace | debug | info | warn | error
    #[config(default = "info", env = "BINDERKIT_LOG_LEVEL")]
    pub log_level: String,
}

impl Default for BinderkitConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 540,
            read_only: false,
            authenticate: true,
            log_level: "info".to_string(),
        }
    }
}

impl BinderkitConfig {
    pub const FILE_NAME: &'static str = "binderkit.toml";

    /// Loads from the environment and `dir/binderkit.toml`. A missing file
    /// leaves the defaults in place.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self::builder().env().file(dir.join(Self::FILE_NAME)).load()?)
    }

    /// OS-appropriate config directory, if one can be determined.
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "binderkit", "binderkit")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn time_zone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            BinderError::InvalidValue(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn open_mode(&self) -> OpenMode {
        OpenMode {
            read_only: self.read_only,
            authenticate: self.authenticate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BinderkitConfig::default();
        assert_eq!(config.utc_offset_minutes, 540);
        assert!(!config.read_only);
        assert!(config.authenticate);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.open_mode(), OpenMode::default());
    }

    #[test]
    fn test_time_zone_from_offset() {
        let config = BinderkitConfig::default();
        assert_eq!(config.time_zone().unwrap().local_minus_utc(), 9 * 3600);

        let utc = BinderkitConfig {
            utc_offset_minutes: 0,
            ..Default::default()
        };
        assert_eq!(utc.time_zone().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_time_zone_out_of_range() {
        let config = BinderkitConfig {
            utc_offset_minutes: 24 * 60,
            ..Default::default()
        };
        assert!(matches!(
            config.time_zone(),
            Err(BinderError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_open_mode_follows_flags() {
        let config = BinderkitConfig {
            read_only: true,
            authenticate: false,
            ..Default::default()
        };
        let mode = config.open_mode();
        assert!(mode.read_only);
        assert!(!mode.authenticate);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let written = BinderkitConfig {
            utc_offset_minutes: -300,
            read_only: true,
            ..Default::default()
        };
        std::fs::write(
            dir.path().join(BinderkitConfig::FILE_NAME),
            toml::to_string(&written).unwrap(),
        )
        .unwrap();

        let loaded = BinderkitConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.utc_offset_minutes, -300);
        assert!(loaded.read_only);
        assert!(loaded.authenticate);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = BinderkitConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.utc_offset_minutes, 540);
    }
}
