// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Section-based loading of `tiger-rs.toml`.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "tiger-rs.toml";
const CONFIG_DIR_NAME: &str = "tiger-rs";

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Candidate files in lookup order: CWD, user config dir, /etc.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    paths.push(Path::new("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    paths
}

/// Deserialize the `[key]` table of a TOML file.
///
/// `Ok(None)` means the file parsed but has no such section.
fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigFileError> {
    let parse_err =
        |e: &dyn std::fmt::Display| ConfigFileError::ParseError(path.to_path_buf(), e.to_string());

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigFileError::ReadError(path.to_path_buf(), e.to_string()))?;
    let mut table: toml::Table = toml::from_str(&content).map_err(|e| parse_err(&e))?;
    let Some(section) = table.remove(key) else {
        return Ok(None);
    };
    // going through Value keeps #[serde(default)] on missing fields
    section.try_into::<T>().map(Some).map_err(|e| parse_err(&e))
}

/// A config struct stored as one section of `tiger-rs.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    fn section_key() -> &'static str;

    /// Load from `path`; a file without the section is an error.
    fn load_from_file(path: &Path) -> Result<Self, ConfigFileError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigFileError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// First search path holding the section, or defaults when none does.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigFileError> {
        for path in config_search_paths() {
            if !path.exists() {
                continue;
            }
            if let Some(cfg) = load_section_from_file::<Self>(&path, Self::section_key())? {
                return Ok((cfg, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    /// `--config` wins over the search paths.
    fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigFileError> {
        match explicit {
            Some(path) => Ok((Self::load_from_file(path)?, Some(path.to_path_buf()))),
            None => Self::load_from_default_paths(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Probe {
        port: String,
        baud: u32,
    }

    impl Default for Probe {
        fn default() -> Self {
            Self {
                port: "/dev/ttyUSB0".to_string(),
                baud: 115200,
            }
        }
    }

    impl ConfigFile for Probe {
        fn section_key() -> &'static str {
            "probe"
        }
    }

    fn file_with(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_section_defaults_fill_missing_fields() {
        let file = file_with("[probe]\nbaud = 9600\n");
        let cfg = Probe::load_from_file(file.path()).unwrap();
        assert_eq!(cfg.baud, 9600);
        assert_eq!(cfg.port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_missing_section() {
        let file = file_with("[other]\nbaud = 9600\n");
        let err = Probe::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigFileError::ParseError(_, ref msg) if msg.contains("[probe]")));
    }

    #[test]
    fn test_bad_toml_and_missing_file() {
        let file = file_with("[probe\n");
        assert!(matches!(
            Probe::load_from_file(file.path()),
            Err(ConfigFileError::ParseError(..))
        ));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(CONFIG_FILE_NAME);
        assert!(matches!(
            Probe::load_from_file(&missing),
            Err(ConfigFileError::ReadError(..))
        ));
    }

    #[test]
    fn test_explicit_path_wins() {
        let file = file_with("[probe]\nport = \"/dev/ttyACM1\"\n");
        let (cfg, path) = Probe::load(Some(file.path())).unwrap();
        assert_eq!(cfg.port, "/dev/ttyACM1");
        assert_eq!(path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_search_paths_order() {
        let paths = config_search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from(CONFIG_FILE_NAME)));
        assert_eq!(
            paths.last(),
            Some(&PathBuf::from("/etc/tiger-rs/tiger-rs.toml"))
        );
    }
}
