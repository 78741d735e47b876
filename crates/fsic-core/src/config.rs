//! On-disk locations used by every operation.

use crate::error::{FsicError, Result};
use crate::paths::{
    absolutize, CONFIG_FILE_NAME, DATABASE_FILE_NAME, LOG_FILE_NAME, PASSWORD_FILE_NAME,
    SELF_TEST_FILE_NAME,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Absolute locations of every file the checker reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsicConfig {
    pub config_file: PathBuf,
    pub database_file: PathBuf,
    pub password_file: PathBuf,
    pub self_test_file: PathBuf,
    pub log_file: PathBuf,
    /// Executable covered by the self-test; the running binary when unset.
    pub binary_file: Option<PathBuf>,
}

/// Per-location overrides read from a JSON settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsOverrides {
    pub config_file: Option<PathBuf>,
    pub database_file: Option<PathBuf>,
    pub password_file: Option<PathBuf>,
    pub self_test_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub binary_file: Option<PathBuf>,
}

impl FsicConfig {
    /// Default file names inside `dir`, made absolute.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| FsicError::file(".", e))?;
        let dir = absolutize(&cwd, dir);
        Ok(Self {
            config_file: dir.join(CONFIG_FILE_NAME),
            database_file: dir.join(DATABASE_FILE_NAME),
            password_file: dir.join(PASSWORD_FILE_NAME),
            self_test_file: dir.join(SELF_TEST_FILE_NAME),
            log_file: dir.join(LOG_FILE_NAME),
            binary_file: None,
        })
    }

    pub fn from_current_dir() -> Result<Self> {
        Self::in_dir(".")
    }

    /// Apply overrides from the JSON settings file at `path`.
    ///
    /// Relative overrides resolve against the settings file's directory.
    pub fn load_settings(mut self, path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| FsicError::file(path, e))?;
        let overrides: SettingsOverrides = serde_json::from_str(&text).map_err(|e| {
            FsicError::file(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        let base = match path.parent() {
            Some(parent) if parent.is_absolute() => parent.to_path_buf(),
            parent => {
                let cwd = std::env::current_dir().map_err(|e| FsicError::file(".", e))?;
                absolutize(&cwd, parent.unwrap_or(Path::new("")))
            }
        };
        self.apply(&base, overrides);
        Ok(self)
    }

    fn apply(&mut self, base: &Path, overrides: SettingsOverrides) {
        let resolve = |p: PathBuf| absolutize(base, p);
        if let Some(p) = overrides.config_file {
            self.config_file = resolve(p);
        }
        if let Some(p) = overrides.database_file {
            self.database_file = resolve(p);
        }
        if let Some(p) = overrides.password_file {
            self.password_file = resolve(p);
        }
        if let Some(p) = overrides.self_test_file {
            self.self_test_file = resolve(p);
        }
        if let Some(p) = overrides.log_file {
            self.log_file = resolve(p);
        }
        if let Some(p) = overrides.binary_file {
            self.binary_file = Some(resolve(p));
        }
    }

    pub fn binary_path(&self) -> Result<PathBuf> {
        match &self.binary_file {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().map_err(|e| FsicError::file("<current executable>", e)),
        }
    }
}
