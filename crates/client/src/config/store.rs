//! File-backed key-value config store
//!
//! The CLI layer persists small pieces of state (most importantly the API
//! credential) as a flat JSON object. This module only reads and writes
//! that file; deciding *which* credential wins is the resolver's job.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use super::ConfigError;

/// File name of the persisted store, under the application config directory.
const STORE_FILE: &str = "config.json";

/// Directory name under the platform config root.
const APP_DIR: &str = "tasklane";

/// Flat JSON key-value store
///
/// Values are kept as raw JSON; [`ConfigStore::get`] exposes the
/// string view the pipeline needs. A missing file is an empty store, not
/// an error; only unreadable or malformed content fails.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl ConfigStore {
    /// Open the store at an explicit path
    ///
    /// # Errors
    /// Returns [`ConfigError::Store`] when the file exists but cannot be
    /// read or does not contain a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("Config store not found at {}, starting empty", path.display());
                return Ok(Self { path, values: Map::new() });
            }
            Err(err) => {
                return Err(ConfigError::Store {
                    path: path.display().to_string(),
                    message: err.to_string(),
                })
            }
        };

        let parsed: Value = serde_json::from_str(&contents).map_err(|err| ConfigError::Store {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

        match parsed {
            Value::Object(values) => Ok(Self { path, values }),
            other => Err(ConfigError::Store {
                path: path.display().to_string(),
                message: format!("expected a JSON object, found {other}"),
            }),
        }
    }

    /// Open the store at the platform default location
    /// (`<config_dir>/tasklane/config.json`)
    ///
    /// # Errors
    /// Returns [`ConfigError::Store`] when the platform config directory
    /// cannot be determined, or when the file is unreadable/malformed.
    pub fn open_default() -> Result<Self, ConfigError> {
        let base = dirs::config_dir().ok_or_else(|| ConfigError::Store {
            path: STORE_FILE.to_string(),
            message: "could not determine the platform config directory".to_string(),
        })?;
        Self::open(base.join(APP_DIR).join(STORE_FILE))
    }

    /// Read a string value; empty strings count as absent
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    }

    /// Insert or replace a string value (in memory; call [`Self::save`])
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), Value::String(value.into()));
    }

    /// Remove a value (in memory; call [`Self::save`])
    pub fn unset(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Write the store back to its file, creating parent directories
    ///
    /// # Errors
    /// Returns [`ConfigError::Store`] on any I/O failure.
    pub fn save(&self) -> Result<(), ConfigError> {
        let to_store_err = |message: String| ConfigError::Store {
            path: self.path.display().to_string(),
            message,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| to_store_err(err.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(&Value::Object(self.values.clone()))
            .map_err(|err| to_store_err(err.to_string()))?;
        fs::write(&self.path, contents).map_err(|err| to_store_err(err.to_string()))
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
