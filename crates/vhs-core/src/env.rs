//! Layered environment lookup
//!
//! Values are looked up in the process environment first, then in `.env` and `.env.local`
//! files from each search directory, in order. The process environment is never modified,
//! so the same lookup can be reproduced in tests from plain key/value pairs.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Variable holding extra directories to search for `.env` files
pub const ENV_DIRS_VAR: &str = "VHS_ENV_DIRS";

const ENV_FILE_NAMES: [&str; 2] = [".env", ".env.local"];

#[derive(Debug, Clone)]
struct EnvLayer {
    source: String,
    values: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct EnvLayers {
    layers: Vec<EnvLayer>,
}

impl EnvLayers {
    /// An empty lookup. Every key resolves to `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Only the process environment
    pub fn process() -> Self {
        let values = env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        EnvLayers {
            layers: vec![EnvLayer {
                source: "process".to_string(),
                values,
            }],
        }
    }

    /// A single layer built from key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut layers = Self::empty();
        layers.push_layer("inline", pairs);
        layers
    }

    /// Process environment followed by `.env` files from the given directories
    pub fn discover(dirs: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut layers = Self::process();
        for dir in dirs {
            for name in ENV_FILE_NAMES {
                layers.push_file(&dir.join(name))?;
            }
        }
        Ok(layers)
    }

    /// Process environment followed by `.env` files from `VHS_ENV_DIRS`
    /// (a path list) or, when unset, the current directory.
    pub fn from_env_dirs() -> Result<Self, ConfigError> {
        let dirs: Vec<PathBuf> = match env::var_os(ENV_DIRS_VAR) {
            Some(raw) if !raw.is_empty() => env::split_paths(&raw).collect(),
            _ => env::current_dir().map(|d| vec![d]).unwrap_or_default(),
        };
        Self::discover(&dirs)
    }

    pub fn push_layer<K, V>(&mut self, source: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.layers.push(EnvLayer {
            source: source.into(),
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
    }

    /// Append the contents of a dotenv file. Returns `false` if the file does not exist.
    pub fn push_file(&mut self, path: &Path) -> Result<bool, ConfigError> {
        if !path.is_file() {
            return Ok(false);
        }

        let env_file_error = |message: String| ConfigError::EnvFile {
            path: path.to_path_buf(),
            message,
        };

        let iter = dotenvy::from_path_iter(path).map_err(|e| env_file_error(e.to_string()))?;
        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| env_file_error(e.to_string()))?;
            values.insert(key, value);
        }

        tracing::debug!(path = %path.display(), variables = values.len(), "Loaded env file");

        self.layers.push(EnvLayer {
            source: path.display().to_string(),
            values,
        });
        Ok(true)
    }

    /// First non-empty value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.layers
            .iter()
            .filter_map(|layer| layer.values.get(key))
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }

    /// Source name of the layer that provides `key`
    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.layers
            .iter()
            .find(|layer| layer.values.get(key).is_some_and(|v| !v.is_empty()))
            .map(|layer| layer.source.as_str())
    }

    /// First non-empty value among `keys`, searched layer by layer.
    ///
    /// A layer providing any of the keys wins over every later layer; inside a layer the
    /// keys are tried in order. Returns the matching key with its value.
    pub fn first_of<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &str)> {
        self.layers.iter().find_map(|layer| {
            keys.iter().find_map(|key| {
                layer
                    .values
                    .get(*key)
                    .filter(|v| !v.is_empty())
                    .map(|v| (*key, v.as_str()))
            })
        })
    }
}
