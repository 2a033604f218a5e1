//! Store configuration.

use std::path::{Path, PathBuf};

use log::warn;

use crate::collection::CollectionName;

pub const ENV_STORE_PATH: &str = "CIVIC_STORE_PATH";
pub const ENV_MAP_SIZE_MB: &str = "CIVIC_STORE_MAP_SIZE_MB";

const DEFAULT_STORE_NAME: &str = "civic_store";
const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;

/// Where and how the LMDB environment is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Environment directory. Created on open if missing.
    pub path: PathBuf,
    /// Maximum size of the memory map in bytes.
    pub map_size: usize,
    /// Named database slots reserved in the environment.
    pub max_collections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::named(DEFAULT_STORE_NAME)
    }
}

impl StoreConfig {
    /// Uses the `<name>.lmdb` directory convention.
    pub fn named(name: &str) -> Self {
        Self::at(format!("{name}.lmdb"))
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            map_size: DEFAULT_MAP_SIZE,
            // collections + the meta database + headroom for stale names a
            // migration still has to find and drop
            max_collections: CollectionName::ALL.len() as u32 + 8,
        }
    }

    /// Defaults overridden by `CIVIC_STORE_PATH` and `CIVIC_STORE_MAP_SIZE_MB`.
    ///
    /// An unparsable map size is logged and ignored.
    pub fn from_env() -> Self {
        let mut config = match std::env::var(ENV_STORE_PATH) {
            Ok(path) if !path.trim().is_empty() => Self::at(path),
            _ => Self::default(),
        };

        if let Ok(raw) = std::env::var(ENV_MAP_SIZE_MB) {
            match raw.trim().parse::<usize>() {
                Ok(mb) if mb > 0 => config.map_size = mb * 1024 * 1024,
                _ => warn!("Ignoring invalid {ENV_MAP_SIZE_MB} value: {raw:?}"),
            }
        }

        config
    }

    pub fn with_map_size(mut self, bytes: usize) -> Self {
        self.map_size = bytes;
        self
    }
}
