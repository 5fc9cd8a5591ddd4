//! File-backed key-value store
//!
//! Each key is kept in its own file under a data directory
//! (`~/.local/share/readinglist/` on Linux). Every write goes to its own
//! uniquely named temporary file that is renamed over the target, so readers
//! never see a half-written value, even with several writers on one key.

use directories::ProjectDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{KeyValueStore, StoreError};

/// Stores each key as a file in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where values are stored
    dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore in the platform data directory
    ///
    /// Returns `None` if the directory cannot be determined (e.g., no home
    /// directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "readinglist")?;
        Some(Self::with_dir(project_dirs.data_dir().to_path_buf()))
    }

    /// Creates a FileStore rooted at a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory values are stored in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the file holding `key`
    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.value", escape_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let mut staging = NamedTempFile::new_in(&self.dir)?;
        staging.write_all(value.as_bytes())?;
        staging.persist(self.path(key)).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Maps an arbitrary key to a safe file name
///
/// ASCII letters, digits, `-` and `_` pass through; every other byte is
/// written as `%XX`.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}
