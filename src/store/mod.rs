//! Persistent key-value storage for client-side state
//!
//! The recommendation cache never assumes a storage technology; it is handed
//! something implementing [`KeyValueStore`]. Two implementations are
//! provided: [`MemoryStore`] for tests and short-lived sessions, and
//! [`FileStore`], which keeps one file per key in the platform data
//! directory.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors that can occur when writing to a store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the underlying medium failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded for storage
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String-keyed persistent storage
///
/// Implementations must make each `set` atomic for its key: a concurrent
/// `get` sees either the old value or the new one.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
