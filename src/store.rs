// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, path::Path, sync::Arc};

pub mod disk;
pub mod memory;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage write rejected: {0}")]
    WriteRejected(String),
}

/// The key-value collaborator that holds the persisted state. Writes are
/// last-writer-wins per key; there is no transactional grouping across
/// keys, so a crash between two related writes can leave them
/// inconsistent. That race is accepted and documented rather than solved.
pub trait Storage: fmt::Display + Send + Sync {
    /// Reads the value under a key, or None if it was never written.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any prior value under the key.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a key and its value.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every persisted key.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Gets the storage backing for the given state directory. A `mock`
/// prefix yields an in-memory store that does not survive the process.
pub fn get_storage(state_dir: &str) -> Result<Arc<dyn Storage>, StorageError> {
    if state_dir.starts_with("mock") {
        return Ok(Arc::new(memory::Storage::new(state_dir)));
    }

    Ok(Arc::new(disk::Storage::open(Path::new(state_dir))?))
}
