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
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::{info, warn};

use crate::{
    clip::Clip,
    store::{Storage, StorageError},
};

/// The logical record holding every pad assignment.
pub const SAVED_FILES_KEY: &str = "savedFiles";

#[derive(Debug, thiserror::Error)]
pub enum PadError {
    #[error("pad index {index} out of bounds (grid capacity {capacity})")]
    OutOfBounds { index: usize, capacity: usize },
    /// Non-fatal: the in-memory state was mutated and stays authoritative
    /// for the session, but it will not survive a reload.
    #[error("pad state was not persisted: {0}")]
    Persist(#[from] StorageError),
}

/// Durable mapping of pad index to clip. Every mutation persists the full
/// mapping, so the persisted payload grows with the total number of
/// assigned clips; that round trip is deliberate and keeps the record a
/// single JSON object.
pub struct PadStore {
    storage: Arc<dyn Storage>,
    capacity: usize,
    pads: Mutex<HashMap<usize, Arc<Clip>>>,
}

impl PadStore {
    /// Creates the store, restoring any persisted assignments. Corrupt or
    /// missing persisted data yields an empty grid, never an error.
    pub fn new(storage: Arc<dyn Storage>, capacity: usize) -> PadStore {
        let pads = PadStore::restore(storage.as_ref(), capacity);
        if !pads.is_empty() {
            info!(assigned = pads.len(), "Restored pad assignments.");
        }

        PadStore {
            storage,
            capacity,
            pads: Mutex::new(pads),
        }
    }

    fn restore(storage: &dyn Storage, capacity: usize) -> HashMap<usize, Arc<Clip>> {
        let raw = match storage.read(SAVED_FILES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashMap::new(),
            Err(e) => {
                warn!(err = %e, "Unable to read pad assignments, starting empty.");
                return HashMap::new();
            }
        };

        let parsed: HashMap<String, Clip> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(err = %e, "Persisted pad assignments are corrupt, starting empty.");
                return HashMap::new();
            }
        };

        parsed
            .into_iter()
            .filter_map(|(key, clip)| match key.parse::<usize>() {
                Ok(index) if index < capacity => Some((index, Arc::new(clip))),
                _ => {
                    warn!(key, "Dropping pad entry with unusable index.");
                    None
                }
            })
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Assigns a clip to a pad, overwriting any prior entry, and persists
    /// the full mapping. A persistence failure is reported but does not
    /// roll back the in-memory assignment.
    pub fn assign(&self, index: usize, clip: Clip) -> Result<(), PadError> {
        if index >= self.capacity {
            return Err(PadError::OutOfBounds {
                index,
                capacity: self.capacity,
            });
        }

        let mut pads = self.pads.lock().expect("unable to get pads lock");
        pads.insert(index, Arc::new(clip));
        self.persist(&pads)?;
        Ok(())
    }

    /// Returns the clip assigned to a pad, or None.
    pub fn get(&self, index: usize) -> Option<Arc<Clip>> {
        let pads = self.pads.lock().expect("unable to get pads lock");
        pads.get(&index).cloned()
    }

    /// Removes every assignment and the persisted record.
    pub fn clear_all(&self) -> Result<(), PadError> {
        let mut pads = self.pads.lock().expect("unable to get pads lock");
        pads.clear();
        self.storage.remove(SAVED_FILES_KEY)?;
        Ok(())
    }

    /// Every assignment, ordered by pad index.
    pub fn assigned(&self) -> Vec<(usize, Arc<Clip>)> {
        let pads = self.pads.lock().expect("unable to get pads lock");
        let mut assigned: Vec<(usize, Arc<Clip>)> =
            pads.iter().map(|(index, clip)| (*index, clip.clone())).collect();
        assigned.sort_by_key(|(index, _)| *index);
        assigned
    }

    fn persist(&self, pads: &HashMap<usize, Arc<Clip>>) -> Result<(), StorageError> {
        let record: HashMap<String, &Clip> = pads
            .iter()
            .map(|(index, clip)| (index.to_string(), clip.as_ref()))
            .collect();
        let raw = serde_json::to_string(&record)
            .map_err(|e| StorageError::WriteRejected(e.to_string()))?;
        self.storage.write(SAVED_FILES_KEY, &raw)
    }
}

#[cfg(test)]
mod test {
    use crate::store::{memory, Storage as _};

    use super::*;

    fn clip(name: &str, payload: &[u8]) -> Clip {
        Clip::from_bytes(name, "audio/wav", payload).expect("failed to build clip")
    }

    #[test]
    fn test_assign_get_overwrite() -> Result<(), PadError> {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let pads = PadStore::new(storage, 16);

        assert!(pads.get(5).is_none());
        pads.assign(5, clip("snare.wav", b"x"))?;
        assert_eq!(pads.get(5).expect("pad empty").name, "snare.wav");

        // Overwrite replaces, never accumulates.
        pads.assign(5, clip("snare2.wav", b"y"))?;
        let current = pads.get(5).expect("pad empty");
        assert_eq!(current.name, "snare2.wav");
        assert_eq!(current.bytes().expect("bad payload"), b"y");
        assert_eq!(pads.assigned().len(), 1);
        Ok(())
    }

    #[test]
    fn test_out_of_bounds() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let pads = PadStore::new(storage, 16);
        assert!(matches!(
            pads.assign(16, clip("late.wav", b"")),
            Err(PadError::OutOfBounds { index: 16, capacity: 16 })
        ));
    }

    #[test]
    fn test_persists_one_entry_per_index() -> Result<(), PadError> {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let pads = PadStore::new(storage.clone(), 16);

        pads.assign(3, clip("kick.wav", b"boom"))?;
        pads.assign(3, clip("kick.wav", b"boom"))?;

        let raw = storage
            .read(SAVED_FILES_KEY)
            .expect("read failed")
            .expect("nothing persisted");
        let record: std::collections::HashMap<String, Clip> =
            serde_json::from_str(&raw).expect("corrupt record");
        assert_eq!(record.len(), 1);
        assert_eq!(record["3"].name, "kick.wav");
        Ok(())
    }

    #[test]
    fn test_reload_round_trip() -> Result<(), PadError> {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        {
            let pads = PadStore::new(storage.clone(), 16);
            pads.assign(0, clip("Kick.wav", b"boom"))?;
            pads.assign(7, clip("Clap.wav", b"clap"))?;
        }

        // Simulates a reload: a fresh store over the same storage.
        let pads = PadStore::new(storage, 16);
        let restored = pads.get(0).expect("pad 0 lost");
        assert_eq!(restored.name, "Kick.wav");
        assert_eq!(restored.bytes().expect("bad payload"), b"boom");
        assert_eq!(pads.assigned().len(), 2);
        Ok(())
    }

    #[test]
    fn test_corrupt_record_treated_as_absent() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        storage
            .write(SAVED_FILES_KEY, "{ this is not json")
            .expect("write failed");

        let pads = PadStore::new(storage, 16);
        assert!(pads.assigned().is_empty());
    }

    #[test]
    fn test_out_of_range_entries_dropped_on_restore() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        storage
            .write(
                SAVED_FILES_KEY,
                r#"{"2":{"url":"data:audio/wav;base64,","name":"ok.wav"},
                    "99":{"url":"data:audio/wav;base64,","name":"gone.wav"},
                    "nope":{"url":"data:audio/wav;base64,","name":"gone.wav"}}"#,
            )
            .expect("write failed");

        let pads = PadStore::new(storage, 16);
        assert_eq!(pads.assigned().len(), 1);
        assert!(pads.get(2).is_some());
    }

    #[test]
    fn test_persist_failure_keeps_memory_authoritative() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let pads = PadStore::new(storage.clone(), 16);

        storage.fail_writes(true);
        let result = pads.assign(1, clip("risky.wav", b"r"));
        assert!(matches!(result, Err(PadError::Persist(_))));
        // The session still sees the assignment.
        assert_eq!(pads.get(1).expect("pad empty").name, "risky.wav");
    }

    #[test]
    fn test_clear_all() -> Result<(), PadError> {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let pads = PadStore::new(storage.clone(), 16);
        pads.assign(0, clip("a.wav", b"a"))?;
        pads.assign(1, clip("b.wav", b"b"))?;

        pads.clear_all()?;
        assert!(pads.assigned().is_empty());
        assert_eq!(storage.read(SAVED_FILES_KEY).expect("read failed"), None);
        Ok(())
    }
}
