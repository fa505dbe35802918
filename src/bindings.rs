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
    ops::Range,
    sync::{Arc, Mutex},
};

use tracing::{info, warn};

use crate::{
    store::{Storage, StorageError},
    trigger::Trigger,
};

/// The logical record holding every trigger binding.
pub const KEY_BINDINGS_KEY: &str = "keyBindings";

/// Default bindings map pad *i* to MIDI note *i + 40*, so a pad
/// controller works against a fresh grid without manual binding.
pub const DEFAULT_SEED_BASE: u8 = 40;

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("pad index {index} out of bounds (grid capacity {capacity})")]
    OutOfBounds { index: usize, capacity: usize },
    #[error("{0:?} is reserved for the exclusivity toggle and cannot be bound")]
    Reserved(String),
    /// Non-fatal: the in-memory binding stays authoritative for the
    /// session even when it could not be persisted.
    #[error("bindings were not persisted: {0}")]
    Persist(#[from] StorageError),
}

/// Durable mapping of pad index to trigger. At most one binding per
/// index; two indices may still share a trigger value (e.g. restored from
/// older persisted state), in which case resolution is deterministic:
/// the lowest index inside the visible window wins.
pub struct BindingStore {
    storage: Arc<dyn Storage>,
    capacity: usize,
    bindings: Mutex<HashMap<usize, Trigger>>,
}

impl BindingStore {
    /// Creates the store, restoring persisted bindings. When nothing is
    /// persisted and seeding is requested, a deterministic default MIDI
    /// mapping is installed in memory; it is only persisted once the user
    /// rebinds something.
    pub fn new(storage: Arc<dyn Storage>, capacity: usize, seed_defaults: bool) -> BindingStore {
        let mut bindings = BindingStore::restore(storage.as_ref(), capacity);
        if bindings.is_empty() && seed_defaults {
            bindings = BindingStore::seed(capacity);
            info!(seeded = bindings.len(), "Seeded default MIDI bindings.");
        }

        BindingStore {
            storage,
            capacity,
            bindings: Mutex::new(bindings),
        }
    }

    fn restore(storage: &dyn Storage, capacity: usize) -> HashMap<usize, Trigger> {
        let raw = match storage.read(KEY_BINDINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashMap::new(),
            Err(e) => {
                warn!(err = %e, "Unable to read bindings, starting empty.");
                return HashMap::new();
            }
        };

        let parsed: HashMap<String, String> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(err = %e, "Persisted bindings are corrupt, starting empty.");
                return HashMap::new();
            }
        };

        parsed
            .into_iter()
            .filter_map(|(key, value)| match key.parse::<usize>() {
                Ok(index) if index < capacity => Some((index, Trigger::parse(&value))),
                _ => {
                    warn!(key, "Dropping binding with unusable index.");
                    None
                }
            })
            .collect()
    }

    fn seed(capacity: usize) -> HashMap<usize, Trigger> {
        (0..capacity)
            .filter_map(|index| {
                let note = DEFAULT_SEED_BASE as usize + index;
                if note <= 127 {
                    Some((index, Trigger::Midi(note as u8)))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Binds a trigger to a pad, overwriting any prior binding for that
    /// pad, and persists the full mapping.
    pub fn bind(&self, index: usize, trigger: Trigger) -> Result<(), BindingError> {
        if index >= self.capacity {
            return Err(BindingError::OutOfBounds {
                index,
                capacity: self.capacity,
            });
        }
        if trigger.is_reserved() {
            return Err(BindingError::Reserved(trigger.label()));
        }

        let mut bindings = self.bindings.lock().expect("unable to get bindings lock");
        bindings.insert(index, trigger);
        self.persist(&bindings)?;
        Ok(())
    }

    /// Reverse lookup restricted to the visible page window. On duplicate
    /// bindings the lowest index in the window wins.
    pub fn resolve(&self, trigger: &Trigger, window: Range<usize>) -> Option<usize> {
        let bindings = self.bindings.lock().expect("unable to get bindings lock");
        window.into_iter().find(|index| bindings.get(index) == Some(trigger))
    }

    /// Returns the trigger bound to a pad, or None.
    pub fn get(&self, index: usize) -> Option<Trigger> {
        let bindings = self.bindings.lock().expect("unable to get bindings lock");
        bindings.get(&index).cloned()
    }

    /// Every binding, ordered by pad index.
    pub fn bound(&self) -> Vec<(usize, Trigger)> {
        let bindings = self.bindings.lock().expect("unable to get bindings lock");
        let mut bound: Vec<(usize, Trigger)> = bindings
            .iter()
            .map(|(index, trigger)| (*index, trigger.clone()))
            .collect();
        bound.sort_by_key(|(index, _)| *index);
        bound
    }

    fn persist(&self, bindings: &HashMap<usize, Trigger>) -> Result<(), StorageError> {
        let record: HashMap<String, String> = bindings
            .iter()
            .map(|(index, trigger)| (index.to_string(), trigger.label()))
            .collect();
        let raw = serde_json::to_string(&record)
            .map_err(|e| StorageError::WriteRejected(e.to_string()))?;
        self.storage.write(KEY_BINDINGS_KEY, &raw)
    }
}

#[cfg(test)]
mod test {
    use crate::store::{memory, Storage as _};

    use super::*;

    #[test]
    fn test_bind_and_resolve() -> Result<(), BindingError> {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let bindings = BindingStore::new(storage, 64, false);

        bindings.bind(3, Trigger::keyboard("Q"))?;
        // Keydown normalization makes resolution case-insensitive.
        assert_eq!(bindings.resolve(&Trigger::keyboard("q"), 0..16), Some(3));
        assert_eq!(bindings.resolve(&Trigger::keyboard("W"), 0..16), None);
        Ok(())
    }

    #[test]
    fn test_rebind_overwrites() -> Result<(), BindingError> {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let bindings = BindingStore::new(storage, 64, false);

        bindings.bind(3, Trigger::keyboard("Q"))?;
        bindings.bind(3, Trigger::midi(36))?;
        assert_eq!(bindings.get(3), Some(Trigger::Midi(36)));
        assert_eq!(bindings.resolve(&Trigger::keyboard("Q"), 0..16), None);
        Ok(())
    }

    #[test]
    fn test_window_restriction() -> Result<(), BindingError> {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let bindings = BindingStore::new(storage, 64, false);

        bindings.bind(20, Trigger::keyboard("Q"))?;
        assert_eq!(bindings.resolve(&Trigger::keyboard("Q"), 0..16), None);
        assert_eq!(bindings.resolve(&Trigger::keyboard("Q"), 16..32), Some(20));
        Ok(())
    }

    #[test]
    fn test_duplicate_trigger_lowest_index_wins() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        // Older persisted state may carry duplicates; they cannot be
        // produced through bind() on a single index but are legal here.
        storage
            .write(KEY_BINDINGS_KEY, r#"{"7":"Q","3":"Q","12":"Q"}"#)
            .expect("write failed");

        let bindings = BindingStore::new(storage, 64, false);
        assert_eq!(bindings.resolve(&Trigger::keyboard("Q"), 0..16), Some(3));
        assert_eq!(bindings.resolve(&Trigger::keyboard("Q"), 4..16), Some(7));
    }

    #[test]
    fn test_reserved_key_rejected() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let bindings = BindingStore::new(storage, 64, false);
        assert!(matches!(
            bindings.bind(0, Trigger::keyboard("end")),
            Err(BindingError::Reserved(_))
        ));
        assert_eq!(bindings.get(0), None);
    }

    #[test]
    fn test_out_of_bounds() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let bindings = BindingStore::new(storage, 16, false);
        assert!(matches!(
            bindings.bind(16, Trigger::midi(36)),
            Err(BindingError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_default_seed() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let bindings = BindingStore::new(storage.clone(), 64, true);

        assert_eq!(bindings.resolve(&Trigger::Midi(40), 0..16), Some(0));
        assert_eq!(bindings.resolve(&Trigger::Midi(55), 0..16), Some(15));
        // Note 56 belongs to pad 16, which sits on the second page.
        assert_eq!(bindings.resolve(&Trigger::Midi(56), 0..16), None);
        assert_eq!(bindings.resolve(&Trigger::Midi(56), 16..32), Some(16));

        // The seed is in-memory only.
        assert_eq!(storage.read(KEY_BINDINGS_KEY).expect("read failed"), None);
    }

    #[test]
    fn test_seed_skipped_when_state_persisted() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        storage
            .write(KEY_BINDINGS_KEY, r#"{"0":"Q"}"#)
            .expect("write failed");

        let bindings = BindingStore::new(storage, 64, true);
        assert_eq!(bindings.get(0), Some(Trigger::keyboard("Q")));
        assert_eq!(bindings.get(1), None);
    }

    #[test]
    fn test_reload_round_trip() -> Result<(), BindingError> {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        {
            let bindings = BindingStore::new(storage.clone(), 64, false);
            bindings.bind(0, Trigger::keyboard("A"))?;
            bindings.bind(1, Trigger::midi(36))?;
        }

        let bindings = BindingStore::new(storage, 64, false);
        assert_eq!(bindings.get(0), Some(Trigger::keyboard("A")));
        assert_eq!(bindings.get(1), Some(Trigger::Midi(36)));
        Ok(())
    }

    #[test]
    fn test_corrupt_record_treated_as_absent() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        storage
            .write(KEY_BINDINGS_KEY, "not json at all")
            .expect("write failed");

        let bindings = BindingStore::new(storage, 64, false);
        assert!(bindings.bound().is_empty());
    }

    #[test]
    fn test_persist_failure_keeps_memory_authoritative() {
        let storage = Arc::new(memory::Storage::new("mock-storage"));
        let bindings = BindingStore::new(storage.clone(), 64, false);

        storage.fail_writes(true);
        assert!(matches!(
            bindings.bind(2, Trigger::keyboard("Z")),
            Err(BindingError::Persist(_))
        ));
        assert_eq!(bindings.get(2), Some(Trigger::keyboard("Z")));
    }
}
