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
use std::fmt;

use crate::store::{Storage, StorageError};

/// Soft ceiling for the persisted state. Advisory only: writes are never
/// rejected on its account.
pub const DEFAULT_CEILING_MB: f64 = 5.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A snapshot of storage consumption, recomputed after every pad
/// mutation for display purposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Usage {
    pub megabytes: f64,
    pub ceiling_megabytes: f64,
}

impl Usage {
    /// True within 10% of the ceiling.
    pub fn near_quota(&self) -> bool {
        self.megabytes >= self.ceiling_megabytes * 0.9
    }

    pub fn at_quota(&self) -> bool {
        self.megabytes >= self.ceiling_megabytes
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} MB / {} MB", self.megabytes, self.ceiling_megabytes)
    }
}

/// Sums the stored size of every persisted key in megabytes. Each
/// character is counted as two bytes, matching the encoding overhead of
/// the persistence layer this store was modeled on.
pub fn measure(storage: &dyn Storage) -> Result<f64, StorageError> {
    let mut total_bytes: usize = 0;
    for key in storage.keys()? {
        if let Some(value) = storage.read(&key)? {
            total_bytes += value.chars().count() * 2;
        }
    }
    Ok(total_bytes as f64 / BYTES_PER_MB)
}

/// Measures usage against a ceiling.
pub fn report(storage: &dyn Storage, ceiling_megabytes: f64) -> Result<Usage, StorageError> {
    Ok(Usage {
        megabytes: measure(storage)?,
        ceiling_megabytes,
    })
}
