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
use std::{error::Error, fmt, sync::Arc};

use crate::playsync::CancelHandle;

pub mod cpal;
pub mod decode;
pub mod mock;

pub use decode::LoadedClip;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("audio output error: {0}")]
    Output(String),
}

/// An audio output that can play one decoded clip per call. `play` blocks
/// until the clip finishes or the cancel handle is cancelled; a cancelled
/// clip is stopped outright, not paused.
pub trait Device: fmt::Display + Send + Sync {
    fn play(
        &self,
        pad: usize,
        clip: Arc<LoadedClip>,
        cancel_handle: CancelHandle,
    ) -> Result<(), PlaybackError>;
}

/// Lists the names of devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name. A `mock` prefix yields a device
/// that tracks playback without touching any hardware.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    }

    Ok(Arc::new(cpal::Device::get(name)?))
}

#[cfg(test)]
pub mod test {
    pub use super::mock::{Device, Outcome};
}
