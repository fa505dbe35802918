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
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use tracing::{info, warn};

use crate::{
    arbiter::{Arbiter, ArbiterError, PlaybackState},
    bindings::{BindingError, BindingStore},
    capacity::{self, Usage},
    clip::{self, Clip},
    pads::{PadError, PadStore},
    store::{Storage, StorageError},
    trigger::Trigger,
};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error(transparent)]
    Pad(#[from] PadError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Playback(#[from] ArbiterError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("unable to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file task failed: {0}")]
    Task(String),
    #[error("{0} does not look like an audio file")]
    UnsupportedFile(PathBuf),
}

/// What a renderer needs to draw one pad of the visible page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadView {
    pub index: usize,
    pub clip_name: Option<String>,
    pub trigger_label: Option<String>,
    pub is_playing: bool,
    pub armed: bool,
}

/// Ties the stores, the arbiter and paging together behind the
/// operations drivers dispatch. Only triggers bound to pads on the
/// visible page fire; everything else is addressed by absolute index.
pub struct Board {
    pads: Arc<PadStore>,
    bindings: Arc<BindingStore>,
    arbiter: Arc<Arbiter>,
    storage: Arc<dyn Storage>,
    page_size: usize,
    page: AtomicUsize,
    ceiling_megabytes: f64,
    // At most one pad is armed for rebind; the next trigger binds to it
    // instead of playing.
    armed: Mutex<Option<usize>>,
    // Per-pad upload generations. A slow file read that was superseded
    // by a newer one for the same pad must not assign.
    next_generation: AtomicU64,
    generations: Mutex<HashMap<usize, u64>>,
}

impl Board {
    pub fn new(
        pads: Arc<PadStore>,
        bindings: Arc<BindingStore>,
        arbiter: Arc<Arbiter>,
        storage: Arc<dyn Storage>,
        page_size: usize,
        ceiling_megabytes: f64,
    ) -> Board {
        Board {
            pads,
            bindings,
            arbiter,
            storage,
            page_size,
            page: AtomicUsize::new(0),
            ceiling_megabytes,
            armed: Mutex::new(None),
            next_generation: AtomicU64::new(0),
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// The absolute pad indices on the visible page.
    pub fn page_window(&self) -> Range<usize> {
        let start = self.page.load(Ordering::Relaxed) * self.page_size;
        let end = (start + self.page_size).min(self.pads.capacity());
        start..end
    }

    pub fn page_count(&self) -> usize {
        self.pads.capacity().div_ceil(self.page_size)
    }

    /// Switches the visible page. Out-of-range pages clamp to the last
    /// one. Live sessions keep sounding across page switches.
    pub fn change_page(&self, page: usize) {
        let page = page.min(self.page_count() - 1);
        self.page.store(page, Ordering::Relaxed);
        info!(page, "Switched page.");
    }

    /// Handles a key press. The reserved key flips exclusive playback
    /// before rebind capture or resolution ever sees it.
    pub async fn handle_key(&self, code: &str) -> Result<(), BoardError> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(());
        }
        self.handle_trigger(Trigger::keyboard(code)).await
    }

    /// Handles a MIDI note-on.
    pub async fn handle_midi_note(&self, note: u8) -> Result<(), BoardError> {
        self.handle_trigger(Trigger::midi(note)).await
    }

    async fn handle_trigger(&self, trigger: Trigger) -> Result<(), BoardError> {
        if trigger.is_reserved() {
            self.arbiter.toggle_exclusive();
            return Ok(());
        }

        let armed = self.armed.lock().expect("unable to get armed lock").take();
        if let Some(index) = armed {
            info!(pad = index, trigger = %trigger, "Bound trigger to pad.");
            self.bindings.bind(index, trigger)?;
            return Ok(());
        }

        match self.bindings.resolve(&trigger, self.page_window()) {
            Some(index) => self.trigger_pad(index).await,
            None => Ok(()),
        }
    }

    /// Plays the given pad directly, e.g. from a pad click.
    pub async fn click(&self, index: usize) -> Result<(), BoardError> {
        let armed = self.armed.lock().expect("unable to get armed lock").take();
        if armed.is_some() {
            // A click while armed re-targets the rebind instead.
            *self.armed.lock().expect("unable to get armed lock") = Some(index);
            return Ok(());
        }
        self.trigger_pad(index).await
    }

    async fn trigger_pad(&self, index: usize) -> Result<(), BoardError> {
        match self.pads.get(index) {
            Some(clip) => Ok(self.arbiter.play(index, clip).await?),
            // An empty pad swallows the trigger.
            None => Ok(()),
        }
    }

    /// Arms a pad: the next key or MIDI note rebinds it instead of
    /// playing.
    pub fn arm(&self, index: usize) -> Result<(), BoardError> {
        if index >= self.pads.capacity() {
            return Err(BoardError::Pad(PadError::OutOfBounds {
                index,
                capacity: self.pads.capacity(),
            }));
        }
        let mut armed = self.armed.lock().expect("unable to get armed lock");
        *armed = Some(index);
        info!(pad = index, "Armed pad for rebind.");
        Ok(())
    }

    /// Reads an audio file and assigns it to a pad. If a newer load for
    /// the same pad starts while this one is still reading, this one is
    /// dropped when it completes.
    pub async fn load_file(&self, index: usize, path: &Path) -> Result<(), BoardError> {
        let mime = clip::mime_for_path(path)
            .ok_or_else(|| BoardError::UnsupportedFile(path.to_path_buf()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| BoardError::UnsupportedFile(path.to_path_buf()))?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut generations = self
                .generations
                .lock()
                .expect("unable to get generations lock");
            generations.insert(index, generation);
        }

        let bytes = {
            let path = path.to_path_buf();
            tokio::task::spawn_blocking(move || std::fs::read(path))
                .await
                .map_err(|e| BoardError::Task(e.to_string()))??
        };

        {
            let generations = self
                .generations
                .lock()
                .expect("unable to get generations lock");
            if generations.get(&index) != Some(&generation) {
                info!(pad = index, file = name, "Dropping superseded file load.");
                return Ok(());
            }
        }

        let clip = Clip::from_bytes(&name, mime, &bytes)
            .map_err(|_| BoardError::UnsupportedFile(path.to_path_buf()))?;
        info!(pad = index, file = name, bytes = bytes.len(), "Loaded file onto pad.");
        self.pads.assign(index, clip)?;

        let usage = self.usage()?;
        if usage.near_quota() {
            warn!(usage = %usage, "Pad storage is close to its ceiling.");
        }
        Ok(())
    }

    /// Removes every pad assignment. Bindings stay.
    pub fn clear_all(&self) -> Result<(), BoardError> {
        self.pads.clear_all()?;
        info!("Cleared all pads.");
        Ok(())
    }

    pub fn toggle_exclusive(&self) -> bool {
        self.arbiter.toggle_exclusive()
    }

    pub async fn stop_all(&self) {
        self.arbiter.stop_all().await
    }

    pub fn state(&self) -> PlaybackState {
        self.arbiter.state()
    }

    /// Storage consumption against the configured ceiling.
    pub fn usage(&self) -> Result<Usage, StorageError> {
        capacity::report(self.storage.as_ref(), self.ceiling_megabytes)
    }

    /// A render snapshot of the visible page.
    pub async fn views(&self) -> Vec<PadView> {
        let playing = self.arbiter.playing().await;
        let armed = *self.armed.lock().expect("unable to get armed lock");

        self.page_window()
            .map(|index| PadView {
                index,
                clip_name: self
                    .pads
                    .get(index)
                    .map(|clip| clip.display_name().to_string()),
                trigger_label: self.bindings.get(index).map(|trigger| trigger.label()),
                is_playing: playing.binary_search(&index).is_ok(),
                armed: armed == Some(index),
            })
            .collect()
    }
}
