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
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
};

use tracing::{info, span, Level};

use crate::playsync::CancelHandle;

use super::{LoadedClip, PlaybackError};

/// How a mock playback session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The clip ran to its natural end.
    Finished,
    /// The session was pre-empted: stopped, not paused.
    Stopped,
}

/// A mock device. Doesn't actually play anything; it sleeps for the
/// clip's duration and records how each session ended.
#[derive(Clone)]
pub struct Device {
    name: String,
    playing: Arc<Mutex<HashSet<usize>>>,
    outcomes: Arc<Mutex<HashMap<usize, Outcome>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            playing: Arc::new(Mutex::new(HashSet::new())),
            outcomes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns true if the given pad has a live session on this device.
    pub fn is_playing(&self, pad: usize) -> bool {
        let playing = self.playing.lock().expect("unable to get playing lock");
        playing.contains(&pad)
    }

    /// Returns true if any pad has a live session.
    pub fn any_playing(&self) -> bool {
        let playing = self.playing.lock().expect("unable to get playing lock");
        !playing.is_empty()
    }

    /// How the most recent session for a pad ended, if one ended.
    pub fn outcome(&self, pad: usize) -> Option<Outcome> {
        let outcomes = self.outcomes.lock().expect("unable to get outcomes lock");
        outcomes.get(&pad).copied()
    }
}

impl super::Device for Device {
    fn play(
        &self,
        pad: usize,
        clip: Arc<LoadedClip>,
        cancel_handle: CancelHandle,
    ) -> Result<(), PlaybackError> {
        let span = span!(Level::INFO, "play clip (mock)");
        let _enter = span.enter();

        let duration = clip.duration();
        info!(device = self.name, pad, duration = ?duration, "Playing clip.");

        {
            let mut playing = self.playing.lock().expect("unable to get playing lock");
            playing.insert(pad);
        }

        let (sleep_tx, sleep_rx) = mpsc::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            let finished = finished.clone();
            // Wait until the clip is cancelled or until it runs out.
            thread::spawn(move || {
                let _ = sleep_rx.recv_timeout(duration);
                finished.store(true, Ordering::Relaxed);
                cancel_handle.notify();
            })
        };

        cancel_handle.wait(&finished);
        let _ = sleep_tx.send(());
        let join_result = join_handle.join();

        {
            let mut playing = self.playing.lock().expect("unable to get playing lock");
            playing.remove(&pad);
        }
        {
            let mut outcomes = self.outcomes.lock().expect("unable to get outcomes lock");
            let outcome = if cancel_handle.is_cancelled() {
                Outcome::Stopped
            } else {
                Outcome::Finished
            };
            outcomes.insert(pad, outcome);
        }

        if join_result.is_err() {
            return Err(PlaybackError::Output("error while joining thread".to_string()));
        }

        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
