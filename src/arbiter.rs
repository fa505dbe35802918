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
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use crate::{
    audio::{self, decode, decode::DecodeError},
    clip::Clip,
    playsync::CancelHandle,
};

/// What the grid should currently highlight. `Playing` always names the
/// most recently triggered pad, even when older sessions are still
/// sounding in non-exclusive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    #[error("unable to decode clip: {0}")]
    Decode(#[from] DecodeError),
    #[error("decode task failed: {0}")]
    Task(String),
}

struct Session {
    id: u64,
    cancel_handle: CancelHandle,
}

/// Arbitrates playback sessions over a single output device. Each pad has
/// at most one live session. In exclusive mode a new trigger stops every
/// live session before its own starts; otherwise it only replaces the
/// session on its own pad.
pub struct Arbiter {
    device: Arc<dyn audio::Device>,
    exclusive: AtomicBool,
    next_session: AtomicU64,
    sessions: Arc<Mutex<HashMap<usize, Session>>>,
    // The session id currently reflected in the playback state. Stale
    // cleanups must never clear a newer session's highlight.
    highlight: Arc<AtomicU64>,
    state_tx: watch::Sender<PlaybackState>,
}

impl Arbiter {
    pub fn new(device: Arc<dyn audio::Device>, exclusive: bool) -> Arbiter {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Arbiter {
            device,
            exclusive: AtomicBool::new(exclusive),
            next_session: AtomicU64::new(0),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            highlight: Arc::new(AtomicU64::new(0)),
            state_tx,
        }
    }

    /// Starts a playback session for the given pad. The clip is decoded
    /// before any existing session is touched, so a clip that fails to
    /// decode leaves current playback exactly as it was. Returns once the
    /// session has started; playback itself runs in the background.
    pub async fn play(&self, pad: usize, clip: Arc<Clip>) -> Result<(), ArbiterError> {
        let loaded = {
            let clip = clip.clone();
            tokio::task::spawn_blocking(move || decode::load(&clip))
                .await
                .map_err(|e| ArbiterError::Task(e.to_string()))??
        };
        let loaded = Arc::new(loaded);

        let id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel_handle = CancelHandle::new();

        {
            let mut sessions = self.sessions.lock().await;
            if self.exclusive.load(Ordering::Relaxed) {
                for (_, session) in sessions.drain() {
                    session.cancel_handle.cancel();
                }
            } else if let Some(previous) = sessions.remove(&pad) {
                // Re-triggering a sounding pad restarts it.
                previous.cancel_handle.cancel();
            }
            sessions.insert(
                pad,
                Session {
                    id,
                    cancel_handle: cancel_handle.clone(),
                },
            );
        }

        info!(pad, clip = clip.name, session = id, "Starting playback session.");
        self.highlight.store(id, Ordering::Release);
        let _ = self.state_tx.send(PlaybackState::Playing(pad));

        let play_handle = {
            let device = self.device.clone();
            let cancel_handle = cancel_handle.clone();
            tokio::task::spawn_blocking(move || device.play(pad, loaded, cancel_handle))
        };

        let sessions = self.sessions.clone();
        let highlight = self.highlight.clone();
        let state_tx = self.state_tx.clone();
        tokio::spawn(async move {
            match play_handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(err = %e, pad, "Playback session failed."),
                Err(e) => error!(err = %e, pad, "Playback task panicked."),
            }

            {
                let mut sessions = sessions.lock().await;
                // A newer session may already own this pad.
                if sessions.get(&pad).map(|session| session.id) == Some(id) {
                    sessions.remove(&pad);
                }
            }
            if highlight
                .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                let _ = state_tx.send(PlaybackState::Idle);
            }
        });

        Ok(())
    }

    /// Stops every live session.
    pub async fn stop_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for (_, session) in sessions.drain() {
            session.cancel_handle.cancel();
        }
    }

    /// Flips exclusive mode and returns the new value. Live sessions are
    /// unaffected until the next trigger.
    pub fn toggle_exclusive(&self) -> bool {
        let exclusive = !self.exclusive.fetch_xor(true, Ordering::AcqRel);
        info!(exclusive, "Toggled exclusive playback.");
        exclusive
    }

    pub fn exclusive(&self) -> bool {
        self.exclusive.load(Ordering::Relaxed)
    }

    /// The pads with live sessions, ordered by index.
    pub async fn playing(&self) -> Vec<usize> {
        let sessions = self.sessions.lock().await;
        let mut pads: Vec<usize> = sessions.keys().copied().collect();
        pads.sort_unstable();
        pads
    }

    pub fn state(&self) -> PlaybackState {
        *self.state_tx.borrow()
    }

    /// A watch on the playback state, for drivers that render it.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::audio::test::{Device, Outcome};
    use crate::testutil::{eventually, wav_clip};

    use super::*;

    fn arbiter_with_mock(exclusive: bool) -> (Arbiter, Device) {
        let mock = Device::get("mock-device");
        let arbiter = Arbiter::new(Arc::new(mock.clone()), exclusive);
        (arbiter, mock)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exclusive_preempts_all() -> Result<(), Box<dyn Error>> {
        let (arbiter, device) = arbiter_with_mock(true);

        arbiter.play(0, Arc::new(wav_clip("a.wav", 3000))).await?;
        {
            let device = device.clone();
            eventually(|| device.is_playing(0), "pad 0 never started");
        }
        assert_eq!(arbiter.state(), PlaybackState::Playing(0));

        arbiter.play(1, Arc::new(wav_clip("b.wav", 3000))).await?;
        {
            let device = device.clone();
            eventually(
                || device.is_playing(1) && !device.is_playing(0),
                "pad 1 never displaced pad 0",
            );
        }
        assert_eq!(device.outcome(0), Some(Outcome::Stopped));
        assert_eq!(arbiter.state(), PlaybackState::Playing(1));
        assert_eq!(arbiter.playing().await, vec![1]);

        arbiter.stop_all().await;
        eventually(|| !device.any_playing(), "sessions never stopped");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_non_exclusive_layers_sessions() -> Result<(), Box<dyn Error>> {
        let (arbiter, device) = arbiter_with_mock(false);

        arbiter.play(0, Arc::new(wav_clip("a.wav", 3000))).await?;
        arbiter.play(1, Arc::new(wav_clip("b.wav", 3000))).await?;
        {
            let device = device.clone();
            eventually(
                || device.is_playing(0) && device.is_playing(1),
                "both pads never sounded together",
            );
        }

        // The newest trigger owns the highlight even while both sound.
        assert_eq!(arbiter.state(), PlaybackState::Playing(1));
        assert_eq!(arbiter.playing().await, vec![0, 1]);

        arbiter.stop_all().await;
        eventually(|| !device.any_playing(), "sessions never stopped");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_natural_end_returns_to_idle() -> Result<(), Box<dyn Error>> {
        let (arbiter, device) = arbiter_with_mock(false);
        let mut state_rx = arbiter.subscribe();

        arbiter.play(4, Arc::new(wav_clip("short.wav", 50))).await?;
        {
            let device = device.clone();
            eventually(
                || device.outcome(4) == Some(Outcome::Finished),
                "clip never ran out",
            );
        }
        eventually(
            move || *state_rx.borrow_and_update() == PlaybackState::Idle,
            "state never returned to idle",
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_retrigger_restarts_pad() -> Result<(), Box<dyn Error>> {
        let (arbiter, device) = arbiter_with_mock(false);

        arbiter.play(2, Arc::new(wav_clip("loop.wav", 3000))).await?;
        {
            let device = device.clone();
            eventually(|| device.is_playing(2), "pad 2 never started");
        }

        arbiter.play(2, Arc::new(wav_clip("loop.wav", 3000))).await?;
        {
            let device = device.clone();
            eventually(
                || device.outcome(2) == Some(Outcome::Stopped),
                "first session was never replaced",
            );
        }
        assert_eq!(arbiter.state(), PlaybackState::Playing(2));

        arbiter.stop_all().await;
        eventually(|| !device.any_playing(), "sessions never stopped");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_undecodable_clip_leaves_state_untouched() {
        let (arbiter, device) = arbiter_with_mock(true);

        let clip = Clip::from_bytes("junk.wav", "audio/wav", b"not audio at all")
            .expect("failed to build clip");
        let result = arbiter.play(0, Arc::new(clip)).await;

        assert!(matches!(result, Err(ArbiterError::Decode(_))));
        assert_eq!(arbiter.state(), PlaybackState::Idle);
        assert!(!device.any_playing());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_toggle_exclusive() {
        let (arbiter, _) = arbiter_with_mock(false);
        assert!(!arbiter.exclusive());
        assert!(arbiter.toggle_exclusive());
        assert!(arbiter.exclusive());
        assert!(!arbiter.toggle_exclusive());
    }
}
