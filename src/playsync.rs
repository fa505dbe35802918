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
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc, Condvar, Mutex};

/// Pre-emption is the only cancellation primitive in the engine: a cancel
/// handle is handed to the audio device for each playback session, and the
/// arbiter cancels it when the session is pre-empted. The device is
/// responsible for respecting a cancel request.
#[derive(Clone, Default)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl CancelHandle {
    pub fn new() -> CancelHandle {
        CancelHandle::default()
    }

    /// Returns true if the session has been pre-empted.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock().expect("error getting lock")
    }

    /// Blocks until the session is cancelled or `finished` becomes true.
    /// The party that sets `finished` must call `notify` afterwards.
    pub fn wait(&self, finished: &AtomicBool) {
        let guard = self.inner.cancelled.lock().expect("error getting lock");
        let _unused = self
            .inner
            .signal
            .wait_while(guard, |cancelled| {
                !*cancelled && !finished.load(Ordering::Relaxed)
            })
            .expect("error getting lock");
    }

    /// Wakes any waiter so it can re-check the finished flag.
    pub fn notify(&self) {
        self.inner.signal.notify_all();
    }

    /// Cancels the session.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock().expect("error getting lock");
        if !*cancelled {
            *cancelled = true;
            self.inner.signal.notify_all();
        }
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;

    #[test]
    fn test_cancel_wakes_waiter() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait(&AtomicBool::new(false)))
        };

        cancel_handle.cancel();
        assert!(join.join().is_ok());
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_finished_wakes_waiter_without_cancel() {
        let cancel_handle = CancelHandle::new();

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait(&AtomicBool::new(true)))
        };

        assert!(join.join().is_ok());
        assert!(!cancel_handle.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();
        cancel_handle.cancel();
        assert!(cancel_handle.is_cancelled());
    }
}
