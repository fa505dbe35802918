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
use std::{io, sync::Arc};

use midly::{live::LiveEvent, MidiMessage};
use tokio::{sync::mpsc, sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Level};

use crate::midi::Device;

use super::Event;

/// A driver that runs the board from a MIDI controller. Only note-on
/// messages with a non-zero velocity become events; a zero velocity
/// note-on is a disguised note-off and is dropped.
pub struct Driver {
    midi_device: Arc<dyn Device>,
}

impl Driver {
    pub fn new(midi_device: Arc<dyn Device>) -> Arc<Driver> {
        Arc::new(Driver { midi_device })
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(10);

        {
            let device = self.midi_device.clone();
            tokio::task::spawn_blocking(move || {
                let span = span!(Level::INFO, "MIDI driver");
                let _enter = span.enter();

                info!(device = device.name(), "MIDI driver started.");

                if let Err(e) = device.watch_events(midi_events_tx) {
                    error!(err = e.to_string(), "Error watching MIDI events");
                }
            });
        }

        let device = self.midi_device.clone();
        tokio::spawn(async move {
            loop {
                let raw_event = match midi_events_rx.recv().await {
                    Some(raw_event) => raw_event,
                    None => {
                        info!("MIDI watcher closed.");
                        device.stop_watch_events();
                        return Ok(());
                    }
                };

                let event = match LiveEvent::parse(&raw_event) {
                    Ok(event) => event,
                    Err(e) => {
                        error!(err = format!("{:?}", e), "Error parsing event.");
                        continue;
                    }
                };

                if let LiveEvent::Midi {
                    message: MidiMessage::NoteOn { key, vel },
                    ..
                } = event
                {
                    if vel.as_int() == 0 {
                        debug!(note = key.as_int(), "Ignoring zero velocity note-on.");
                        continue;
                    }
                    if let Err(e) = events_tx.send(Event::MidiNote(key.as_int())).await {
                        error!(err = format!("{:?}", e), "Error sending MIDI note event.");
                        device.stop_watch_events();
                        return Ok(());
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc};

    use midly::{live::LiveEvent, MidiMessage};
    use tokio::sync::mpsc;

    use crate::{
        midi::{self, Device as _},
        router::Driver as _,
        router::Event,
        testutil::eventually,
    };

    fn note_on(note: u8, velocity: u8) -> Vec<u8> {
        let event = LiveEvent::Midi {
            channel: 0.into(),
            message: MidiMessage::NoteOn {
                key: note.into(),
                vel: velocity.into(),
            },
        };
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        event.write(&mut buf).expect("unable to write event");
        buf
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_midi_driver() -> Result<(), Box<dyn Error>> {
        let mock = midi::test::Device::get("mock-midi-device");
        let driver = super::Driver::new(Arc::new(mock.clone()));

        let (events_tx, mut events_rx) = mpsc::channel::<Event>(10);
        let _handle = driver.monitor_events(events_tx);

        // Garbage and zero velocity note-ons are dropped.
        mock.mock_event(&[1, 2, 3, 4]);
        mock.mock_event(&note_on(36, 0));
        mock.mock_event(&note_on(36, 100));

        let event = events_rx.recv().await.expect("no event received");
        assert_eq!(event, Event::MidiNote(36));

        // Nothing else was forwarded.
        let pending = events_rx.try_recv();
        assert!(pending.is_err(), "unexpected event {:?}", pending);

        mock.stop_watch_events();
        eventually(|| events_rx.is_closed(), "driver never shut down");
        Ok(())
    }
}
