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
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Level};

use crate::board::Board;

pub mod keyboard;
pub mod midi;

/// Router events that will trigger behavior on the board.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// A raw key press. Resolved against the bindings on the visible
    /// page; the reserved key toggles exclusive playback instead.
    Key(String),

    /// A MIDI note-on. Resolved like a key press.
    MidiNote(u8),

    /// Plays the pad at the given absolute index directly.
    Click(usize),

    /// Loads an audio file onto the pad at the given absolute index.
    Load { index: usize, path: PathBuf },

    /// Arms a pad so the next key or note rebinds it.
    Arm(usize),

    /// Switches the visible page.
    Page(usize),

    /// Removes every pad assignment.
    ClearAll,

    /// Stops every live playback session.
    StopAll,

    /// Renders the visible page and the storage usage readout.
    Show,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Routes driver events to the board.
pub struct Router {
    handle: JoinHandle<()>,
}

impl Router {
    /// Creates a new router over the given drivers.
    pub fn new(board: Arc<Board>, drivers: Vec<Arc<dyn Driver>>) -> Router {
        Router {
            handle: tokio::spawn(async move { Router::route_events(board, drivers).await }),
        }
    }

    /// Join will block until the router finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    async fn route_events(board: Arc<Board>, drivers: Vec<Arc<dyn Driver>>) {
        let span = span!(Level::INFO, "router");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(10);
        let join_handles: Vec<JoinHandle<Result<(), io::Error>>> = drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect();
        drop(events_tx);

        info!(drivers = join_handles.len(), "Router started.");

        loop {
            if let Some(event) = events_rx.recv().await {
                info!(event = format!("{:?}", event), "Received event.");

                if let Err(e) = match event {
                    Event::Key(code) => board.handle_key(&code).await,
                    Event::MidiNote(note) => board.handle_midi_note(note).await,
                    Event::Click(index) => board.click(index).await,
                    Event::Load { index, path } => board.load_file(index, &path).await,
                    Event::Arm(index) => board.arm(index),
                    Event::Page(page) => {
                        board.change_page(page);
                        Ok(())
                    }
                    Event::ClearAll => board.clear_all(),
                    Event::StopAll => {
                        board.stop_all().await;
                        Ok(())
                    }
                    Event::Show => {
                        Router::show(&board).await;
                        Ok(())
                    }
                } {
                    error!("Error talking to board: {}", e);
                }
            } else {
                info!("Router closing.");
                for join_handle in join_handles {
                    if let Err(e) = join_handle.await {
                        error!("Error waiting for event monitor to stop: {}", e);
                    }
                }
                return;
            }
        }
    }

    async fn show(board: &Arc<Board>) {
        for view in board.views().await {
            let marker = if view.is_playing {
                ">"
            } else if view.armed {
                "*"
            } else {
                " "
            };
            println!(
                "{} pad {:>2}  [{}]  {}",
                marker,
                view.index,
                view.trigger_label.as_deref().unwrap_or("-"),
                view.clip_name.as_deref().unwrap_or("(empty)"),
            );
        }
        match board.usage() {
            Ok(usage) => println!("storage: {}", usage),
            Err(e) => error!("Error reading storage usage: {}", e),
        }
    }
}
