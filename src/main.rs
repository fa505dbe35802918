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
mod arbiter;
mod audio;
mod bindings;
mod board;
mod capacity;
mod clip;
mod config;
mod midi;
mod pads;
mod playsync;
mod router;
mod store;
#[cfg(test)]
mod testutil;
mod trigger;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::warn;

use crate::arbiter::Arbiter;
use crate::bindings::BindingStore;
use crate::board::Board;
use crate::pads::PadStore;
use crate::router::{Driver, Router};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=soundboard pad engine

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/padboard
ExecStart=/usr/local/bin/padboard start "$PADBOARD_CONFIG"
ExecReload=/bin/kill -HUP $MAINPID

[Install]
WantedBy=multi-user.target
Alias=padboard.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A soundboard pad engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Lists the persisted pad assignments and bindings.
    Pads {
        /// The path to the board config.
        config_path: String,
    },
    /// Prints persisted storage usage against the configured ceiling.
    Usage {
        /// The path to the board config.
        config_path: String,
    },
    /// Start will start the soundboard.
    Start {
        /// The path to the board config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Pads { config_path } => {
            let config = config::Board::deserialize(Path::new(&config_path))?;
            let storage = store::get_storage(&config.state_dir)?;
            let pads = PadStore::new(storage.clone(), config.grid_capacity);
            let bindings =
                BindingStore::new(storage, config.grid_capacity, config.seed_default_bindings);

            let assigned = pads.assigned();
            if assigned.is_empty() {
                println!("No pads assigned.");
            } else {
                println!("Pads (count: {}):", assigned.len());
                for (index, clip) in assigned {
                    println!("- pad {:>2}: {}", index, clip.display_name());
                }
            }

            let bound = bindings.bound();
            if !bound.is_empty() {
                println!("Bindings (count: {}):", bound.len());
                for (index, trigger) in bound {
                    println!("- pad {:>2}: {}", index, trigger);
                }
            }
        }
        Commands::Usage { config_path } => {
            let config = config::Board::deserialize(Path::new(&config_path))?;
            let storage = store::get_storage(&config.state_dir)?;
            println!("{}", capacity::report(storage.as_ref(), config.storage_ceiling_mb)?);
        }
        Commands::Start { config_path } => {
            let config = config::Board::deserialize(Path::new(&config_path))?;
            let storage = store::get_storage(&config.state_dir)?;
            let pads = Arc::new(PadStore::new(storage.clone(), config.grid_capacity));
            let bindings = Arc::new(BindingStore::new(
                storage.clone(),
                config.grid_capacity,
                config.seed_default_bindings,
            ));

            let device = audio::get_device(&config.audio_device)?;
            let arbiter = Arc::new(Arbiter::new(device, config.exclusive));
            let board = Arc::new(Board::new(
                pads,
                bindings,
                arbiter,
                storage,
                config.page_size,
                config.storage_ceiling_mb,
            ));

            let mut drivers: Vec<Arc<dyn Driver>> =
                vec![Arc::new(router::keyboard::Driver::new())];
            if let Some(midi_device_name) = config.midi_device.as_deref() {
                // A missing controller shouldn't keep the board from
                // starting.
                match midi::get_device(midi_device_name) {
                    Ok(midi_device) => drivers.push(router::midi::Driver::new(midi_device)),
                    Err(e) => warn!(
                        device = midi_device_name,
                        err = %e,
                        "MIDI device unavailable, continuing without it."
                    ),
                }
            }

            Router::new(board, drivers).join().await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
