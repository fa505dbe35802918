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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const PLAY: &str = "play";
const LOAD: &str = "load";
const BIND: &str = "bind";
const PAGE: &str = "page";
const CLEAR: &str = "clear";
const STOP: &str = "stop";
const SHOW: &str = "show";

/// A driver that runs the board from a terminal. Command words are
/// dispatched directly; any other single token is treated as a key press
/// and resolved against the bindings.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    fn parse(input: &str) -> Option<Event> {
        let mut tokens = input.split_whitespace();
        let first = tokens.next()?;

        let parsed = match first.to_lowercase().as_str() {
            PLAY => tokens.next()?.parse().ok().map(Event::Click),
            BIND => tokens.next()?.parse().ok().map(Event::Arm),
            PAGE => tokens.next()?.parse().ok().map(Event::Page),
            LOAD => {
                let index = tokens.next()?.parse().ok()?;
                let path = PathBuf::from(tokens.next()?);
                Some(Event::Load { index, path })
            }
            CLEAR => Some(Event::ClearAll),
            STOP => Some(Event::StopAll),
            SHOW => Some(Event::Show),
            _ if tokens.next().is_none() => Some(Event::Key(first.to_string())),
            _ => None,
        };
        parsed
    }

    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} N, {} N FILE, {} N, {} N, {}, {}, {}, or a key): ",
            PLAY, LOAD, BIND, PAGE, CLEAR, STOP, SHOW,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        reader.read_line(&mut input)?;

        match Driver::parse(input.trim()) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => {
                warn!(input = input, "Unrecognized input");
            }
        }
        Ok(())
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            loop {
                Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())?;
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};
    use std::path::PathBuf;

    use tokio::sync::mpsc;

    use crate::router::Event;

    use super::Driver;

    fn get_event(input: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader_bytes = input.as_bytes();
        let reader = BufReader::new(reader_bytes);

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(Event::Click(3), get_event("play 3")?.unwrap());
        assert_eq!(Event::Arm(7), get_event("bind 7")?.unwrap());
        assert_eq!(Event::Page(1), get_event("page 1")?.unwrap());
        assert_eq!(
            Event::Load {
                index: 0,
                path: PathBuf::from("/tmp/kick.wav")
            },
            get_event("load 0 /tmp/kick.wav")?.unwrap()
        );
        assert_eq!(Event::ClearAll, get_event("clear")?.unwrap());
        assert_eq!(Event::StopAll, get_event("stop")?.unwrap());
        assert_eq!(Event::Show, get_event("show")?.unwrap());

        // Any other single token is a key press, including the reserved
        // exclusivity toggle.
        assert_eq!(Event::Key("q".to_string()), get_event("q")?.unwrap());
        assert_eq!(Event::Key("end".to_string()), get_event("end")?.unwrap());

        assert_eq!(None, get_event("play")?);
        assert_eq!(None, get_event("two words")?);
        assert_eq!(None, get_event("")?);
        Ok(())
    }
}
