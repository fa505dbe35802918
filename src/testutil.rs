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

#[cfg(test)]
use std::{
    f32::consts::PI,
    io::Cursor,
    thread,
    time::{Duration, Instant},
};

#[cfg(test)]
use hound::{SampleFormat, WavSpec, WavWriter};

#[cfg(test)]
use crate::clip::Clip;

/// Wait for the given predicate to return true or fail.
#[inline]
#[cfg(test)]
pub fn eventually<F>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Builds a clip holding a real wav payload: an 8 kHz mono sine tone of
/// the given length.
#[cfg(test)]
pub fn wav_clip(name: &str, millis: u64) -> Clip {
    const SAMPLE_RATE: u32 = 8000;

    let mut bytes: Vec<u8> = Vec::new();
    {
        let mut writer = WavWriter::new(
            Cursor::new(&mut bytes),
            WavSpec {
                channels: 1,
                sample_rate: SAMPLE_RATE,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )
        .expect("unable to create wav writer");

        let total_samples = SAMPLE_RATE as u64 * millis / 1000;
        for i in 0..total_samples {
            let t = i as f32 / SAMPLE_RATE as f32;
            let sample = (2.0 * PI * 440.0 * t).sin();
            writer
                .write_sample((sample * i16::MAX as f32 * 0.5) as i16)
                .expect("unable to write sample");
        }
        writer.finalize().expect("unable to finalize wav");
    }

    Clip::from_bytes(name, "audio/wav", &bytes).expect("unable to build clip")
}
