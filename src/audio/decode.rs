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
use std::{io::Cursor, sync::Arc, time::Duration};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::clip::{Clip, ClipError};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("clip payload is invalid: {0}")]
    Payload(#[from] ClipError),
    #[error("unrecognized audio format: {0}")]
    Format(#[from] SymphoniaError),
    #[error("clip has no audio track")]
    NoTrack,
    #[error("clip does not specify a sample rate")]
    UnknownRate,
}

/// A clip decoded entirely into memory, ready for zero-latency playback.
pub struct LoadedClip {
    samples: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
}

impl LoadedClip {
    /// Interleaved f32 samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

/// Decodes a clip's payload into interleaved f32 samples. Any failure
/// here happens before a playback session exists, so a bad clip never
/// moves the arbiter out of its current state.
pub fn load(clip: &Clip) -> Result<LoadedClip, DecodeError> {
    let bytes = clip.bytes()?;
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe().format(&Hint::new(), mss, &fmt_opts, &meta_opts)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or(DecodeError::UnknownRate)?;
    let mut channels = track
        .codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(0);

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs().make(&track.codec_params, &decoder_opts)?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A single damaged packet is skippable; the rest of the clip
            // still decodes.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(err = e, "Skipping undecodable packet.");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if channels == 0 {
            channels = decoded.spec().channels.count() as u16;
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if channels == 0 || samples.is_empty() {
        return Err(DecodeError::NoTrack);
    }

    Ok(LoadedClip {
        samples: Arc::new(samples),
        channels,
        sample_rate,
    })
}
