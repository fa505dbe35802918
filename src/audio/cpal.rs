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
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::playsync::CancelHandle;

use super::{LoadedClip, PlaybackError};

/// A small wrapper around a cpal::Device.
pub struct Device {
    name: String,
    device: cpal::Device,
}

impl Device {
    /// Lists the names of output-capable cpal devices.
    pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
        let host = cpal::default_host();
        let mut names: Vec<String> = Vec::new();
        for device in host.output_devices()? {
            names.push(device.name()?);
        }
        names.sort();
        Ok(names)
    }

    /// Gets the given cpal device. The name `default` selects the host's
    /// default output.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        let host = cpal::default_host();

        if name == "default" {
            let device = host
                .default_output_device()
                .ok_or("no default audio output device available")?;
            return Ok(Device {
                name: device.name()?,
                device,
            });
        }

        let mut matches: Vec<cpal::Device> = host
            .output_devices()?
            .filter(|device| {
                device
                    .name()
                    .map(|device_name| device_name.contains(name))
                    .unwrap_or(false)
            })
            .collect();

        if matches.is_empty() {
            return Err(format!("no audio device found with name {}", name).into());
        }
        if matches.len() > 1 {
            return Err(format!(
                "found too many audio devices that match {}, use a less ambiguous name",
                name
            )
            .into());
        }

        let device = matches.swap_remove(0);
        Ok(Device {
            name: device.name()?,
            device,
        })
    }

    /// Interleaves the clip into the output layout, resampling with
    /// linear interpolation when the rates differ. Linear interpolation
    /// is sufficient for one-shot pads.
    fn prepare(clip: &LoadedClip, out_channels: u16, out_rate: u32) -> Vec<f32> {
        let src = clip.samples();
        let src_channels = clip.channels().max(1) as usize;
        let src_frames = src.len() / src_channels;
        let ratio = out_rate as f64 / clip.sample_rate() as f64;
        let out_frames = (src_frames as f64 * ratio).ceil() as usize;
        let out_channels = out_channels as usize;

        let mut output = Vec::with_capacity(out_frames * out_channels);
        for out_frame in 0..out_frames {
            let src_pos = out_frame as f64 / ratio;
            let src_frame = src_pos.floor() as usize;
            let frac = src_pos.fract() as f32;

            for channel in 0..out_channels {
                let src_channel = channel % src_channels;
                let idx0 = src_frame * src_channels + src_channel;
                let idx1 = (src_frame + 1) * src_channels + src_channel;

                let s0 = src.get(idx0).copied().unwrap_or(0.0);
                let s1 = src.get(idx1).copied().unwrap_or(s0);
                output.push(s0 + (s1 - s0) * frac);
            }
        }

        output
    }

    fn run_stream<T>(
        &self,
        config: &cpal::StreamConfig,
        samples: Arc<Vec<f32>>,
        cancel_handle: CancelHandle,
    ) -> Result<(), PlaybackError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = samples.clone();
            let position = position.clone();
            let finished = finished.clone();
            let cancel_handle = cancel_handle.clone();
            self.device
                .build_output_stream(
                    config,
                    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                        let start = position.load(Ordering::Acquire);
                        let available = samples.len().saturating_sub(start);
                        let to_copy = available.min(data.len());

                        for (dst, &src) in data[..to_copy]
                            .iter_mut()
                            .zip(samples[start..start + to_copy].iter())
                        {
                            *dst = T::from_sample(src);
                        }
                        for dst in data[to_copy..].iter_mut() {
                            *dst = T::from_sample(0.0f32);
                        }

                        position.store(start + to_copy, Ordering::Release);
                        if start + to_copy >= samples.len() && !finished.swap(true, Ordering::AcqRel)
                        {
                            cancel_handle.notify();
                        }
                    },
                    |err| error!(err = %err, "Audio output stream error."),
                    None,
                )
                .map_err(|e| PlaybackError::Output(e.to_string()))?
        };

        stream
            .play()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        // Block until the clip drains or the session is pre-empted.
        // Dropping the stream halts output outright; there is no pause.
        cancel_handle.wait(&finished);
        drop(stream);

        Ok(())
    }
}

impl super::Device for Device {
    fn play(
        &self,
        pad: usize,
        clip: Arc<LoadedClip>,
        cancel_handle: CancelHandle,
    ) -> Result<(), PlaybackError> {
        let span = span!(Level::INFO, "play clip (cpal)");
        let _enter = span.enter();

        let supported = self
            .device
            .default_output_config()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        info!(
            device = self.name,
            pad,
            duration = ?clip.duration(),
            "Playing clip."
        );

        let samples = Arc::new(Device::prepare(
            &clip,
            config.channels,
            config.sample_rate.0,
        ));

        match sample_format {
            cpal::SampleFormat::F32 => self.run_stream::<f32>(&config, samples, cancel_handle),
            cpal::SampleFormat::I16 => self.run_stream::<i16>(&config, samples, cancel_handle),
            cpal::SampleFormat::U16 => self.run_stream::<u16>(&config, samples, cancel_handle),
            other => Err(PlaybackError::Output(format!(
                "unsupported output sample format {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (cpal)", self.name)
    }
}
