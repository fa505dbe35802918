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
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("unsupported media type {0}, expected audio/*")]
    NotAudio(String),
    #[error("malformed data URI")]
    MalformedUri,
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

const DATA_URI_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// An audio clip assigned to a pad. The payload is kept as a data URI so
/// the persisted form matches the in-memory form exactly, which is what
/// makes the full-mapping persist on every assign cheap to reason about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// A `data:audio/...;base64,...` URI holding the clip bytes.
    pub url: String,
    /// The original upload filename.
    pub name: String,
}

impl Clip {
    /// Encodes raw upload bytes into a clip. The MIME type must carry an
    /// audio prefix; anything else is rejected and the pad keeps its
    /// prior assignment.
    pub fn from_bytes(name: &str, mime: &str, bytes: &[u8]) -> Result<Clip, ClipError> {
        if !mime.starts_with("audio/") {
            return Err(ClipError::NotAudio(mime.to_string()));
        }

        Ok(Clip {
            url: format!("{DATA_URI_PREFIX}{mime}{BASE64_MARKER}{}", BASE64.encode(bytes)),
            name: name.to_string(),
        })
    }

    /// Decodes the payload back to raw audio bytes.
    pub fn bytes(&self) -> Result<Vec<u8>, ClipError> {
        let rest = self
            .url
            .strip_prefix(DATA_URI_PREFIX)
            .ok_or(ClipError::MalformedUri)?;
        let (_, payload) = rest.split_once(BASE64_MARKER).ok_or(ClipError::MalformedUri)?;
        Ok(BASE64.decode(payload)?)
    }

    /// The name shown on the pad: the filename with its extension stripped.
    pub fn display_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 && !self.name[dot..].contains('/') => &self.name[..dot],
            _ => &self.name,
        }
    }
}

/// Guesses the MIME type of an upload from its file extension. Returns
/// None for anything that is not a known audio container.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    match extension.as_str() {
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "flac" => Some("audio/flac"),
        "ogg" | "oga" => Some("audio/ogg"),
        "m4a" | "mp4" => Some("audio/mp4"),
        "aif" | "aiff" => Some("audio/aiff"),
        _ => None,
    }
}
