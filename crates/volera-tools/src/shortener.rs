// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reversible URL → product id encoding.
//!
//! The id is a URL-safe base64 string of a one-byte tag followed by either the
//! DEFLATE-compressed URL or, when compression does not help, the raw bytes.
//! The mapping is a pure function of the URL, so the same URL always yields
//! the same id.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use thiserror::Error;

const TAG_RAW: u8 = b'r';
const TAG_DEFLATE: u8 = b'z';

/// Error returned by [`restore`] for ids that were not produced by [`shorten`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestoreError {
    #[error("id is not valid base64")]
    Encoding,
    #[error("id is empty")]
    Empty,
    #[error("unknown id tag {0:#04x}")]
    UnknownTag(u8),
    #[error("compressed payload is corrupt")]
    Corrupt,
    #[error("decoded URL is not UTF-8")]
    NotUtf8,
}

/// Short, URL-safe, deterministic id for `url`.
pub fn shorten(url: &str) -> String {
    let raw = url.as_bytes();
    let mut payload = Vec::with_capacity(raw.len() + 1);
    match deflate(raw) {
        Some(compressed) if compressed.len() < raw.len() => {
            payload.push(TAG_DEFLATE);
            payload.extend_from_slice(&compressed);
        }
        _ => {
            payload.push(TAG_RAW);
            payload.extend_from_slice(raw);
        }
    }
    URL_SAFE_NO_PAD.encode(payload)
}

/// Inverse of [`shorten`].
pub fn restore(id: &str) -> Result<String, RestoreError> {
    let payload = URL_SAFE_NO_PAD
        .decode(id.as_bytes())
        .map_err(|_| RestoreError::Encoding)?;
    let (&tag, body) = payload.split_first().ok_or(RestoreError::Empty)?;
    let bytes = match tag {
        TAG_RAW => body.to_vec(),
        TAG_DEFLATE => {
            let mut out = Vec::new();
            DeflateDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|_| RestoreError::Corrupt)?;
            out
        }
        other => return Err(RestoreError::UnknownTag(other)),
    };
    String::from_utf8(bytes).map_err(|_| RestoreError::NotUtf8)
}

fn deflate(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes).ok()?;
    encoder.finish().ok()
}
