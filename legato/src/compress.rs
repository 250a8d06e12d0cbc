//! Gzip compression for batch payloads over a size threshold.
//!
//! Small payloads ship uncompressed: below the threshold the gzip header
//! and dictionary overhead outweigh the savings. A threshold of 0 disables
//! compression entirely. Compression runs once per batch, before the first
//! send attempt, so retries reuse the same body.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::WriteError;

/// An HTTP request body, raw or gzip-compressed.
#[derive(Debug)]
pub(crate) struct EncodedBody {
    /// Body bytes as they go on the wire.
    pub bytes: Vec<u8>,
    /// Whether `bytes` is gzip-compressed (drives the
    /// `Content-Encoding: gzip` header).
    pub compressed: bool,
}

/// Compresses `payload` when it is at or above `threshold` bytes.
///
/// A `threshold` of 0 disables compression.
pub(crate) fn prepare_body(payload: Vec<u8>, threshold: usize) -> Result<EncodedBody, WriteError> {
    if threshold == 0 || payload.len() < threshold {
        return Ok(EncodedBody {
            bytes: payload,
            compressed: false,
        });
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&payload)
        .map_err(|e| WriteError::Compression { source: e })?;
    let bytes = encoder
        .finish()
        .map_err(|e| WriteError::Compression { source: e })?;

    Ok(EncodedBody {
        bytes,
        compressed: true,
    })
}
