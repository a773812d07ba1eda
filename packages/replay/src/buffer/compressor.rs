// packages/replay/src/buffer/compressor.rs
//! DEFLATE compression for recording payloads
//!
//! [`StreamCompressor`] keeps a single open zlib-wrapped DEFLATE stream per
//! segment so the compression worker can stream events in as they arrive;
//! memory stays bounded by the encoder window rather than by the segment size.
//! [`Compressor`] inflates a finished payload.

use crate::utils::errors::{ReplayError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::debug;

/// Compression levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Fast compression (level 1)
    Fast,

    /// Balanced (level 6)
    Balanced,

    /// Best compression (level 9)
    Best,
}

impl CompressionLevel {
    pub fn as_u32(&self) -> u32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 6,
            CompressionLevel::Best => 9,
        }
    }

    fn as_flate(&self) -> Compression {
        Compression::new(self.as_u32())
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Balanced
    }
}

/// Streaming JSON-array compressor
///
/// Produces the compressed form of `[e1,e2,...]` where each `ei` is an
/// already-serialized JSON record.
pub struct StreamCompressor {
    level: CompressionLevel,
    encoder: Option<ZlibEncoder<Vec<u8>>>,
    records: usize,
}

impl StreamCompressor {
    pub fn new(level: CompressionLevel) -> Result<Self> {
        let mut compressor = Self {
            level,
            encoder: None,
            records: 0,
        };
        compressor.reset()?;
        Ok(compressor)
    }

    /// Drop any open stream and start a fresh one
    pub fn reset(&mut self) -> Result<()> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level.as_flate());
        encoder
            .write_all(b"[")
            .map_err(|e| ReplayError::CompressionFailed(format!("Write error: {}", e)))?;

        self.encoder = Some(encoder);
        self.records = 0;
        Ok(())
    }

    /// Append one serialized record to the open stream
    pub fn add_record(&mut self, record: &str) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| ReplayError::CompressionFailed("No open stream".to_string()))?;

        if self.records > 0 {
            encoder
                .write_all(b",")
                .map_err(|e| ReplayError::CompressionFailed(format!("Write error: {}", e)))?;
        }
        encoder
            .write_all(record.as_bytes())
            .map_err(|e| ReplayError::CompressionFailed(format!("Write error: {}", e)))?;

        self.records += 1;
        Ok(())
    }

    /// Close the stream, return the compressed bytes and open a new stream
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let mut encoder = self
            .encoder
            .take()
            .ok_or_else(|| ReplayError::CompressionFailed("No open stream".to_string()))?;
        let records = self.records;

        let closed = match encoder.write_all(b"]") {
            Ok(()) => encoder.finish(),
            Err(e) => Err(e),
        }
        .map_err(|e| ReplayError::CompressionFailed(format!("Finish error: {}", e)));

        // A new segment always starts from a clean stream, even after a failure.
        self.reset()?;

        let compressed = closed?;
        debug!("Compressed {} records into {} bytes", records, compressed.len());
        Ok(compressed)
    }

    /// Number of records in the open stream
    pub fn records(&self) -> usize {
        self.records
    }
}

/// Inflates payloads produced by [`StreamCompressor`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Compressor;

impl Compressor {
    /// Decompress data
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        debug!("Decompressing {} bytes", data.len());

        let mut restored = Vec::with_capacity(data.len() * 4);
        ZlibDecoder::new(data)
            .read_to_end(&mut restored)
            .map_err(|e| ReplayError::CompressionFailed(format!("Decompression error: {}", e)))?;
        Ok(restored)
    }
}
