/*!
Compression adapters for save blobs.

The game stores every `.jkr` blob as a headerless DEFLATE stream. This module
provides that codec, plus the base64 helpers used to move blobs around as text.
*/

use std::io::Write;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{
    write::{DeflateEncoder, ZlibEncoder},
    Compression, Decompress, FlushDecompress, Status,
};

use crate::{Result, SaveError};

/// Bytes of zlib header in front of the DEFLATE payload
const ZLIB_HEADER_LEN: usize = 2;
/// Bytes of Adler-32 checksum after the DEFLATE payload
const ZLIB_TRAILER_LEN: usize = 4;

/// Compression abstraction for save blobs
///
/// This trait defines the interface for all compression implementations.
/// It allows the sync engine to work with different codecs
/// without being coupled to any specific implementation.
pub trait CompressionAdapter {
    /// Compress the input data
    ///
    /// # Arguments
    /// * `data` - The data to compress
    ///
    /// # Returns
    /// The compressed data or an error
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress the input data
    ///
    /// # Arguments
    /// * `compressed_data` - The compressed data to decompress
    ///
    /// # Returns
    /// The decompressed data or an error
    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of the compression algorithm
    fn algorithm_name(&self) -> &str;
}

/// Raw DEFLATE compression adapter
///
/// Produces and consumes DEFLATE streams with no zlib or gzip framing, which is
/// the layout the game engine writes for `meta.jkr` and `profile.jkr`.
///
/// # Example
/// ```rust
/// use savebridge_core::{CompressionAdapter, RawDeflate};
///
/// let codec = RawDeflate::new();
/// let data = b"return {[\"unlocked\"]=true}";
/// let compressed = codec.compress(data)?;
/// let decompressed = codec.decompress(&compressed)?;
/// assert_eq!(data, &decompressed[..]);
/// # Ok::<(), savebridge_core::SaveError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RawDeflate {
    compression_level: Compression,
}

impl RawDeflate {
    /// Create a new raw deflate codec with default compression level (6)
    pub fn new() -> Self {
        Self {
            compression_level: Compression::default(),
        }
    }

    /// Create a new raw deflate codec with the specified compression level
    ///
    /// # Arguments
    /// * `level` - Compression level (0-9, where 0 is no compression and 9 is maximum)
    pub fn with_level(level: u32) -> Self {
        Self {
            compression_level: Compression::new(level.min(9)),
        }
    }

    pub fn level(&self) -> u32 {
        self.compression_level.level()
    }
}

impl Default for RawDeflate {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for RawDeflate {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), self.compression_level);

        encoder.write_all(data).map_err(|e| {
            SaveError::codec(format!("Failed to write data for compression: {e}"))
        })?;

        encoder
            .finish()
            .map_err(|e| SaveError::codec(format!("Failed to finish compression: {e}")))
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        let mut inflater = Decompress::new(false);
        let mut decompressed = Vec::with_capacity(compressed_data.len().saturating_mul(4).max(64));

        loop {
            if decompressed.len() == decompressed.capacity() {
                decompressed.reserve(decompressed.capacity().max(1024));
            }

            let (in_before, out_before) = (inflater.total_in(), inflater.total_out());
            let consumed = in_before as usize;
            let status = inflater
                .decompress_vec(
                    &compressed_data[consumed..],
                    &mut decompressed,
                    FlushDecompress::Finish,
                )
                .map_err(|e| SaveError::codec(format!("Failed to inflate data: {e}")))?;

            if status == Status::StreamEnd {
                return Ok(decompressed);
            }

            // Out of input with room left in the output: the stream never reached its final block.
            let input_exhausted = inflater.total_in() as usize == compressed_data.len();
            let stalled = inflater.total_in() == in_before && inflater.total_out() == out_before;
            if decompressed.len() < decompressed.capacity() && (input_exhausted || stalled) {
                return Err(SaveError::codec(format!(
                    "Failed to inflate data: truncated deflate stream after {} bytes",
                    inflater.total_in()
                )));
            }
        }
    }

    fn algorithm_name(&self) -> &str {
        "raw-deflate"
    }
}

/// Raw-deflate `raw` at the default level
pub fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    RawDeflate::new().compress(raw)
}

/// Raw-inflate `compressed`
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    RawDeflate::new().decompress(compressed)
}

/// Standard-alphabet, padded base64 without line wrapping
pub fn base64_encode(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

pub fn base64_decode(text: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let text = text.as_ref();
    // Tolerate a trailing newline from files or pipes.
    let trimmed = text
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(&text[..0], |end| &text[..=end]);
    STANDARD
        .decode(trimmed)
        .map_err(|e| SaveError::codec(format!("Invalid base64 input: {e}")))
}

/// Compress `raw` into the transport form: a zlib stream with its 2-byte header
/// and 4-byte checksum dropped, base64 encoded
pub fn compress_and_base64(raw: &[u8]) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| SaveError::codec(format!("Failed to write data for compression: {e}")))?;
    let zlibbed = encoder
        .finish()
        .map_err(|e| SaveError::codec(format!("Failed to finish compression: {e}")))?;

    if zlibbed.len() < ZLIB_HEADER_LEN + ZLIB_TRAILER_LEN {
        return Err(SaveError::codec(format!(
            "zlib stream too short to strip framing: {} bytes",
            zlibbed.len()
        )));
    }
    let payload = &zlibbed[ZLIB_HEADER_LEN..zlibbed.len() - ZLIB_TRAILER_LEN];
    Ok(base64_encode(payload))
}

/// Inverse of [`compress_and_base64`]: base64-decode then raw inflate
pub fn base64_and_inflate(text: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let compressed = base64_decode(text)?;
    decompress(&compressed)
}
