//! Page compression
//!
//! The gzip output must be readable by the browser's `DecompressionStream("gzip")`,
//! so only the standard gzip container is produced: no extra fields, mtime 0,
//! which also keeps builds byte-for-byte reproducible.
//!
//! **Design**:
//! - `None` is the identity and adds no layer to the payload
//! - Decompression here mirrors the client and is used by the restorer and tests

use crate::error::{Result, VeilError};
use crate::options::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// Compression level used for gzip pages
const GZIP_LEVEL: u32 = 9;

/// Compress data using the specified method
pub fn compress(data: &[u8], method: Compression) -> Result<Vec<u8>> {
    match method {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(
                Vec::with_capacity(data.len() / 2 + 32),
                flate2::Compression::new(GZIP_LEVEL),
            );
            encoder
                .write_all(data)
                .map_err(|e| VeilError::Compression(format!("gzip compression failed: {}", e)))?;
            encoder
                .finish()
                .map_err(|e| VeilError::Compression(format!("gzip compression failed: {}", e)))
        }
    }
}

/// Decompress data using the specified method
pub fn decompress(data: &[u8], method: Compression) -> Result<Vec<u8>> {
    match method {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::with_capacity(data.len() * 3);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| VeilError::Compression(format!("gzip decompression failed: {}", e)))?;
            Ok(out)
        }
    }
}
