use std::io::Read;

use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{ProtocolError, Result};

/// Inflate limit for the player profile family.
pub const PROFILE_MAX_INFLATED: usize = 8 * 1024;

/// Inflate limit for the spawn family.
pub const SPAWN_MAX_INFLATED: usize = 64 * 1024;

/// Compresses data with a zlib (header-bearing) stream.
///
/// # Errors
/// Returns `ProtocolError::Io` if the encoder fails
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    ZlibEncoder::new(data, Compression::default()).read_to_end(&mut out)?;
    Ok(out)
}

/// Inflates a zlib stream into at most `max_output` bytes.
///
/// Output beyond the limit is a failure rather than a silent truncation, so a
/// server-side layout change shows up as a transform fallback instead of a
/// half-decoded record.
///
/// # Errors
/// Returns `ProtocolError::DecompressionFailure` if:
/// - The stream is not valid zlib
/// - It inflates to zero bytes
/// - It inflates past `max_output`
pub fn inflate(data: &[u8], max_output: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut reader = ZlibDecoder::new(data).take(max_output as u64 + 1);

    // Read in chunks to enforce size limit
    let mut buffer = [0u8; 4096];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break, // EOF
            Ok(n) => {
                out.extend_from_slice(&buffer[..n]);
                if out.len() > max_output {
                    return Err(ProtocolError::DecompressionFailure);
                }
            }
            Err(_) => return Err(ProtocolError::DecompressionFailure),
        }
    }

    if out.is_empty() {
        return Err(ProtocolError::DecompressionFailure);
    }
    Ok(out)
}

/// Inflate if possible, otherwise hand back the input unchanged.
/// Returns the output bytes and a flag indicating whether inflate succeeded.
pub fn maybe_inflate(data: &[u8], max_output: usize) -> (Vec<u8>, bool) {
    match inflate(data, max_output) {
        Ok(out) => (out, true),
        Err(_) => (data.to_vec(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_zlib_roundtrip() {
        let original = b"Hello, World! This is a test of zlib compression.".repeat(8);
        let compressed = deflate(&original).unwrap();
        assert!(compressed.len() < original.len());
        // zlib header: CMF byte for deflate with 32K window
        assert_eq!(compressed[0], 0x78);
        let decompressed = inflate(&compressed, 4096).unwrap();
        assert_eq!(original, decompressed);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_zero_output_is_failure() {
        let compressed = deflate(&[]).unwrap();
        assert!(matches!(
            inflate(&compressed, 1024),
            Err(ProtocolError::DecompressionFailure)
        ));
    }

    #[test]
    fn test_garbage_is_failure() {
        let result = inflate(&[0xFF, 0x00, 0x12, 0x34, 0x56], 1024);
        assert!(result.is_err(), "Should reject malformed compressed data");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_size_limit_enforcement() {
        let compressed = deflate(&vec![0u8; 10_000]).unwrap();
        assert!(inflate(&compressed, 9_999).is_err());
        assert_eq!(inflate(&compressed, 10_000).unwrap().len(), 10_000);
    }

    #[test]
    fn test_maybe_inflate_falls_back() {
        let raw = b"not compressed at all";
        let (out, inflated) = maybe_inflate(raw, 1024);
        assert!(!inflated);
        assert_eq!(out, raw);
    }
}
