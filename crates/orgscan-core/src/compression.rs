use crate::{OrgScanError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Only compress payloads larger than this (1 KiB); small values are
/// stored raw.
const COMPRESSION_THRESHOLD: usize = 1024;

/// Zstd level 3 is the best performance/ratio balance for cache writes.
const COMPRESSION_LEVEL: i32 = 3;

/// Prefix identifying compressed Base64 payloads.
const COMPRESSION_PREFIX: &str = "zstd:";

/// Reversible string transform applied to every cache payload. The cache
/// only requires `decompress(compress(v)) == v`; the host environment may
/// supply its own implementation.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &str) -> Result<String>;
    fn decompress(&self, data: &str) -> Result<String>;
}

/// Default compressor: zstd with Base64 encoding for safe storage in
/// string fields, skipping payloads below the threshold.
#[derive(Debug, Clone, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &str) -> Result<String> {
        if data.len() < COMPRESSION_THRESHOLD {
            return Ok(data.to_string());
        }
        let compressed = zstd::encode_all(data.as_bytes(), COMPRESSION_LEVEL)
            .map_err(|e| OrgScanError::Compression(e.to_string()))?;
        Ok(format!("{}{}", COMPRESSION_PREFIX, BASE64.encode(compressed)))
    }

    fn decompress(&self, data: &str) -> Result<String> {
        let Some(encoded) = data.strip_prefix(COMPRESSION_PREFIX) else {
            return Ok(data.to_string());
        };
        let compressed = BASE64
            .decode(encoded)
            .map_err(|e| OrgScanError::Compression(e.to_string()))?;
        let decompressed = zstd::decode_all(&compressed[..])
            .map_err(|e| OrgScanError::Compression(e.to_string()))?;
        String::from_utf8(decompressed).map_err(|e| OrgScanError::Compression(e.to_string()))
    }
}

/// Pass-through compressor for tests and debugging.
#[derive(Debug, Clone, Default)]
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn compress(&self, data: &str) -> Result<String> {
        Ok(data.to_string())
    }

    fn decompress(&self, data: &str) -> Result<String> {
        Ok(data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payloads_stay_raw() {
        let c = ZstdCompressor;
        let out = c.compress("hello").unwrap();
        assert_eq!(out, "hello");
        assert_eq!(c.decompress(&out).unwrap(), "hello");
    }

    #[test]
    fn large_payloads_round_trip() {
        let c = ZstdCompressor;
        let big = "x".repeat(16 * 1024);
        let out = c.compress(&big).unwrap();
        assert!(out.starts_with("zstd:"));
        assert!(out.len() < big.len());
        assert_eq!(c.decompress(&out).unwrap(), big);
    }

    #[test]
    fn decompress_rejects_corrupt_base64() {
        let c = ZstdCompressor;
        assert!(c.decompress("zstd:@@not-base64@@").is_err());
    }
}
