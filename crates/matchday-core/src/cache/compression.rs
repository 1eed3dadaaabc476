//! Transparent gzip compression of cached JSON values.
//!
//! Values are serialized to JSON bytes first. When the serialized form is above the
//! configured threshold it is gzip-compressed, and the compressed form is kept only when
//! it saves at least 20% of the original size.

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde_json::Value;
use std::io::{Read, Write};
use thiserror::Error;

/// Compressed size must be at most `MAX_RATIO_NUM / MAX_RATIO_DEN` of the original.
const MAX_RATIO_NUM: usize = 4;
const MAX_RATIO_DEN: usize = 5;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("gzip stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to deserialize decompressed value: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Stored form of a cache value.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Raw(Value),
    Compressed(Vec<u8>),
}

/// Outcome of encoding a value for storage.
#[derive(Debug)]
pub(crate) struct Encoded {
    pub payload: Payload,
    pub original_size: usize,
    pub compressed_size: Option<usize>,
}

/// Encodes `value`, compressing it when it is large and compresses well.
///
/// Never fails: any serialization or compression error falls back to raw storage.
pub(crate) fn encode(value: Value, threshold: usize, enabled: bool) -> Encoded {
    let bytes = match serde_json::to_vec(&value) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %CompressionError::Serialize(e), "storing cache value raw");
            return Encoded { payload: Payload::Raw(value), original_size: 0, compressed_size: None };
        }
    };

    let original_size = bytes.len();
    if !enabled || original_size <= threshold {
        return Encoded { payload: Payload::Raw(value), original_size, compressed_size: None };
    }

    match gzip(&bytes) {
        Ok(compressed) if compressed.len() * MAX_RATIO_DEN <= original_size * MAX_RATIO_NUM => {
            let compressed_size = compressed.len();
            Encoded {
                payload: Payload::Compressed(compressed),
                original_size,
                compressed_size: Some(compressed_size),
            }
        }
        Ok(_) => Encoded { payload: Payload::Raw(value), original_size, compressed_size: None },
        Err(e) => {
            tracing::warn!(error = %e, size = original_size, "compression failed, storing raw");
            Encoded { payload: Payload::Raw(value), original_size, compressed_size: None }
        }
    }
}

/// Restores the value held by `payload`.
pub(crate) fn decode(payload: Payload) -> Result<Value, CompressionError> {
    match payload {
        Payload::Raw(value) => Ok(value),
        Payload::Compressed(bytes) => {
            let mut decoder = GzDecoder::new(bytes.as_slice());
            let mut json = Vec::new();
            decoder.read_to_end(&mut json)?;
            serde_json::from_slice(&json).map_err(CompressionError::Deserialize)
        }
    }
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repetitive_value() -> Value {
        let matches: Vec<Value> = (0..200)
            .map(|i| json!({"home": "Flamengo", "away": "Palmeiras", "round": i, "status": "finished"}))
            .collect();
        json!({ "league": "brasileirao", "matches": matches })
    }

    #[test]
    fn test_small_value_stays_raw() {
        let encoded = encode(json!({"id": 1}), 1024, true);
        assert!(matches!(encoded.payload, Payload::Raw(_)));
        assert!(encoded.compressed_size.is_none());
    }

    #[test]
    fn test_large_repetitive_value_is_compressed() {
        let value = repetitive_value();
        let encoded = encode(value.clone(), 1024, true);

        let compressed_size = encoded.compressed_size.expect("value should compress");
        assert!(compressed_size * 5 <= encoded.original_size * 4);
        assert_eq!(decode(encoded.payload).unwrap(), value);
    }

    #[test]
    fn test_compression_disabled() {
        let encoded = encode(repetitive_value(), 1024, false);
        assert!(matches!(encoded.payload, Payload::Raw(_)));
    }

    #[test]
    fn test_corrupt_payload_fails_to_decode() {
        let result = decode(Payload::Compressed(vec![1, 2, 3, 4]));
        assert!(result.is_err());
    }
}
