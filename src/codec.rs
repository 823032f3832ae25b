//! Value codecs
//!
//! A codec turns cached values into the bytes stored in the backend and back.
//! Any failure in either direction is a [`SerializationFault`].

use serde::{Serialize, de::DeserializeOwned};

use crate::error::SerializationFault;

/// Encode/decode capability used by the read-through cache.
pub trait Codec: Send + Sync + 'static {
    fn encode<V: Serialize>(&self, value: &V) -> Result<Vec<u8>, SerializationFault>;

    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V, SerializationFault>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<V: Serialize>(&self, value: &V) -> Result<Vec<u8>, SerializationFault> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V, SerializationFault> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Account {
        id: String,
        balance: i64,
    }

    #[test]
    fn test_json_codec_roundtrip() {
        let account = Account {
            id: "acc-1".to_owned(),
            balance: 42,
        };
        let bytes = JsonCodec.encode(&account).unwrap();
        let decoded: Account = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn test_truncated_bytes_fail_to_decode() {
        let bytes = JsonCodec.encode(&vec![1, 2, 3]).unwrap();
        let result = JsonCodec.decode::<Vec<i32>>(&bytes[..bytes.len() - 1]);
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_mismatch_fails_to_decode() {
        let bytes = JsonCodec.encode(&"just a string").unwrap();
        assert!(JsonCodec.decode::<Account>(&bytes).is_err());
    }

    #[test]
    fn test_non_string_map_keys_fail_to_encode() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON object keys");
        assert!(JsonCodec.encode(&map).is_err());
    }
}
