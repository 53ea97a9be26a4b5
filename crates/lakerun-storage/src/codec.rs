//! Serialization of typed task results into object payloads.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Payload encoding for typed values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Human-readable JSON.
    #[default]
    Json,
    /// Compact binary encoding. Readers must use the same Rust type.
    Bincode,
}

impl Codec {
    pub fn encode<T: Serialize + ?Sized>(self, key: &str, value: &T) -> StorageResult<Bytes> {
        let encoded = match self {
            Self::Json => serde_json::to_vec(value).map_err(|e| codec_error(key, e)),
            Self::Bincode => bincode::serialize(value).map_err(|e| codec_error(key, e)),
        }?;
        Ok(Bytes::from(encoded))
    }

    pub fn decode<T: DeserializeOwned>(self, key: &str, payload: &[u8]) -> StorageResult<T> {
        match self {
            Self::Json => serde_json::from_slice(payload).map_err(|e| codec_error(key, e)),
            Self::Bincode => bincode::deserialize(payload).map_err(|e| codec_error(key, e)),
        }
    }
}

fn codec_error(key: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Codec {
        key: key.to_string(),
        reason: err.to_string(),
    }
}
