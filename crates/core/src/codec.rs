//! The single serialisation boundary between typed records and store values.
//!
//! Records (player state, vote sheets, provisional picks, match results) are
//! stored as JSON strings. Lock owner values are plain strings and never go
//! through this module.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::store::KeyValueStore;

/// Encode a record into its stored representation.
pub fn encode<T: Serialize>(record: &T) -> StoreResult<String> {
    serde_json::to_string(record).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Decode a stored value into a record, naming the key on failure.
pub fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> StoreResult<T> {
    serde_json::from_str(raw).map_err(|e| StoreError::Codec(format!("{key}: {e}")))
}

/// Read and decode the record at `key`.
pub async fn read_record<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => decode(key, &raw).map(Some),
        None => Ok(None),
    }
}

/// Encode and write the record at `key`.
pub async fn write_record<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    record: &T,
    ttl: Option<Duration>,
) -> StoreResult<()> {
    let raw = encode(record)?;
    store.set(key, &raw, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player_state::{PlayerState, PlayerStateRecord};

    #[test]
    fn player_state_record_survives_codec() {
        let record = PlayerStateRecord::new(7, PlayerState::InDraft);
        let raw = encode(&record).unwrap();
        assert!(raw.contains("\"IN_DRAFT\""));

        let back: PlayerStateRecord = decode("player:7:state", &raw).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn decode_error_names_the_key() {
        let err = decode::<PlayerStateRecord>("player:9:state", "not json").unwrap_err();
        assert!(matches!(err, StoreError::Codec(ref m) if m.starts_with("player:9:state")));
    }
}
