//! Versioned record envelopes.
//!
//! On disk, every record is `bincode((version: u16, payload: Vec<u8>))`.
//! The payload is itself bincode of whatever layout that version used.
//! Types opt in through [`VersionedRecord`], which names the current
//! version and knows how to lift older payloads into the current layout.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::TokenSnapshot;

/// Errors raised while encoding, decoding or migrating a record.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The record was written by a newer build, or an older layout that
    /// nothing knows how to upgrade anymore.
    #[error("unsupported schema version {found} for {record} (current is {current})")]
    UnsupportedVersion {
        /// Type of record being decoded.
        record: &'static str,
        /// Version found on disk.
        found: u16,
        /// Version this build writes.
        current: u16,
    },
}

/// The raw on-disk envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u16,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Decodes the payload as `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, SchemaError> {
        bincode::deserialize(&self.payload).map_err(|e| SchemaError::Encoding(e.to_string()))
    }
}

/// A record with a versioned on-disk layout.
pub trait VersionedRecord: Serialize + DeserializeOwned {
    /// Name used in error messages.
    const RECORD: &'static str;

    /// Version written by this build.
    const CURRENT_VERSION: u16;

    /// Upgrades an envelope written with an older version. The default
    /// knows no older layouts.
    fn upgrade(envelope: &Envelope) -> Result<Self, SchemaError> {
        Err(SchemaError::UnsupportedVersion {
            record: Self::RECORD,
            found: envelope.version,
            current: Self::CURRENT_VERSION,
        })
    }
}

/// Encodes `record` at its current version.
pub fn encode_record<T: VersionedRecord>(record: &T) -> Result<Vec<u8>, SchemaError> {
    let payload = bincode::serialize(record).map_err(|e| SchemaError::Encoding(e.to_string()))?;
    let envelope = Envelope {
        version: T::CURRENT_VERSION,
        payload,
    };
    bincode::serialize(&envelope).map_err(|e| SchemaError::Encoding(e.to_string()))
}

/// Decodes a record, upgrading older layouts on the way.
pub fn decode_record<T: VersionedRecord>(bytes: &[u8]) -> Result<T, SchemaError> {
    let envelope: Envelope =
        bincode::deserialize(bytes).map_err(|e| SchemaError::Encoding(e.to_string()))?;
    if envelope.version == T::CURRENT_VERSION {
        envelope.payload()
    } else if envelope.version > T::CURRENT_VERSION {
        Err(SchemaError::UnsupportedVersion {
            record: T::RECORD,
            found: envelope.version,
            current: T::CURRENT_VERSION,
        })
    } else {
        T::upgrade(&envelope)
    }
}

impl VersionedRecord for TokenSnapshot {
    const RECORD: &'static str = "token";
    const CURRENT_VERSION: u16 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u64,
        label: String,
    }

    impl VersionedRecord for Counter {
        const RECORD: &'static str = "counter";
        const CURRENT_VERSION: u16 = 2;

        fn upgrade(envelope: &Envelope) -> Result<Self, SchemaError> {
            match envelope.version {
                1 => {
                    let value: u64 = envelope.payload()?;
                    Ok(Counter {
                        value,
                        label: "legacy".into(),
                    })
                }
                found => Err(SchemaError::UnsupportedVersion {
                    record: Self::RECORD,
                    found,
                    current: Self::CURRENT_VERSION,
                }),
            }
        }
    }

    fn envelope_bytes(version: u16, payload: Vec<u8>) -> Vec<u8> {
        bincode::serialize(&Envelope { version, payload }).unwrap()
    }

    #[test]
    fn current_version_round_trips() {
        let record = Counter {
            value: 7,
            label: "x".into(),
        };
        let bytes = encode_record(&record).unwrap();
        assert_eq!(decode_record::<Counter>(&bytes).unwrap(), record);
    }

    #[test]
    fn older_version_is_upgraded() {
        // Version 1 stored the bare counter value.
        let old = bincode::serialize(&3u64).unwrap();
        let decoded: Counter = decode_record(&envelope_bytes(1, old)).unwrap();
        assert_eq!(decoded.label, "legacy");
        assert_eq!(decoded.value, 3);
    }

    #[test]
    fn newer_version_is_rejected() {
        let err = decode_record::<Counter>(&envelope_bytes(9, vec![])).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnsupportedVersion { found: 9, current: 2, .. }
        ));
    }

    #[test]
    fn garbage_is_an_encoding_error() {
        assert!(matches!(
            decode_record::<Counter>(&[0xff]),
            Err(SchemaError::Encoding(_))
        ));
    }
}
