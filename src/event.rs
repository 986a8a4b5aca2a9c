//! Keyed events produced by a source's key-extraction step.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::protocol::messages as pb;
use crate::protocol::{from_optional_timestamp, to_timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedEvent {
    pub key: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub value: Vec<u8>,
}

impl KeyedEvent {
    pub fn new(key: impl Into<Vec<u8>>, timestamp: DateTime<Utc>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            timestamp,
            value: value.into(),
        }
    }
}

impl From<KeyedEvent> for pb::KeyedEvent {
    fn from(event: KeyedEvent) -> Self {
        Self {
            key: event.key,
            timestamp: Some(to_timestamp(&event.timestamp)),
            value: event.value,
        }
    }
}

impl TryFrom<pb::KeyedEvent> for KeyedEvent {
    type Error = Error;

    /// A missing timestamp becomes the Unix epoch.
    fn try_from(event: pb::KeyedEvent) -> Result<Self> {
        let timestamp = from_optional_timestamp(event.timestamp.as_ref())
            .ok_or_else(|| Error::bad_request("keyed event timestamp out of range"))?;
        Ok(Self {
            key: event.key,
            timestamp,
            value: event.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use prost_types::Timestamp;

    #[test]
    fn test_wire_round_trip() {
        let event = KeyedEvent::new("k", Utc.timestamp_opt(100, 5).unwrap(), "v");
        let wire = pb::KeyedEvent::from(event.clone());
        assert_eq!(wire.timestamp.as_ref().map(|t| t.nanos), Some(5));
        assert_eq!(KeyedEvent::try_from(wire).unwrap(), event);
    }

    #[test]
    fn test_missing_timestamp_is_epoch() {
        let wire = pb::KeyedEvent {
            key: b"k".to_vec(),
            timestamp: None,
            value: Vec::new(),
        };
        let event = KeyedEvent::try_from(wire).unwrap();
        assert_eq!(event.timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_out_of_range_is_bad_request() {
        let wire = pb::KeyedEvent {
            key: b"k".to_vec(),
            timestamp: Some(Timestamp {
                seconds: i64::MAX,
                nanos: 0,
            }),
            value: Vec::new(),
        };
        assert!(KeyedEvent::try_from(wire).unwrap_err().is_bad_request());
    }
}
