//! Conversions between `chrono` instants and protobuf timestamps.

use chrono::{DateTime, Utc};
use prost_types::Timestamp;

/// Convert an instant to its protobuf representation.
///
/// A leap-second instant carries its extra second in the nanos; the result
/// is normalized so nanos stay below one second.
pub fn to_timestamp(time: &DateTime<Utc>) -> Timestamp {
    let mut ts = Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    };
    ts.normalize();
    ts
}

/// Convert a protobuf timestamp to an instant.
///
/// Unnormalized timestamps (negative or overflowing nanos) are normalized
/// first. Returns `None` when the instant is out of `chrono`'s range.
pub fn from_timestamp(ts: &Timestamp) -> Option<DateTime<Utc>> {
    let mut ts = ts.clone();
    ts.normalize();
    DateTime::from_timestamp(ts.seconds, u32::try_from(ts.nanos).ok()?)
}

/// Like [`from_timestamp`], treating an absent timestamp as the Unix epoch.
pub fn from_optional_timestamp(ts: Option<&Timestamp>) -> Option<DateTime<Utc>> {
    match ts {
        Some(ts) => from_timestamp(ts),
        None => Some(DateTime::<Utc>::UNIX_EPOCH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_round_trip() {
        let time = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::nanoseconds(6);
        let ts = to_timestamp(&time);
        assert_eq!(ts.nanos, 6);
        assert_eq!(from_timestamp(&ts), Some(time));
    }

    #[test]
    fn test_leap_second_is_normalized() {
        let leap = chrono::NaiveDate::from_ymd_opt(2016, 12, 31)
            .unwrap()
            .and_hms_nano_opt(23, 59, 59, 1_500_000_000)
            .unwrap()
            .and_utc();
        let ts = to_timestamp(&leap);
        assert!((0..1_000_000_000).contains(&ts.nanos));
        assert_eq!(ts.seconds, 1_483_228_800);
        assert_eq!(ts.nanos, 500_000_000);

        let decoded = from_timestamp(&ts).unwrap();
        assert_eq!(decoded.to_rfc3339(), "2017-01-01T00:00:00.500+00:00");
    }

    #[test]
    fn test_negative_nanos_are_normalized() {
        let ts = Timestamp {
            seconds: 10,
            nanos: -1,
        };
        let time = from_timestamp(&ts).unwrap();
        assert_eq!(time.timestamp(), 9);
        assert_eq!(time.timestamp_subsec_nanos(), 999_999_999);
    }

    #[test]
    fn test_out_of_range() {
        let ts = Timestamp {
            seconds: i64::MAX,
            nanos: 0,
        };
        assert_eq!(from_timestamp(&ts), None);
    }

    #[test]
    fn test_missing_is_epoch() {
        assert_eq!(
            from_optional_timestamp(None),
            Some(DateTime::<Utc>::UNIX_EPOCH)
        );
    }
}
