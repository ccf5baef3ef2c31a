//! Encoded timestamp parsing.
//!
//! Timestamps are stored as plain text with a leading `x` so the spreadsheet
//! does not reinterpret the cell as a native date. The remainder is a date,
//! optionally followed by a time, read as UTC. Seconds may carry a fraction,
//! which is truncated, and the time may end in `Z`.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::DecodeError;

/// Marker that prefixes every encoded timestamp.
pub const TIMESTAMP_MARKER: char = 'x';

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d-%H:%M:%S%.f",
    "%Y-%m-%d-%H:%M",
];

/// Seconds since the epoch for an encoded timestamp, or `None` when the input
/// is empty, lacks the marker, or has an unparseable remainder.
pub fn parse_encoded_timestamp(encoded: &str) -> Option<i64> {
    decode(encoded).ok()
}

/// Like [`parse_encoded_timestamp`], reporting why decoding failed.
pub fn decode(encoded: &str) -> Result<i64, DecodeError> {
    let invalid = || DecodeError::Timestamp {
        raw: encoded.to_owned(),
    };
    let body = encoded.strip_prefix(TIMESTAMP_MARKER).ok_or_else(invalid)?;
    let body = body.strip_suffix('Z').unwrap_or(body);

    if let Ok(date) = NaiveDate::parse_from_str(body, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return Ok(midnight.and_utc().timestamp());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(body, format).ok())
        .map(|datetime| datetime.and_utc().timestamp())
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("x1970-1-1", 0)]
    #[case("x1970-1-1 00:01:00", 60)]
    #[case("x1970-01-02", 86_400)]
    #[case("x2017-03-28", 1_490_659_200)]
    #[case("x2017-03-29-21:22", 1_490_822_520)]
    #[case("x2017-03-29T21:22:05", 1_490_822_525)]
    #[case("x2017-03-29T21:22:05Z", 1_490_822_525)]
    #[case("x2017-03-29 21:22:05.750", 1_490_822_525)]
    #[case("x2017-03-29T21:22:05.123456Z", 1_490_822_525)]
    #[case("x2017-03-29T21:22Z", 1_490_822_520)]
    #[case("x2017-03-29Z", 1_490_745_600)]
    fn parses(#[case] encoded: &str, #[case] expected: i64) {
        assert_eq!(parse_encoded_timestamp(encoded), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("x")]
    #[case("1970-1-1")]
    #[case("x1970-1-1 BADDATA")]
    #[case("x1970-13-01")]
    #[case("X1970-1-1")]
    #[case("xyesterday")]
    #[case("x2017-03-29 21:22:05ZZ")]
    fn rejects(#[case] encoded: &str) {
        assert_eq!(parse_encoded_timestamp(encoded), None);
    }

    #[test]
    fn decode_reports_raw_input() {
        let err = decode("1970-1-1").unwrap_err();
        assert_eq!(
            err,
            DecodeError::Timestamp {
                raw: "1970-1-1".to_owned()
            }
        );
    }
}
