//! Converts raw source values into the canonical [`Cell`] textual form:
//! decimals as decimal strings, timestamps as ISO-8601, byte columns as
//! base64, and single-byte character columns through a fixed [`Encoding`].

use base64::Engine;
use chrono::{NaiveDateTime, SecondsFormat};
use encoding_rs::{Encoding, WINDOWS_1252};
use rust_decimal::Decimal;

use crate::error::SyncError;
use crate::model::Cell;

/// The fixed character encoding used for every char/varchar/text column
/// read from the source.
pub const SOURCE_ENCODING: &'static Encoding = WINDOWS_1252;

/// Decodes a raw byte string under [`SOURCE_ENCODING`]. Undecodable bytes
/// are replaced with the Unicode replacement character; the returned
/// [`SyncError::Encoding`] describes the failure for the caller to log or
/// propagate, but the cell itself is always produced -- one bad cell never
/// aborts the row.
pub fn decode_cell(raw: &[u8]) -> (Cell, Option<SyncError>) {
    let (decoded, _, had_errors) = SOURCE_ENCODING.decode(raw);
    let err = had_errors.then(|| {
        SyncError::Encoding(format!(
            "{} byte sequence contained characters undecodable under {}",
            raw.len(),
            SOURCE_ENCODING.name()
        ))
    });
    (Cell(decoded.into_owned()), err)
}

/// Encodes a byte column (`varbinary`/`image`) as base64, chosen over raw
/// single-byte stuffing for determinism and safe round-tripping through CSV.
pub fn encode_bytes(raw: &[u8]) -> Cell {
    Cell(base64::engine::general_purpose::STANDARD.encode(raw))
}

/// Decodes a base64-encoded byte column back to raw bytes.
pub fn decode_bytes(cell: &Cell) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(&cell.0)
}

/// Canonical decimal-string form of a decimal/numeric/money column.
pub fn encode_decimal(value: Decimal) -> Cell {
    Cell(value.normalize().to_string())
}

/// ISO-8601 form of a datetime/datetime2/smalldatetime column.
pub fn encode_timestamp(value: NaiveDateTime) -> Cell {
    Cell(value.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_clean_windows_1252_bytes() {
        let (cell, err) = decode_cell(b"Sant\xe9");
        assert_eq!(cell.0, "Sant\u{e9}");
        assert!(err.is_none());
    }

    #[test]
    fn substitutes_undecodable_bytes_and_reports_an_encoding_error() {
        // 0x81 is unassigned in windows-1252 and decodes to the replacement
        // character rather than erroring.
        let (cell, err) = decode_cell(&[b'A', 0x81, b'B']);
        assert_eq!(cell.0, "A\u{fffd}B");
        assert!(matches!(err, Some(SyncError::Encoding(_))));
    }

    #[test]
    fn byte_column_round_trips_through_base64() {
        let raw = vec![0u8, 1, 2, 255, 254, 10];
        let cell = encode_bytes(&raw);
        assert_eq!(decode_bytes(&cell).unwrap(), raw);
    }

    #[test]
    fn decimal_normalizes_trailing_zeros() {
        let d: Decimal = "12.500".parse().unwrap();
        assert_eq!(encode_decimal(d).0, "12.5");
    }

    #[test]
    fn timestamp_formats_as_iso8601() {
        let ts = NaiveDateTime::parse_from_str("2026-01-02 03:04:05", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(encode_timestamp(ts).0, "2026-01-02T03:04:05Z");
    }
}
