//! Decoding of tokenized records into typed fixes.

use chrono::{DateTime, FixedOffset};
use csv::StringRecord;
use log::warn;

use crate::error::{DecodeError, FieldError};
use crate::FixRecord;

/// Literal layout of the timestamp field, e.g. `2020-01-01 10:00:00 +0000`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

const TIMESTAMP_LEN: usize = "2020-01-01 10:00:00 +0000".len();

/// Decode one record into a fix.
///
/// Field 0 is the timestamp, 1 the latitude and 2 the longitude; anything
/// after that is ignored. All three fields are checked so that every problem
/// with a record is reported at once.
pub fn decode_record(record: &StringRecord) -> Result<FixRecord, DecodeError> {
    if record.len() < 3 {
        return Err(DecodeError::TooFewFields { record: owned(record) });
    }

    let mut errors = Vec::with_capacity(3);

    let timestamp = parse_timestamp(record).map_err(|e| errors.push(e)).ok();
    let latitude = parse_coordinate(record, 1).map_err(|e| errors.push(e)).ok();
    let longitude = parse_coordinate(record, 2).map_err(|e| errors.push(e)).ok();

    match (timestamp, latitude, longitude) {
        (Some(timestamp), Some(latitude), Some(longitude)) => {
            Ok(FixRecord::new(timestamp, latitude, longitude))
        }
        _ => Err(DecodeError::InvalidFields { errors }),
    }
}

/// Decode a stream of records, logging and dropping the ones that fail.
pub fn decode_records<I>(records: I) -> impl Iterator<Item = FixRecord>
where
    I: IntoIterator<Item = StringRecord>,
{
    records.into_iter().filter_map(|record| match decode_record(&record) {
        Ok(fix) => Some(fix),
        Err(DecodeError::InvalidFields { errors }) => {
            for e in &errors {
                warn!("{}", e);
            }
            None
        }
        Err(e) => {
            warn!("{}", e);
            None
        }
    })
}

fn parse_timestamp(record: &StringRecord) -> Result<DateTime<FixedOffset>, FieldError> {
    let value = &record[0];
    if !has_timestamp_layout(value) {
        return Err(FieldError::TimestampLayout {
            value: value.to_string(),
            record: owned(record),
        });
    }
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| FieldError::Timestamp {
        value: value.to_string(),
        record: owned(record),
        source,
    })
}

/// chrono accepts single-digit fields, runs of whitespace and `+hh:mm`
/// offsets for this format, so the fixed-width shape is checked first.
fn has_timestamp_layout(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == TIMESTAMP_LEN
        && bytes.iter().enumerate().all(|(i, &b)| match i {
            4 | 7 => b == b'-',
            10 | 19 => b == b' ',
            13 | 16 => b == b':',
            20 => b == b'+' || b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn parse_coordinate(record: &StringRecord, index: usize) -> Result<f64, FieldError> {
    let value = &record[index];
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(FieldError::NonFinite {
            field: if index == 1 { "latitude" } else { "longitude" },
            value: value.to_string(),
            record: owned(record),
        }),
        Err(source) if index == 1 => Err(FieldError::Latitude {
            value: value.to_string(),
            record: owned(record),
            source,
        }),
        Err(source) => Err(FieldError::Longitude {
            value: value.to_string(),
            record: owned(record),
            source,
        }),
    }
}

fn owned(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}
