//! Error types for the walk-mapper pipeline.
//!
//! Every variant describes the failure of a single unit of work (an input
//! line, a record, a trip or a render request). Callers log the error and
//! drop the unit; nothing here is fatal to a run except the configuration
//! variants, which are raised before any input is read.

use std::fmt;
use thiserror::Error;

/// Errors raised while processing a pipeline unit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A line of input could not be tokenized.
    #[error("could not read record: {0}")]
    Csv(#[from] csv::Error),

    /// A tokenized record did not describe a valid fix.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A trip did not contain enough fixes to form a path.
    #[error("trip {index} must have at least 2 fixes, got {fixes}")]
    TripTooShort { index: usize, fixes: usize },

    /// The trip geometry could not be serialized.
    #[error("could not serialize geometry: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured rendering endpoint is not a usable base URL.
    #[error("invalid rendering endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client failed in a way that is not retried.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The rendering service answered with a non-retryable status.
    #[error("rendering service returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// Every attempt allowed by the retry policy failed.
    #[error("giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The rendered image could not be written to disk.
    #[error("could not write map image: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a record could not be decoded into a fix.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("record must have at least 3 fields {record:?}")]
    TooFewFields { record: Vec<String> },

    #[error("{}", join_fields(.errors))]
    InvalidFields { errors: Vec<FieldError> },
}

/// A single field of a record that failed to parse.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("could not parse time {value:?} for record {record:?}: {source}")]
    Timestamp {
        value: String,
        record: Vec<String>,
        #[source]
        source: chrono::ParseError,
    },

    #[error("time {value:?} for record {record:?} does not match YYYY-MM-DD HH:MM:SS ±HHMM")]
    TimestampLayout { value: String, record: Vec<String> },

    #[error("could not parse latitude {value:?} for record {record:?}: {source}")]
    Latitude {
        value: String,
        record: Vec<String>,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("could not parse longitude {value:?} for record {record:?}: {source}")]
    Longitude {
        value: String,
        record: Vec<String>,
        #[source]
        source: std::num::ParseFloatError,
    },

    /// `NaN` and infinities parse as floats but are not coordinates.
    #[error("{field} {value:?} for record {record:?} is not a finite number")]
    NonFinite {
        field: &'static str,
        value: String,
        record: Vec<String>,
    },
}

fn join_fields(errors: &[FieldError]) -> String {
    struct Joined<'a>(&'a [FieldError]);

    impl fmt::Display for Joined<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (i, e) in self.0.iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{}", e)?;
            }
            Ok(())
        }
    }

    Joined(errors).to_string()
}
