//! # Walk Mapper
//!
//! Turn a log of timestamped GPS fixes into walking trips and render each trip
//! as a static map image.
//!
//! The pipeline reads delimited text, decodes each row into a [`FixRecord`],
//! splits the fixes into [`Trip`]s wherever two consecutive fixes are more than
//! an hour apart, summarizes every trip (path, distance in miles, duration),
//! builds a Mapbox static-image URL for it and finally downloads the image
//! into a temporary `.png` file.
//!
//! ## Quick Start
//!
//! ```rust
//! use walk_mapper::{decode_records, read_records, TripSegmenter, TripSummary, default_trip_gap};
//!
//! let input = "2020-01-01 10:00:00 +0000;40.0;-73.0\n\
//!              2020-01-01 10:30:00 +0000;40.1;-73.1\n";
//!
//! let fixes = decode_records(read_records(input.as_bytes(), b';'));
//! let trips: Vec<_> = TripSegmenter::new(fixes, default_trip_gap()).collect();
//! assert_eq!(trips.len(), 1);
//!
//! let summary = TripSummary::from_trip(&trips[0]).unwrap();
//! assert_eq!(summary.path, vec![[-73.0, 40.0], [-73.1, 40.1]]);
//! assert_eq!(summary.total_duration.num_minutes(), 30);
//! ```

use chrono::{DateTime, FixedOffset};

pub mod decoder;
pub mod error;
pub mod geo_utils;
pub mod http;
pub mod pipeline;
pub mod reader;
pub mod request;
pub mod retry;
pub mod segment;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_log;

pub use decoder::{decode_record, decode_records, TIMESTAMP_FORMAT};
pub use error::{DecodeError, Error, FieldError, Result};
pub use http::{render_all, MapRenderer, RenderResult, RenderStats, ResultCallback};
pub use pipeline::{render_requests, run, PipelineConfig};
pub use reader::read_records;
pub use request::{LineStringGeometry, RenderConfig, RenderRequest, RequestBuilder};
pub use retry::{Backoff, RetryPolicy};
pub use segment::{default_trip_gap, TripSegmenter, DEFAULT_TRIP_GAP_MINUTES};
pub use summary::{summarize_trips, TripSummary};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A single timestamped GPS reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub latitude: f64,
    pub longitude: f64,
}

impl FixRecord {
    pub fn new(timestamp: DateTime<FixedOffset>, latitude: f64, longitude: f64) -> Self {
        Self { timestamp, latitude, longitude }
    }

    /// Position of the fix without its timestamp.
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A run of fixes with no gap above the segmentation threshold.
///
/// Fixes are kept in arrival order, which is not necessarily chronological.
/// A trip straight out of the segmenter may hold fewer than two fixes; such
/// trips are rejected by [`TripSummary::from_trip`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    /// Position of this trip in the segmenter's output, starting at 0.
    pub index: usize,
    pub fixes: Vec<FixRecord>,
}

impl Trip {
    pub fn new(index: usize, fixes: Vec<FixRecord>) -> Self {
        Self { index, fixes }
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
