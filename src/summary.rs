//! Per-trip geometry, distance and duration.

use chrono::TimeDelta;
use log::{info, warn};

use crate::error::{Error, Result};
use crate::geo_utils::polyline_length_miles;
use crate::{GpsPoint, Trip};

/// Everything needed to render and describe one trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripSummary {
    /// Index of the trip this summary was built from.
    pub index: usize,
    /// `[longitude, latitude]` per fix, in trip order.
    pub path: Vec<[f64; 2]>,
    /// Sum of great-circle distances between consecutive fixes.
    pub total_distance_miles: f64,
    /// Last fix timestamp minus first fix timestamp. Negative when the trip
    /// arrived in reverse chronological order.
    pub total_duration: TimeDelta,
}

impl TripSummary {
    /// Summarize a trip.
    ///
    /// Returns [`Error::TripTooShort`] for trips with fewer than two fixes,
    /// which cannot be drawn as a path.
    pub fn from_trip(trip: &Trip) -> Result<Self> {
        let (first, last) = match trip.fixes.as_slice() {
            [first, .., last] => (first, last),
            _ => {
                return Err(Error::TripTooShort {
                    index: trip.index,
                    fixes: trip.len(),
                })
            }
        };

        let path = trip
            .fixes
            .iter()
            .map(|f| [f.longitude, f.latitude])
            .collect();

        let points: Vec<GpsPoint> = trip.fixes.iter().map(|f| f.point()).collect();

        Ok(Self {
            index: trip.index,
            path,
            total_distance_miles: polyline_length_miles(&points),
            total_duration: last.timestamp - first.timestamp,
        })
    }
}

/// Summarize a stream of trips, logging and dropping the ones too short to draw.
pub fn summarize_trips<I>(trips: I) -> impl Iterator<Item = TripSummary>
where
    I: IntoIterator<Item = Trip>,
{
    trips.into_iter().filter_map(|trip| match TripSummary::from_trip(&trip) {
        Ok(summary) => {
            info!(
                "[Trip {}] {} fixes, {:.3} mi in {}s",
                summary.index,
                summary.path.len(),
                summary.total_distance_miles,
                summary.total_duration.num_seconds()
            );
            Some(summary)
        }
        Err(e) => {
            warn!("{}", e);
            None
        }
    })
}
