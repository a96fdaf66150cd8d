//! # Geographic Utilities
//!
//! Great-circle distance helpers used to measure trips.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points, in meters |
//! | [`haversine_distance_miles`] | Same, in statute miles |
//! | [`polyline_length_miles`] | Total length of a GPS track in miles |
//! | [`meters_to_miles`] | Unit conversion |
//!
//! ## Example
//!
//! ```rust
//! use walk_mapper::{GpsPoint, geo_utils};
//!
//! let track = vec![
//!     GpsPoint::new(40.0, -73.0),
//!     GpsPoint::new(40.1, -73.1),
//! ];
//!
//! let miles = geo_utils::polyline_length_miles(&track);
//! assert!((miles - 8.70).abs() < 0.01);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a spherical Earth with the mean
//! radius used by [`geo::Haversine`] (6,371,008.8 m). Coordinates are WGS84
//! degrees.

use geo::{Distance, Haversine, Point};

use crate::GpsPoint;

/// Meters in one international statute mile.
pub const METERS_PER_MILE: f64 = 1_609.344;

/// Calculate the great-circle distance between two GPS points in meters.
///
/// # Example
///
/// ```rust
/// use walk_mapper::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Great-circle distance between two GPS points in miles.
#[inline]
pub fn haversine_distance_miles(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    meters_to_miles(haversine_distance(p1, p2))
}

/// Total length of a track in miles.
///
/// Sums the distance between each consecutive pair of points, so empty and
/// single-point tracks have length 0.
pub fn polyline_length_miles(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance_miles(&w[0], &w[1]))
        .sum()
}

#[inline]
pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // New York to Los Angeles is about 2,445 miles
        let nyc = GpsPoint::new(40.7128, -74.0060);
        let la = GpsPoint::new(34.0522, -118.2437);
        assert!(approx_eq(haversine_distance_miles(&nyc, &la), 2445.0, 10.0));
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // 1 degree of arc on a 3958.76 mile sphere
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(1.0, 0.0);
        assert!(approx_eq(haversine_distance_miles(&a, &b), 69.09, 0.01));
    }

    #[test]
    fn test_polyline_length_empty_and_single() {
        assert_eq!(polyline_length_miles(&[]), 0.0);
        assert_eq!(polyline_length_miles(&[GpsPoint::new(40.0, -73.0)]), 0.0);
    }

    #[test]
    fn test_polyline_length_stationary() {
        let track = vec![GpsPoint::new(40.0, -73.0); 5];
        assert_eq!(polyline_length_miles(&track), 0.0);
    }

    #[test]
    fn test_polyline_length_sums_segments() {
        let a = GpsPoint::new(40.0, -73.0);
        let b = GpsPoint::new(40.1, -73.1);
        let c = GpsPoint::new(40.2, -73.0);
        let expected = haversine_distance_miles(&a, &b) + haversine_distance_miles(&b, &c);
        assert!(approx_eq(polyline_length_miles(&[a, b, c]), expected, 1e-9));
    }

    #[test]
    fn test_polyline_length_reversal_symmetric() {
        let track = vec![
            GpsPoint::new(51.5074, -0.1278),
            GpsPoint::new(51.5080, -0.1290),
            GpsPoint::new(51.5090, -0.1300),
            GpsPoint::new(51.5110, -0.1320),
        ];
        let mut reversed = track.clone();
        reversed.reverse();
        assert!(approx_eq(
            polyline_length_miles(&track),
            polyline_length_miles(&reversed),
            1e-9
        ));
    }

    #[test]
    fn test_meters_to_miles() {
        assert!(approx_eq(meters_to_miles(1_609.344), 1.0, 1e-12));
    }
}
