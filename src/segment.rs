//! Splitting a stream of fixes into trips.
//!
//! A new trip starts whenever two consecutive fixes are further apart in time
//! than the gap threshold. The comparison uses the absolute difference, so
//! out-of-order fixes only split a trip if they jump by more than the gap.

use chrono::{DateTime, FixedOffset, TimeDelta};
use std::mem;

use crate::{FixRecord, Trip};

/// Largest time gap, in minutes, allowed between two fixes of the same trip.
pub const DEFAULT_TRIP_GAP_MINUTES: i64 = 60;

/// [`DEFAULT_TRIP_GAP_MINUTES`] as a [`TimeDelta`].
pub fn default_trip_gap() -> TimeDelta {
    TimeDelta::minutes(DEFAULT_TRIP_GAP_MINUTES)
}

/// Iterator adapter grouping fixes into [`Trip`]s.
///
/// The open trip is always emitted when the input ends, even if it holds no
/// fixes, so an empty input produces a single empty trip.
pub struct TripSegmenter<I> {
    fixes: I,
    max_gap: TimeDelta,
    open: Vec<FixRecord>,
    last: Option<DateTime<FixedOffset>>,
    next_index: usize,
    finished: bool,
}

impl<I: Iterator<Item = FixRecord>> TripSegmenter<I> {
    pub fn new<T>(fixes: T, max_gap: TimeDelta) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            fixes: fixes.into_iter(),
            max_gap,
            open: Vec::new(),
            last: None,
            next_index: 0,
            finished: false,
        }
    }

    fn emit(&mut self, fixes: Vec<FixRecord>) -> Trip {
        let trip = Trip::new(self.next_index, fixes);
        self.next_index += 1;
        trip
    }
}

impl<I: Iterator<Item = FixRecord>> Iterator for TripSegmenter<I> {
    type Item = Trip;

    fn next(&mut self) -> Option<Trip> {
        if self.finished {
            return None;
        }

        while let Some(fix) = self.fixes.next() {
            let split = self
                .last
                .map_or(false, |prev| (fix.timestamp - prev).abs() > self.max_gap);
            self.last = Some(fix.timestamp);

            if split {
                let closed = mem::replace(&mut self.open, vec![fix]);
                return Some(self.emit(closed));
            }
            self.open.push(fix);
        }

        self.finished = true;
        let closed = mem::take(&mut self.open);
        Some(self.emit(closed))
    }
}
