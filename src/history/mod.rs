//! # Temperature History
//!
//! Bounded, time-ordered window of temperature readings feeding the display
//! series.
//!
//! This module handles:
//! - Appending live readings with overwrite-oldest eviction
//! - Back-filling timestamps for history replayed by the peer
//! - Producing labelled points for a line chart

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Format used for chart labels
pub const LABEL_FORMAT: &str = "%H:%M:%S";

/// A single temperature sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Temperature in °C
    pub value: f64,

    /// When the sample was taken (or back-filled to)
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    /// Create a new reading
    pub fn new(value: f64, observed_at: DateTime<Utc>) -> Self {
        Self { value, observed_at }
    }
}

/// One point of the display series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Timestamp label (`HH:MM:SS`)
    pub label: String,

    /// Temperature in °C
    pub value: f64,
}

/// Capacity-bounded FIFO of readings, oldest first
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use thermostat_link::history::{HistoryBuffer, Reading};
///
/// let mut history = HistoryBuffer::new(2);
/// let now = Utc::now();
/// history.append(Reading::new(20.0, now));
/// history.append(Reading::new(20.5, now));
/// history.append(Reading::new(21.0, now));
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.latest().map(|r| r.value), Some(21.0));
/// ```
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `capacity` readings
    ///
    /// A zero capacity buffer accepts appends but never stores anything.
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest one when full
    pub fn append(&mut self, reading: Reading) {
        if self.capacity == 0 {
            return;
        }

        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// Append a replayed batch of samples ending at `anchor`
    ///
    /// # Arguments
    ///
    /// * `values` - Samples ordered oldest to newest
    /// * `anchor` - Timestamp assigned to the newest sample
    /// * `interval_seconds` - Spacing between consecutive samples
    ///
    /// The `i`-th of `k` values is stamped `anchor - interval * (k - 1 - i)`.
    pub fn append_batch(&mut self, values: &[f64], anchor: DateTime<Utc>, interval_seconds: i64) {
        let count = values.len() as i64;

        for (index, &value) in values.iter().enumerate() {
            let steps_back = count - 1 - index as i64;
            let observed_at = anchor - Duration::seconds(interval_seconds * steps_back);
            self.append(Reading::new(value, observed_at));
        }
    }

    /// Remove every reading
    pub fn clear(&mut self) {
        self.readings.clear();
    }

    /// Most recent reading, if any
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Number of stored readings
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Whether the buffer holds no readings
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Maximum number of readings kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Readings oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Copy of the readings, oldest first
    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }
}

/// Label readings for a chart, oldest first
pub fn display_series(readings: &[Reading]) -> Vec<SeriesPoint> {
    readings
        .iter()
        .map(|reading| SeriesPoint {
            label: reading.observed_at.format(LABEL_FORMAT).to_string(),
            value: reading.value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let history = HistoryBuffer::new(5);
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
        assert_eq!(history.capacity(), 5);
        assert!(history.latest().is_none());
    }

    #[test]
    fn test_append_below_capacity() {
        let mut history = HistoryBuffer::new(5);
        history.append(Reading::new(20.0, at(0)));
        history.append(Reading::new(21.0, at(30)));

        assert_eq!(history.len(), 2);
        assert_eq!(history.latest(), Some(&Reading::new(21.0, at(30))));
    }

    #[test]
    fn test_append_past_capacity_keeps_last_insertions() {
        let capacity = 4;
        let extra = 3;
        let mut history = HistoryBuffer::new(capacity);

        for i in 0..(capacity + extra) {
            history.append(Reading::new(i as f64, at(i as i64)));
        }

        assert_eq!(history.len(), capacity);
        let values: Vec<f64> = history.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut history = HistoryBuffer::new(0);
        history.append(Reading::new(20.0, at(0)));
        assert!(history.is_empty());
    }

    #[test]
    fn test_append_batch_timestamps() {
        let mut history = HistoryBuffer::new(10);
        let now = at(600);

        history.append_batch(&[18.0, 18.5, 19.0, 19.5], now, 30);

        let readings = history.to_vec();
        assert_eq!(readings.len(), 4);
        assert_eq!(readings[0].observed_at, at(510));
        assert_eq!(readings[3].observed_at, now);

        for pair in readings.windows(2) {
            assert_eq!(pair[1].observed_at - pair[0].observed_at, Duration::seconds(30));
        }

        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![18.0, 18.5, 19.0, 19.5]);
    }

    #[test]
    fn test_append_batch_single_value_at_anchor() {
        let mut history = HistoryBuffer::new(10);
        history.append_batch(&[22.0], at(100), 30);
        assert_eq!(history.latest(), Some(&Reading::new(22.0, at(100))));
    }

    #[test]
    fn test_append_batch_empty_is_noop() {
        let mut history = HistoryBuffer::new(10);
        history.append_batch(&[], at(100), 30);
        assert!(history.is_empty());
    }

    #[test]
    fn test_append_batch_overflow_keeps_newest() {
        let mut history = HistoryBuffer::new(3);
        history.append(Reading::new(10.0, at(0)));
        history.append_batch(&[1.0, 2.0, 3.0, 4.0, 5.0], at(1000), 30);

        let values: Vec<f64> = history.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0]);
        assert_eq!(history.latest().unwrap().observed_at, at(1000));
    }

    #[test]
    fn test_clear() {
        let mut history = HistoryBuffer::new(3);
        history.append(Reading::new(20.0, at(0)));
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn test_display_series_labels() {
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        let readings = vec![
            Reading::new(20.0, base),
            Reading::new(20.5, base + Duration::seconds(30)),
        ];

        let series = display_series(&readings);
        assert_eq!(
            series,
            vec![
                SeriesPoint { label: "08:30:00".to_string(), value: 20.0 },
                SeriesPoint { label: "08:30:30".to_string(), value: 20.5 },
            ]
        );
    }
}
