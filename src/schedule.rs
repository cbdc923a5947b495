//! Recorded input schedule
//!
//! Loads the `code,time` CSV written by the key recorder and turns it into the
//! sequence of waits the replay loop paces itself against. Events are used in
//! file order; nothing is sorted or deduplicated.

use crate::errors::{FlapError, Result};
use crate::types::InputEvent;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Read recorded events from a CSV file with a header row
pub fn load_events(path: &Path) -> Result<Vec<InputEvent>> {
    let file = std::fs::File::open(path).map_err(|e| FlapError::io(path, e))?;
    read_events(file)
}

/// Read recorded events from any CSV source with a header row
pub fn read_events<R: Read>(reader: R) -> Result<Vec<InputEvent>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut events = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line());
        let index = parse_column(&record, 0, "event index", line)?;
        let time_ms = parse_column(&record, 1, "timestamp", line)?;
        events.push(InputEvent { index, time_ms });
    }
    Ok(events)
}

fn parse_column(record: &csv::StringRecord, column: usize, what: &str, line: Option<u64>) -> Result<i64> {
    let raw = record
        .get(column)
        .ok_or_else(|| FlapError::parse(format!("missing {} column", what), line))?;
    raw.parse::<i64>()
        .map_err(|e| FlapError::parse(format!("invalid {} {:?}: {}", what, raw, e), line))
}

/// Shift timestamps so the first one is zero
pub fn normalize(timestamps: &[i64]) -> Vec<i64> {
    match timestamps.first() {
        Some(&first) => timestamps.iter().map(|t| t.saturating_sub(first)).collect(),
        None => Vec::new(),
    }
}

/// Normalized key-press timeline of one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySchedule {
    timestamps: Vec<i64>,
}

impl ReplaySchedule {
    /// Build from raw timestamps in milliseconds, normalizing them
    pub fn new(raw_timestamps: &[i64]) -> Self {
        Self {
            timestamps: normalize(raw_timestamps),
        }
    }

    pub fn from_events(events: &[InputEvent]) -> Self {
        let raw: Vec<i64> = events.iter().map(|e| e.time_ms).collect();
        Self::new(&raw)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_events(&load_events(path)?))
    }

    /// Normalized timestamps in milliseconds
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of key presses a full replay emits; the last timestamp only closes a gap
    pub fn key_presses(&self) -> usize {
        self.timestamps.len().saturating_sub(1)
    }

    /// Recorded gaps between consecutive events
    pub fn gaps(&self) -> Vec<Duration> {
        self.timestamps
            .windows(2)
            .map(|pair| Duration::from_millis(pair[1].saturating_sub(pair[0]).max(0) as u64))
            .collect()
    }

    /// Gaps with the dispatch compensation subtracted, floored at zero
    pub fn paced_gaps(&self, compensation: Duration) -> Vec<Duration> {
        self.gaps()
            .into_iter()
            .map(|gap| gap.saturating_sub(compensation))
            .collect()
    }

    /// Total recorded duration from the first to the last event
    pub fn span(&self) -> Duration {
        self.timestamps
            .last()
            .map(|&t| Duration::from_millis(t.max(0) as u64))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[500, 600, 900]), vec![0, 100, 400]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_gaps_and_compensation() {
        let schedule = ReplaySchedule::new(&[0, 100, 350]);
        assert_eq!(
            schedule.gaps(),
            vec![Duration::from_millis(100), Duration::from_millis(250)]
        );
        assert_eq!(
            schedule.paced_gaps(Duration::from_millis(11)),
            vec![Duration::from_millis(89), Duration::from_millis(239)]
        );
    }

    #[test]
    fn test_short_gap_floors_at_zero() {
        let schedule = ReplaySchedule::new(&[0, 5, 3]);
        assert_eq!(
            schedule.paced_gaps(Duration::from_millis(11)),
            vec![Duration::ZERO, Duration::ZERO]
        );
    }

    #[test]
    fn test_read_events_keeps_file_order() {
        let csv = "code,time\n57,900\n57,500\n57,600\n";
        let events = read_events(csv.as_bytes()).unwrap();
        let times: Vec<i64> = events.iter().map(|e| e.time_ms).collect();
        assert_eq!(times, vec![900, 500, 600]);
        assert_eq!(events[0].index, 57);
    }

    #[test]
    fn test_read_events_rejects_bad_timestamp() {
        let csv = "code,time\n57,12\n57,later\n";
        let err = read_events(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, FlapError::Parse { line: Some(3), .. }), "{:?}", err);
    }

    #[test]
    fn test_read_events_rejects_single_column() {
        let csv = "time\n12\n";
        assert!(read_events(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_single_event_has_no_presses() {
        let schedule = ReplaySchedule::new(&[42]);
        assert_eq!(schedule.key_presses(), 0);
        assert!(schedule.gaps().is_empty());
        assert_eq!(schedule.span(), Duration::ZERO);
    }

    #[test]
    fn test_extreme_timestamps_saturate() {
        let schedule = ReplaySchedule::new(&[i64::MIN, i64::MAX, 0]);
        assert_eq!(schedule.timestamps(), &[0, i64::MAX, i64::MAX]);
        assert_eq!(
            schedule.gaps(),
            vec![Duration::from_millis(i64::MAX as u64), Duration::ZERO]
        );

        let events = read_events("code,time\n57,9223372036854775807\n57,-9223372036854775808\n".as_bytes()).unwrap();
        let gaps = ReplaySchedule::from_events(&events).gaps();
        assert_eq!(gaps, vec![Duration::ZERO]);
    }

    proptest! {
        #[test]
        fn prop_press_count_is_len_minus_one(raw in prop::collection::vec(0i64..10_000_000, 1..200)) {
            let schedule = ReplaySchedule::new(&raw);
            prop_assert_eq!(schedule.key_presses(), raw.len() - 1);
            prop_assert_eq!(schedule.gaps().len(), raw.len() - 1);
            prop_assert_eq!(schedule.timestamps()[0], 0);
        }

        #[test]
        fn prop_sorted_gaps_sum_to_span(mut raw in prop::collection::vec(0i64..10_000_000, 1..200)) {
            raw.sort_unstable();
            let schedule = ReplaySchedule::new(&raw);
            let total: Duration = schedule.gaps().iter().sum();
            prop_assert_eq!(total, schedule.span());
        }
    }
}
