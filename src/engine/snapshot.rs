//! Observable engine state published to the UI.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::history::{display_series, Reading, SeriesPoint};
use crate::link::watchdog::WatchdogState;

/// Format of the last-reading timestamp shown to the user
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Placeholder shown before a value is known
pub const UNKNOWN_DISPLAY: &str = "--";

/// Broker connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    /// Connection status line for the UI
    pub fn status_text(self) -> &'static str {
        match self {
            LinkState::Disconnected => "Disconnected from broker.",
            LinkState::Connecting => "Connecting to broker...",
            LinkState::Connected => "Connected to broker.",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_text())
    }
}

/// Link fault counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkCounters {
    pub lost_rx: u64,
    pub lost_tx: u64,
    pub checksum_errors: u64,
    pub malformed: u64,
    pub unknown_types: u64,
}

impl From<&WatchdogState> for LinkCounters {
    fn from(state: &WatchdogState) -> Self {
        Self {
            lost_rx: state.lost_rx_count,
            lost_tx: state.lost_tx_count,
            checksum_errors: state.checksum_error_count,
            malformed: state.malformed_count,
            unknown_types: state.unknown_type_count,
        }
    }
}

/// Read-only copy of everything the UI displays
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineSnapshot {
    pub link_state: LinkState,

    /// Latest air temperature in °C
    pub current_temperature: Option<f64>,

    /// Selected thermostat setpoint in whole °C
    pub setpoint: Option<i32>,

    /// When the last reading or setpoint reply arrived
    pub last_reading_at: Option<DateTime<Utc>>,

    /// A command is waiting for its acknowledgement
    pub tx_pending_ack: bool,

    pub counters: LinkCounters,

    /// History window, oldest first
    pub history: Vec<Reading>,
}

impl EngineSnapshot {
    pub fn status_text(&self) -> &'static str {
        self.link_state.status_text()
    }

    /// e.g. `"21.5°C"`
    pub fn current_temperature_display(&self) -> String {
        format_celsius(self.current_temperature)
    }

    /// e.g. `"22°C"`
    pub fn setpoint_display(&self) -> String {
        format_celsius(self.setpoint.map(f64::from))
    }

    pub fn last_reading_display(&self) -> String {
        self.last_reading_at
            .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| UNKNOWN_DISPLAY.to_string())
    }

    /// Chart points for the history window
    pub fn series(&self) -> Vec<SeriesPoint> {
        display_series(&self.history)
    }
}

fn format_celsius(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{}\u{00B0}C", value),
        None => UNKNOWN_DISPLAY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_text() {
        assert_eq!(LinkState::Connecting.status_text(), "Connecting to broker...");
        assert_eq!(LinkState::Connected.status_text(), "Connected to broker.");
        assert_eq!(LinkState::Disconnected.to_string(), "Disconnected from broker.");
    }

    #[test]
    fn test_default_snapshot_displays() {
        let snapshot = EngineSnapshot::default();
        assert_eq!(snapshot.link_state, LinkState::Disconnected);
        assert_eq!(snapshot.current_temperature_display(), "--");
        assert_eq!(snapshot.setpoint_display(), "--");
        assert_eq!(snapshot.last_reading_display(), "--");
        assert!(snapshot.series().is_empty());
    }

    #[test]
    fn test_temperature_displays() {
        let snapshot = EngineSnapshot {
            current_temperature: Some(21.5),
            setpoint: Some(22),
            last_reading_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 18, 5, 9).unwrap()),
            ..Default::default()
        };

        assert_eq!(snapshot.current_temperature_display(), "21.5°C");
        assert_eq!(snapshot.setpoint_display(), "22°C");
        assert_eq!(snapshot.last_reading_display(), "2024-03-01 18:05:09");
    }

    #[test]
    fn test_counters_from_watchdog_state() {
        let state = WatchdogState {
            last_rx_at: Utc::now(),
            last_tx_at: None,
            tx_pending_ack: false,
            lost_rx_count: 1,
            lost_tx_count: 2,
            checksum_error_count: 3,
            malformed_count: 4,
            unknown_type_count: 5,
        };

        assert_eq!(
            LinkCounters::from(&state),
            LinkCounters {
                lost_rx: 1,
                lost_tx: 2,
                checksum_errors: 3,
                malformed: 4,
                unknown_types: 5,
            }
        );
    }
}
