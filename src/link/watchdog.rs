//! # Link Watchdogs
//!
//! Two independent timers guarding the peer link:
//!
//! - **RX watchdog**: a recurring poll. Every check that finds the peer silent
//!   for longer than the liveness threshold counts one lost reading. It stays
//!   armed until the link goes down.
//! - **TX watchdog**: one-shot. Armed when a command is published, disarmed by
//!   an acknowledgement, or fired once (one lost command) when the ack window
//!   elapses.
//!
//! The watchdogs only hold state and compare timestamps. Scheduling is done by
//! the engine loop, which calls the `check_*` methods from the same task that
//! handles inbound packets.

use chrono::{DateTime, Duration, Utc};

/// Fault counters and timing state of the link
///
/// Counters only grow, except through [`LinkWatchdogs::reset_counters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogState {
    /// Last time a reading arrived from the peer
    pub last_rx_at: DateTime<Utc>,

    /// Last time a command was published
    pub last_tx_at: Option<DateTime<Utc>>,

    /// A published command is still waiting for its ack
    pub tx_pending_ack: bool,

    /// Liveness checks that found the peer silent
    pub lost_rx_count: u64,

    /// Commands whose ack window elapsed
    pub lost_tx_count: u64,

    /// Inbound checksum failures plus peer-reported checksum errors
    pub checksum_error_count: u64,

    /// Inbound frames with bad framing or body
    pub malformed_count: u64,

    /// Inbound frames with an unrecognized `dataType`
    pub unknown_type_count: u64,
}

impl WatchdogState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_rx_at: now,
            last_tx_at: None,
            tx_pending_ack: false,
            lost_rx_count: 0,
            lost_tx_count: 0,
            checksum_error_count: 0,
            malformed_count: 0,
            unknown_type_count: 0,
        }
    }
}

/// RX liveness and TX acknowledgement timers
#[derive(Debug, Clone)]
pub struct LinkWatchdogs {
    liveness_threshold: Duration,
    ack_window: Duration,
    rx_armed: bool,
    tx_deadline: Option<DateTime<Utc>>,
    state: WatchdogState,
}

impl LinkWatchdogs {
    /// Create disarmed watchdogs
    ///
    /// # Arguments
    ///
    /// * `liveness_threshold` - Maximum allowed silence from the peer
    /// * `ack_window` - Maximum wait for a command acknowledgement
    /// * `now` - Initial value of `last_rx_at`
    pub fn new(liveness_threshold: Duration, ack_window: Duration, now: DateTime<Utc>) -> Self {
        Self {
            liveness_threshold,
            ack_window,
            rx_armed: false,
            tx_deadline: None,
            state: WatchdogState::new(now),
        }
    }

    pub fn state(&self) -> &WatchdogState {
        &self.state
    }

    pub fn liveness_threshold(&self) -> Duration {
        self.liveness_threshold
    }

    pub fn ack_window(&self) -> Duration {
        self.ack_window
    }

    /// Start liveness polling; silence is measured from `now`
    pub fn arm_rx(&mut self, now: DateTime<Utc>) {
        self.rx_armed = true;
        self.state.last_rx_at = now;
    }

    pub fn is_rx_armed(&self) -> bool {
        self.rx_armed
    }

    /// Note a reading from the peer
    pub fn record_rx(&mut self, now: DateTime<Utc>) {
        self.state.last_rx_at = now;
    }

    /// Liveness poll
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the peer has been silent longer than the threshold
    ///   (one lost reading was counted)
    pub fn check_rx(&mut self, now: DateTime<Utc>) -> bool {
        if !self.rx_armed {
            return false;
        }

        if now - self.state.last_rx_at > self.liveness_threshold {
            self.state.lost_rx_count += 1;
            return true;
        }

        false
    }

    /// Start waiting for an acknowledgement of a command published at `now`
    ///
    /// Re-arming while already armed restarts the window.
    pub fn arm_tx(&mut self, now: DateTime<Utc>) {
        self.state.last_tx_at = Some(now);
        self.state.tx_pending_ack = true;
        self.tx_deadline = Some(now + self.ack_window);
    }

    /// When the armed TX watchdog fires, if armed
    pub fn tx_deadline(&self) -> Option<DateTime<Utc>> {
        self.tx_deadline
    }

    /// Stop waiting for an acknowledgement
    ///
    /// # Returns
    ///
    /// * `bool` - whether a command was pending
    pub fn acknowledge(&mut self) -> bool {
        let was_pending = self.state.tx_pending_ack;
        self.tx_deadline = None;
        self.state.tx_pending_ack = false;
        was_pending
    }

    /// Ack window poll
    ///
    /// Fires at most once per arming: counts one lost command and disarms.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the watchdog fired on this call
    pub fn check_tx(&mut self, now: DateTime<Utc>) -> bool {
        match self.tx_deadline {
            Some(deadline) if now >= deadline => {
                self.tx_deadline = None;
                self.state.tx_pending_ack = false;
                self.state.lost_tx_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Disarm both timers (link went down)
    pub fn disarm_all(&mut self) {
        self.rx_armed = false;
        self.tx_deadline = None;
        self.state.tx_pending_ack = false;
    }

    pub fn record_checksum_error(&mut self) {
        self.state.checksum_error_count += 1;
    }

    pub fn record_malformed(&mut self) {
        self.state.malformed_count += 1;
    }

    pub fn record_unknown_type(&mut self) {
        self.state.unknown_type_count += 1;
    }

    /// Zero every counter, keeping timers as they are
    pub fn reset_counters(&mut self) {
        self.state.lost_rx_count = 0;
        self.state.lost_tx_count = 0;
        self.state.checksum_error_count = 0;
        self.state.malformed_count = 0;
        self.state.unknown_type_count = 0;
    }
}
