//! Availability alert with hysteresis.
//!
//! The alert flips to `Unavailable` only when availability drops below the
//! threshold, and back to `Available` only once it reaches the threshold
//! again. Every flip is timestamped.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Threshold used when none is configured.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Available,
    Unavailable,
}

impl AlertState {
    /// Transition function of the two-state machine.
    pub fn next(self, availability: f64, threshold: f64) -> AlertState {
        match self {
            AlertState::Available if availability < threshold => AlertState::Unavailable,
            AlertState::Unavailable if availability >= threshold => AlertState::Available,
            state => state,
        }
    }
}

/// A state change produced by [`Alert::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertTransition {
    pub from: AlertState,
    pub to: AlertState,
    pub availability: f64,
    pub at: DateTime<Utc>,
}

/// Read-only view of an alert for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertReport {
    pub state: AlertState,
    pub threshold: f64,
    pub availability: f64,
    pub since: DateTime<Utc>,
    pub unavailable_since: Vec<DateTime<Utc>>,
    pub available_since: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Alert {
    state: AlertState,
    threshold: f64,
    availability: f64,
    unavailable_since: Vec<DateTime<Utc>>,
    /// Starts with the moment monitoring began.
    available_since: Vec<DateTime<Utc>>,
}

impl Alert {
    pub fn new(threshold: f64) -> Self {
        Self::started_at(threshold, Utc::now())
    }

    /// Create an alert assumed available since `now`.
    pub fn started_at(threshold: f64, now: DateTime<Utc>) -> Self {
        Self {
            state: AlertState::Available,
            threshold,
            availability: 1.0,
            unavailable_since: Vec::new(),
            available_since: vec![now],
        }
    }

    /// Feed the current availability ratio and apply at most one transition.
    pub fn evaluate(&mut self, availability: f64, now: DateTime<Utc>) -> Option<AlertTransition> {
        self.availability = availability;

        let from = self.state;
        let to = from.next(availability, self.threshold);
        if from == to {
            return None;
        }

        match to {
            AlertState::Unavailable => self.unavailable_since.push(now),
            AlertState::Available => self.available_since.push(now),
        }
        self.state = to;

        Some(AlertTransition {
            from,
            to,
            availability,
            at: now,
        })
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn availability(&self) -> f64 {
        self.availability
    }

    /// When the current state was entered.
    pub fn since(&self) -> DateTime<Utc> {
        let history = match self.state {
            AlertState::Available => &self.available_since,
            AlertState::Unavailable => &self.unavailable_since,
        };
        // Both histories are non-empty while in their state.
        history.last().copied().unwrap_or_default()
    }

    pub fn unavailable_since(&self) -> &[DateTime<Utc>] {
        &self.unavailable_since
    }

    pub fn available_since(&self) -> &[DateTime<Utc>] {
        &self.available_since
    }

    pub fn report(&self) -> AlertReport {
        AlertReport {
            state: self.state,
            threshold: self.threshold,
            availability: self.availability,
            since: self.since(),
            unavailable_since: self.unavailable_since.clone(),
            available_since: self.available_since.clone(),
        }
    }
}
