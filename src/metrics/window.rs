//! Sliding window of probe outcomes for one target.
//!
//! A window covers a fixed wall-clock duration sampled at the target's poll
//! interval, so it holds at most `duration / poll_interval` outcomes. A zero
//! duration means the window is unbounded. Aggregates are maintained
//! incrementally on every update; only the percentile is computed on demand
//! from the entries.

use super::alert::{Alert, AlertTransition};
use super::models::{ProbeOutcome, ProbeStatus, WindowReport};
use super::percentile::{estimate_high_percentile, REPORTED_PERCENTILE};

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use thiserror::Error;

/// Window construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    #[error("poll interval {interval:?} is longer than window duration {duration:?}")]
    IntervalExceedsDuration { duration: Duration, interval: Duration },
}

/// Number of outcomes a window keeps, or `None` if unbounded.
pub fn window_capacity(duration: Duration, poll_interval: Duration) -> Result<Option<usize>, WindowError> {
    if duration.is_zero() {
        return Ok(None);
    }
    if poll_interval.is_zero() {
        return Err(WindowError::ZeroInterval);
    }

    let capacity = duration.as_nanos() / poll_interval.as_nanos();
    if capacity == 0 {
        return Err(WindowError::IntervalExceedsDuration {
            duration,
            interval: poll_interval,
        });
    }
    Ok(Some(usize::try_from(capacity).unwrap_or(usize::MAX)))
}

#[derive(Debug, Clone)]
pub struct MetricsWindow {
    duration: Duration,
    capacity: Option<usize>,
    /// Oldest first. Its length is the total count.
    entries: VecDeque<ProbeOutcome>,
    sum_successful: Duration,
    success_count: usize,
    /// Decreasing by value; equal values stay in arrival order.
    max_candidates: VecDeque<Duration>,
    status_histogram: BTreeMap<ProbeStatus, usize>,
    alert: Option<Alert>,
}

impl MetricsWindow {
    /// Create a window; with `alert_enabled` it owns an [`Alert`] at the
    /// default threshold.
    pub fn new(duration: Duration, poll_interval: Duration, alert_enabled: bool) -> Result<Self, WindowError> {
        let capacity = window_capacity(duration, poll_interval)?;
        Ok(Self {
            duration,
            capacity,
            entries: VecDeque::with_capacity(capacity.unwrap_or_default().min(4096)),
            sum_successful: Duration::ZERO,
            success_count: 0,
            max_candidates: VecDeque::new(),
            status_histogram: BTreeMap::new(),
            alert: alert_enabled.then(|| Alert::new(super::alert::DEFAULT_ALERT_THRESHOLD)),
        })
    }

    /// Replace the owned alert's threshold. No-op without an alert.
    pub fn with_alert_threshold(mut self, threshold: f64) -> Self {
        if let Some(alert) = self.alert.take() {
            self.alert = Some(Alert::started_at(threshold, alert.since()));
        }
        self
    }

    pub fn update(&mut self, outcome: ProbeOutcome) -> Option<AlertTransition> {
        self.update_at(outcome, Utc::now())
    }

    /// Apply one outcome; `now` timestamps any alert transition.
    pub fn update_at(&mut self, outcome: ProbeOutcome, now: DateTime<Utc>) -> Option<AlertTransition> {
        // 1. Make room
        if self.capacity.is_some_and(|capacity| self.entries.len() >= capacity) {
            self.evict_oldest();
        }

        // 2. Older, smaller delays can no longer be the maximum
        while self.max_candidates.back().is_some_and(|&d| d < outcome.elapsed) {
            self.max_candidates.pop_back();
        }
        self.max_candidates.push_back(outcome.elapsed);

        // 3. Aggregates
        *self.status_histogram.entry(outcome.status).or_insert(0) += 1;
        if outcome.is_success() {
            self.success_count += 1;
            self.sum_successful += outcome.elapsed;
        }

        // 4. Append
        self.entries.push_back(outcome);

        // 5. Alert
        let ratio = self.availability_ratio()?;
        self.alert.as_mut()?.evaluate(ratio, now)
    }

    fn evict_oldest(&mut self) {
        let Some(oldest) = self.entries.pop_front() else {
            return;
        };

        if oldest.is_success() {
            self.success_count -= 1;
            self.sum_successful -= oldest.elapsed;
        }

        if let Some(count) = self.status_histogram.get_mut(&oldest.status) {
            *count -= 1;
            if *count == 0 {
                self.status_histogram.remove(&oldest.status);
            }
        }

        if self.max_candidates.front() == Some(&oldest.elapsed) {
            self.max_candidates.pop_front();
        }
    }

    /// Successful over total, in [0, 1]. `None` while empty.
    pub fn availability_ratio(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.success_count as f64 / self.entries.len() as f64)
    }

    pub fn max(&self) -> Option<Duration> {
        self.max_candidates.front().copied()
    }

    /// Mean latency of successful outcomes.
    pub fn average(&self) -> Option<Duration> {
        if self.success_count == 0 {
            return None;
        }
        let nanos = self.sum_successful.as_nanos() / self.success_count as u128;
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    pub fn percentile(&self) -> Option<Duration> {
        estimate_high_percentile(self.entries.iter().map(|e| e.elapsed), REPORTED_PERCENTILE)
    }

    pub fn snapshot(&self) -> WindowReport {
        if self.entries.is_empty() {
            return WindowReport::empty();
        }

        WindowReport {
            max: self.max(),
            average: self.average(),
            percentile: self.percentile(),
            availability: self.availability_ratio().map(|ratio| ratio * 100.0),
            total: self.entries.len(),
            successful: self.success_count,
            status_codes: self.status_histogram.clone(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }
}
