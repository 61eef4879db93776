//! Metrics model types.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// A monitored website.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Stable key, the URL being probed.
    pub id: String,
    pub poll_interval: Duration,
}

impl Target {
    pub fn new(id: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            id: id.into(),
            poll_interval,
        }
    }
}

/// Status reported for a single probe.
///
/// Transport failures carry no HTTP code and are recorded as `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProbeStatus {
    Code(u16),
    Failed,
}

impl ProbeStatus {
    /// Only 2xx responses count towards availability and the average.
    pub fn is_success(self) -> bool {
        matches!(self, ProbeStatus::Code(200..=299))
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Code(code) => write!(f, "{}", code),
            ProbeStatus::Failed => f.write_str("error"),
        }
    }
}

// Serialized as a string so it can key a JSON object.
impl Serialize for ProbeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The result of one probe, as fed into every window of its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub elapsed: Duration,
    pub status: ProbeStatus,
}

impl ProbeOutcome {
    pub fn new(elapsed: Duration, status: ProbeStatus) -> Self {
        Self { elapsed, status }
    }

    /// Outcome for a probe that never produced a response.
    pub fn failed(elapsed: Duration) -> Self {
        Self::new(elapsed, ProbeStatus::Failed)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Aggregate view of one window.
///
/// Every latency is `None` while the window holds no entries; `average`
/// also stays `None` until a successful outcome is in range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    #[serde(serialize_with = "serialize_millis")]
    pub max: Option<Duration>,
    #[serde(serialize_with = "serialize_millis")]
    pub average: Option<Duration>,
    #[serde(serialize_with = "serialize_millis")]
    pub percentile: Option<Duration>,
    /// Percentage of successful outcomes, 0 to 100.
    pub availability: Option<f64>,
    pub total: usize,
    pub successful: usize,
    pub status_codes: BTreeMap<ProbeStatus, usize>,
}

impl WindowReport {
    pub fn empty() -> Self {
        Self {
            max: None,
            average: None,
            percentile: None,
            availability: None,
            total: 0,
            successful: 0,
            status_codes: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Durations go over the wire as fractional milliseconds.
fn serialize_millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&(d.as_nanos() as f64 / 1_000_000.0)),
        None => serializer.serialize_none(),
    }
}
