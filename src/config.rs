//! Configuration module for sitewatch.
//!
//! Runtime settings come from environment variables with sensible defaults;
//! the list of websites comes from a JSON file.

use crate::metrics::{Target, DEFAULT_ALERT_THRESHOLD};

use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read targets file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse targets file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid target: {0}")]
    Invalid(String),
}

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// HTTP port for the reporting API (default: 8080)
    pub http_port: u16,
    /// Path to the JSON targets file (default: "targets.json")
    pub targets_path: String,
    /// Timeout applied to every HTTP probe (default: 5s)
    pub probe_timeout: Duration,
    /// Availability ratio below which a website is reported down (default: 0.8)
    pub alert_threshold: f64,
    /// How often recent stats are logged (default: 10s)
    pub report_interval: Duration,
    /// How often hourly stats are logged (default: 60s)
    pub summary_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            targets_path: "targets.json".to_string(),
            probe_timeout: Duration::from_secs(5),
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            report_interval: Duration::from_secs(10),
            summary_interval: Duration::from_secs(60),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SITEWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `SITEWATCH_TARGETS`: targets file path (default: "targets.json")
    /// - `SITEWATCH_PROBE_TIMEOUT_MS`: probe timeout in ms (default: 5000)
    /// - `SITEWATCH_ALERT_THRESHOLD`: ratio in [0, 1] (default: 0.8)
    /// - `SITEWATCH_REPORT_INTERVAL_SECS`: (default: 10)
    /// - `SITEWATCH_SUMMARY_INTERVAL_SECS`: (default: 60)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "SITEWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(path) = lookup("SITEWATCH_TARGETS") {
            cfg.targets_path = path;
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "SITEWATCH_PROBE_TIMEOUT_MS").filter(|&ms| ms > 0) {
            cfg.probe_timeout = Duration::from_millis(ms);
        }

        if let Some(threshold) = parse_var::<f64>(&lookup, "SITEWATCH_ALERT_THRESHOLD") {
            if (0.0..=1.0).contains(&threshold) {
                cfg.alert_threshold = threshold;
            } else {
                tracing::warn!("Ignoring alert threshold {} outside [0, 1]", threshold);
            }
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "SITEWATCH_REPORT_INTERVAL_SECS").filter(|&s| s > 0) {
            cfg.report_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "SITEWATCH_SUMMARY_INTERVAL_SECS").filter(|&s| s > 0) {
            cfg.summary_interval = Duration::from_secs(secs);
        }

        cfg
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={}", key, raw);
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct TargetsFile {
    websites: Vec<WebsiteEntry>,
}

#[derive(Debug, Deserialize)]
struct WebsiteEntry {
    url: String,
    /// Poll interval in milliseconds.
    interval_ms: u64,
}

/// Load the target list from a JSON file.
pub fn load_targets<P: AsRef<Path>>(path: P) -> Result<Vec<Target>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_targets(&raw)
}

/// Parse a target list of the form `{"websites": [{"url", "interval_ms"}]}`.
///
/// Duplicate URLs keep their first entry.
pub fn parse_targets(raw: &str) -> Result<Vec<Target>, ConfigError> {
    let file: TargetsFile = serde_json::from_str(raw)?;

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(file.websites.len());
    for entry in file.websites {
        let url = entry.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("empty url".to_string()));
        }
        if entry.interval_ms == 0 {
            return Err(ConfigError::Invalid(format!("{} has a zero interval", url)));
        }
        if !seen.insert(url.to_string()) {
            tracing::warn!("Ignoring duplicate target {}", url);
            continue;
        }
        targets.push(Target::new(url, Duration::from_millis(entry.interval_ms)));
    }

    Ok(targets)
}
