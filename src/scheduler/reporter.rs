//! Periodic report of every target's windows to the log.

use crate::metrics::{StatsStore, Target, WindowReport};

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Window reported on every short tick.
pub const RECENT_WINDOW: &str = "10m";
/// Window reported on every summary tick and used as the trend baseline.
pub const SUMMARY_WINDOW: &str = "1h";

/// Change of recent latency against the longer baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trend {
    /// Relative improvement, e.g. 0.25 for 25% faster.
    Faster(f64),
    Slower(f64),
    Stable,
    Unknown,
}

/// Compare the recent average to the baseline average.
pub fn latency_trend(recent: Option<Duration>, baseline: Option<Duration>) -> Trend {
    let (Some(recent), Some(baseline)) = (recent, baseline) else {
        return Trend::Unknown;
    };
    if baseline.is_zero() {
        return Trend::Unknown;
    }

    let change = (recent.as_secs_f64() - baseline.as_secs_f64()) / baseline.as_secs_f64();
    if recent == baseline {
        Trend::Stable
    } else if change < 0.0 {
        Trend::Faster(-change)
    } else {
        Trend::Slower(change)
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Faster(r) => write!(f, "{:.1}% faster than past hour", r * 100.0),
            Trend::Slower(r) => write!(f, "{:.1}% slower than past hour", r * 100.0),
            Trend::Stable => f.write_str("stable trend"),
            Trend::Unknown => f.write_str("trend unavailable"),
        }
    }
}

/// Reporter that logs window snapshots on two cadences.
pub struct Reporter {
    store: Arc<StatsStore>,
    targets: Vec<Target>,
    report_interval: Duration,
    summary_interval: Duration,
    stop_rx: watch::Receiver<bool>,
}

impl Reporter {
    pub fn new(
        store: Arc<StatsStore>,
        targets: Vec<Target>,
        report_interval: Duration,
        summary_interval: Duration,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            targets,
            report_interval,
            summary_interval,
            stop_rx,
        }
    }

    /// Start the reporter background task.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut stop_rx = self.stop_rx.clone();
            let start = tokio::time::Instant::now();
            let mut report = tokio::time::interval_at(start + self.report_interval, self.report_interval);
            let mut summary = tokio::time::interval_at(start + self.summary_interval, self.summary_interval);

            loop {
                if *stop_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = report.tick() => self.report_recent(),
                    _ = summary.tick() => self.report_summary(),
                }
            }
        })
    }

    fn report_recent(&self) {
        for target in &self.targets {
            let Some(recent) = self.store.snapshot(&target.id, RECENT_WINDOW) else {
                tracing::info!(url = %target.id, "Metrics currently unavailable");
                continue;
            };

            if let Some(alert) = self.store.alert_state(&target.id) {
                let held = (Utc::now() - alert.since).num_seconds();
                tracing::info!(
                    url = %target.id,
                    state = ?alert.state,
                    "Availability {:.1}% since {} ({}s)",
                    alert.availability * 100.0,
                    alert.since.format("%Y-%m-%d %H:%M:%S"),
                    held
                );
            }

            let baseline = self
                .store
                .snapshot(&target.id, SUMMARY_WINDOW)
                .and_then(|r| r.average);
            let trend = latency_trend(recent.average, baseline);
            log_report(&target.id, RECENT_WINDOW, &recent, Some(trend));
        }
    }

    fn report_summary(&self) {
        for target in &self.targets {
            if let Some(summary) = self.store.snapshot(&target.id, SUMMARY_WINDOW) {
                log_report(&target.id, SUMMARY_WINDOW, &summary, None);
            }
        }
    }
}

fn log_report(target: &str, window: &str, report: &WindowReport, trend: Option<Trend>) {
    if report.is_empty() {
        tracing::info!(url = %target, window, "Metrics currently unavailable");
        return;
    }

    tracing::info!(
        url = %target,
        window,
        "max={} avg={} p90={} availability={} statuses=[{}]{}",
        format_latency(report.max),
        format_latency(report.average),
        format_latency(report.percentile),
        report
            .availability
            .map(|a| format!("{:.1}%", a))
            .unwrap_or_else(|| "n/a".to_string()),
        format_statuses(report),
        trend.map(|t| format!(" ({})", t)).unwrap_or_default()
    );
}

/// Millisecond rendering of an optional latency.
pub fn format_latency(latency: Option<Duration>) -> String {
    match latency {
        Some(d) => format!("{}ms", d.as_millis()),
        None => "n/a".to_string(),
    }
}

fn format_statuses(report: &WindowReport) -> String {
    report
        .status_codes
        .iter()
        .map(|(status, count)| format!("{}=>{}", status, count))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ProbeOutcome, ProbeStatus};

    #[test]
    fn test_latency_trend() {
        let ms = Duration::from_millis;
        assert_eq!(latency_trend(Some(ms(100)), Some(ms(100))), Trend::Stable);
        assert_eq!(latency_trend(None, Some(ms(100))), Trend::Unknown);
        assert_eq!(latency_trend(Some(ms(100)), Some(Duration::ZERO)), Trend::Unknown);

        match latency_trend(Some(ms(75)), Some(ms(100))) {
            Trend::Faster(r) => assert!((r - 0.25).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
        match latency_trend(Some(ms(150)), Some(ms(100))) {
            Trend::Slower(r) => assert!((r - 0.5).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_trend_display() {
        assert_eq!(Trend::Faster(0.25).to_string(), "25.0% faster than past hour");
        assert_eq!(Trend::Slower(0.5).to_string(), "50.0% slower than past hour");
        assert_eq!(Trend::Stable.to_string(), "stable trend");
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_latency(None), "n/a");
        assert_eq!(format_latency(Some(Duration::from_micros(12_700))), "12ms");

        let mut report = WindowReport::empty();
        report.status_codes.insert(ProbeStatus::Code(200), 3);
        report.status_codes.insert(ProbeStatus::Failed, 1);
        assert_eq!(format_statuses(&report), "200=>3, error=>1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_stops() {
        let store = Arc::new(StatsStore::default());
        let site = Target::new("https://example.com", Duration::from_secs(1));
        store
            .record(&site, ProbeOutcome::new(Duration::from_millis(5), ProbeStatus::Code(200)))
            .unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Reporter::new(
            store,
            vec![site, Target::new("https://unseen.example.com", Duration::from_secs(1))],
            Duration::from_secs(10),
            Duration::from_secs(60),
            stop_rx,
        )
        .start();

        tokio::time::sleep(Duration::from_secs(125)).await;
        stop_tx.send_replace(true);
        handle.await.unwrap();
    }
}
