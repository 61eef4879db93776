//! In-memory stats store shared by all polling loops.
//!
//! The target map is behind an `RwLock` that is only written when a target
//! is seen for the first time. Each target's windows sit behind their own
//! `Mutex`, so loops for different targets never contend with each other.

use super::alert::{AlertReport, AlertTransition, DEFAULT_ALERT_THRESHOLD};
use super::models::{ProbeOutcome, Target, WindowReport};
use super::window::{window_capacity, MetricsWindow, WindowError};

use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

/// A named window every target gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub name: String,
    /// Zero for an unbounded window.
    pub duration: Duration,
    /// Whether this window owns the target's availability alert.
    pub alert: bool,
}

impl WindowSpec {
    pub fn new(name: &str, duration: Duration, alert: bool) -> Self {
        Self {
            name: name.to_string(),
            duration,
            alert,
        }
    }
}

/// Default windows: 2 minutes (alerting), 10 minutes and 1 hour.
pub fn default_windows() -> Vec<WindowSpec> {
    vec![
        WindowSpec::new("2m", Duration::from_secs(120), true),
        WindowSpec::new("10m", Duration::from_secs(600), false),
        WindowSpec::new("1h", Duration::from_secs(3600), false),
    ]
}

/// All windows of one target.
#[derive(Debug)]
pub struct TargetStats {
    windows: Vec<(String, MetricsWindow)>,
}

impl TargetStats {
    pub fn new(target: &Target, specs: &[WindowSpec], alert_threshold: f64) -> Result<Self, WindowError> {
        let windows = specs
            .iter()
            .map(|spec| {
                let window = MetricsWindow::new(spec.duration, target.poll_interval, spec.alert)?
                    .with_alert_threshold(alert_threshold);
                Ok((spec.name.clone(), window))
            })
            .collect::<Result<Vec<_>, WindowError>>()?;
        Ok(Self { windows })
    }

    /// Feed one outcome to every window.
    pub fn update(&mut self, outcome: ProbeOutcome, now: DateTime<Utc>) -> Option<AlertTransition> {
        let mut transition = None;
        for (_, window) in &mut self.windows {
            if let Some(t) = window.update_at(outcome, now) {
                transition = Some(t);
            }
        }
        transition
    }

    pub fn window(&self, name: &str) -> Option<&MetricsWindow> {
        self.windows.iter().find(|(n, _)| n == name).map(|(_, w)| w)
    }

    pub fn alert(&self) -> Option<AlertReport> {
        self.windows
            .iter()
            .find_map(|(_, w)| w.alert())
            .map(|alert| alert.report())
    }
}

/// Mapping from target id to its windows.
pub struct StatsStore {
    specs: Vec<WindowSpec>,
    alert_threshold: f64,
    targets: RwLock<HashMap<String, Arc<Mutex<TargetStats>>>>,
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new(default_windows(), DEFAULT_ALERT_THRESHOLD)
    }
}

impl StatsStore {
    pub fn new(specs: Vec<WindowSpec>, alert_threshold: f64) -> Self {
        Self {
            specs,
            alert_threshold,
            targets: RwLock::new(HashMap::new()),
        }
    }

    /// Check that every window can be built for this target's interval.
    pub fn validate(&self, target: &Target) -> Result<(), WindowError> {
        if target.poll_interval.is_zero() {
            return Err(WindowError::ZeroInterval);
        }
        for spec in &self.specs {
            window_capacity(spec.duration, target.poll_interval)?;
        }
        Ok(())
    }

    /// Apply a probe outcome to all of the target's windows, creating them
    /// on the first outcome.
    pub fn record(&self, target: &Target, outcome: ProbeOutcome) -> Result<Option<AlertTransition>, WindowError> {
        let stats = self.stats_for(target)?;
        let mut stats = lock(&stats);
        Ok(stats.update(outcome, Utc::now()))
    }

    fn stats_for(&self, target: &Target) -> Result<Arc<Mutex<TargetStats>>, WindowError> {
        if let Some(stats) = self.get(&target.id) {
            return Ok(stats);
        }

        let mut targets = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        match targets.entry(target.id.clone()) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let stats = TargetStats::new(target, &self.specs, self.alert_threshold)?;
                tracing::debug!(url = %target.id, "Created {} windows", self.specs.len());
                Ok(e.insert(Arc::new(Mutex::new(stats))).clone())
            }
        }
    }

    fn get(&self, id: &str) -> Option<Arc<Mutex<TargetStats>>> {
        let targets = self.targets.read().unwrap_or_else(PoisonError::into_inner);
        targets.get(id).cloned()
    }

    /// Aggregate view of one window, `None` if the target or window is unknown.
    pub fn snapshot(&self, target_id: &str, window_name: &str) -> Option<WindowReport> {
        let stats = self.get(target_id)?;
        let stats = lock(&stats);
        stats.window(window_name).map(MetricsWindow::snapshot)
    }

    /// Alert of the target, `None` if unknown or no window alerts.
    pub fn alert_state(&self, target_id: &str) -> Option<AlertReport> {
        let stats = self.get(target_id)?;
        let stats = lock(&stats);
        stats.alert()
    }

    /// Ids of every target that has recorded at least one outcome, sorted.
    pub fn target_ids(&self) -> Vec<String> {
        let targets = self.targets.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = targets.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has_window(&self, name: &str) -> bool {
        self.specs.iter().any(|spec| spec.name == name)
    }

    pub fn window_names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }
}

// An update cannot panic halfway under the capacity invariant, so a
// poisoned lock still guards consistent data.
fn lock(stats: &Mutex<TargetStats>) -> MutexGuard<'_, TargetStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{AlertState, ProbeStatus};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tokio_test::{assert_err, assert_ok};

    fn target(id: &str, secs: u64) -> Target {
        Target::new(id, Duration::from_secs(secs))
    }

    fn ok(ms: u64) -> ProbeOutcome {
        ProbeOutcome::new(Duration::from_millis(ms), ProbeStatus::Code(200))
    }

    #[test]
    fn test_default_windows() {
        let specs = default_windows();
        assert_eq!(specs.iter().filter(|s| s.alert).count(), 1);
        assert!(specs.iter().any(|s| s.name == "2m" && s.alert));
        assert!(specs.iter().any(|s| s.name == "10m"));
        assert!(specs.iter().any(|s| s.name == "1h"));
    }

    #[test]
    fn test_lazy_creation() {
        let store = StatsStore::default();
        let site = target("https://example.com", 10);
        assert!(store.snapshot(&site.id, "2m").is_none());
        assert!(store.alert_state(&site.id).is_none());

        assert_ok!(store.record(&site, ok(20)));
        assert_eq!(store.target_ids(), vec![site.id.clone()]);
        for name in ["2m", "10m", "1h"] {
            assert_eq!(store.snapshot(&site.id, name).unwrap().total, 1);
        }
        assert!(store.snapshot(&site.id, "5m").is_none());
        assert_eq!(store.alert_state(&site.id).unwrap().state, AlertState::Available);
    }

    #[test]
    fn test_windows_slide_independently() {
        let store = StatsStore::default();
        let site = target("https://example.com", 10);
        for i in 0..50 {
            assert_ok!(store.record(&site, ok(i)));
        }
        assert_eq!(store.snapshot(&site.id, "2m").unwrap().total, 12);
        assert_eq!(store.snapshot(&site.id, "10m").unwrap().total, 50);
        assert_eq!(store.snapshot(&site.id, "1h").unwrap().total, 50);
    }

    #[test]
    fn test_invalid_interval() {
        let store = StatsStore::default();
        let slow = target("https://slow.example.com", 300);
        assert_err!(store.validate(&slow));
        assert_err!(store.record(&slow, ok(1)));
        assert!(store.target_ids().is_empty());

        assert_ok!(store.validate(&target("https://fast.example.com", 1)));

        let unbounded = StatsStore::new(vec![WindowSpec::new("all", Duration::ZERO, true)], 0.8);
        assert_err!(unbounded.validate(&target("https://zero.example.com", 0)));
        assert_ok!(unbounded.validate(&target("https://rare.example.com", 300)));
    }

    #[test]
    fn test_failures_flip_alert() {
        let store = StatsStore::new(default_windows(), 0.8);
        let site = target("https://down.example.com", 10);
        for _ in 0..12 {
            assert_ok!(store.record(&site, ok(10)));
        }

        let mut transitions = Vec::new();
        for _ in 0..6 {
            let outcome = ProbeOutcome::failed(Duration::from_secs(1));
            transitions.extend(store.record(&site, outcome).unwrap());
        }
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to, AlertState::Unavailable);

        let report = store.alert_state(&site.id).unwrap();
        assert_eq!(report.state, AlertState::Unavailable);
        assert_eq!(report.unavailable_since.len(), 1);
        assert!((report.availability - 0.5).abs() < 1e-9);
    }

    fn outcomes(seed: u64, n: usize) -> Vec<ProbeOutcome> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let elapsed = Duration::from_millis(rng.gen_range(1..500));
                match rng.gen_range(0..10) {
                    0 => ProbeOutcome::failed(elapsed),
                    1 => ProbeOutcome::new(elapsed, ProbeStatus::Code(503)),
                    _ => ProbeOutcome::new(elapsed, ProbeStatus::Code(200)),
                }
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_targets_are_isolated() {
        let store = Arc::new(StatsStore::default());
        let sites: Vec<Target> = (0..8).map(|i| target(&format!("https://site{}.example.com", i), 5)).collect();

        let mut handles = Vec::new();
        for (i, site) in sites.iter().cloned().enumerate() {
            let store = store.clone();
            let sequence = outcomes(i as u64, 400);
            handles.push(tokio::spawn(async move {
                for outcome in sequence {
                    store.record(&site, outcome).unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for (i, site) in sites.iter().enumerate() {
            let mut replay = TargetStats::new(site, &default_windows(), DEFAULT_ALERT_THRESHOLD).unwrap();
            for outcome in outcomes(i as u64, 400) {
                replay.update(outcome, Utc::now());
            }
            for spec in default_windows() {
                assert_eq!(
                    store.snapshot(&site.id, &spec.name).unwrap(),
                    replay.window(&spec.name).unwrap().snapshot(),
                    "{} window {}",
                    site.id,
                    spec.name
                );
            }
            let alert = store.alert_state(&site.id).unwrap();
            let expected = replay.alert().unwrap();
            assert_eq!(alert.state, expected.state);
            assert_eq!(alert.unavailable_since.len(), expected.unavailable_since.len());
        }
    }
}
