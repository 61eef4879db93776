//! Scheduler module for running probes and feeding the stats store.

mod reporter;

pub use reporter::*;

use crate::metrics::{AlertState, AlertTransition, ProbeOutcome, ProbeStatus, StatsStore, Target};
use crate::probe::Probe;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Upper bound of the random delay before a target's first probe.
const DEFAULT_START_JITTER: Duration = Duration::from_millis(100);

/// Runs one polling loop per target.
pub struct Scheduler<P> {
    store: Arc<StatsStore>,
    probe: Arc<P>,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    start_jitter: Duration,
}

impl<P: Probe> Scheduler<P> {
    /// Create a new scheduler feeding the given store.
    pub fn new(store: Arc<StatsStore>, probe: P) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            store,
            probe: Arc::new(probe),
            stop_tx,
            tasks: Mutex::new(HashMap::new()),
            start_jitter: DEFAULT_START_JITTER,
        }
    }

    /// Spread the first probes of all targets over `jitter`.
    pub fn with_start_jitter(mut self, jitter: Duration) -> Self {
        self.start_jitter = jitter;
        self
    }

    /// Launch a polling loop for every target and return immediately.
    ///
    /// Targets whose interval does not fit the configured windows are
    /// skipped. Returns the number of loops started.
    pub fn start_monitoring(&self, targets: Vec<Target>) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut started = 0;

        for target in targets {
            if tasks.contains_key(&target.id) {
                continue; // Already running
            }

            if let Err(e) = self.store.validate(&target) {
                tracing::error!(url = %target.id, "Not monitoring: {}", e);
                continue;
            }

            tracing::info!(
                url = %target.id,
                "Scheduler: Adding target (every {:?})",
                target.poll_interval
            );

            let id = target.id.clone();
            let handle = tokio::spawn(run_probe_loop(
                target,
                self.store.clone(),
                self.probe.clone(),
                self.stop_tx.subscribe(),
                self.start_jitter,
            ));
            tasks.insert(id, handle);
            started += 1;
        }

        started
    }

    /// Signal every polling loop to exit.
    pub fn stop_monitoring(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop monitoring and wait for every loop to exit.
    pub async fn shutdown(&self) {
        self.stop_monitoring();

        let tasks: Vec<(String, JoinHandle<()>)> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.drain().collect()
        };

        for (id, handle) in tasks {
            if let Err(e) = handle.await {
                tracing::error!(url = %id, "Polling loop failed: {}", e);
            }
        }
    }

    /// Receiver that flips to `true` once monitoring stops.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub fn store(&self) -> &Arc<StatsStore> {
        &self.store
    }
}

/// Run the probe loop for a single target.
///
/// The probe is awaited inline, so a target never has two probes in flight;
/// ticks missed while a probe is pending are skipped.
async fn run_probe_loop<P: Probe>(
    target: Target,
    store: Arc<StatsStore>,
    probe: Arc<P>,
    mut stop_rx: watch::Receiver<bool>,
    start_jitter: Duration,
) {
    // Add jitter to avoid thundering herd
    let jitter_ms = start_jitter.as_millis() as u64;
    let jitter = if jitter_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::random::<u64>() % jitter_ms)
    };

    let start = tokio::time::Instant::now() + jitter;
    let mut interval = tokio::time::interval_at(start, target.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *stop_rx.borrow() {
            break;
        }

        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = interval.tick() => {}
        }

        let started = Instant::now();
        // An in-flight probe is discarded on stop; its outcome is never applied.
        let result = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            result = probe.probe(&target.id) => result,
        };

        let outcome = match result {
            Ok(reading) => ProbeOutcome::new(reading.elapsed, ProbeStatus::Code(reading.status)),
            Err(e) => {
                tracing::debug!(url = %target.id, "Probe failed: {}", e);
                ProbeOutcome::failed(started.elapsed())
            }
        };

        match store.record(&target, outcome) {
            Ok(Some(transition)) => log_transition(&target, &transition),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(url = %target.id, "Cannot record outcome: {}", e);
                break;
            }
        }
    }

    tracing::debug!(url = %target.id, "Polling loop stopped");
}

fn log_transition(target: &Target, transition: &AlertTransition) {
    let availability = transition.availability * 100.0;
    let at = transition.at.format("%Y-%m-%d %H:%M:%S");
    match transition.to {
        AlertState::Unavailable => tracing::warn!(
            url = %target.id,
            "Website is down. availability={:.1}%, time={}",
            availability,
            at
        ),
        AlertState::Available => tracing::info!(
            url = %target.id,
            "Website recovered. availability={:.1}%, time={}",
            availability,
            at
        ),
    }
}
