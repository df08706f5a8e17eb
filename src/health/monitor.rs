//! Background health monitor with failure-threshold alerting.
//!
//! The monitor owns one polling task per session. Each tick evaluates every
//! registered container, records the aggregate snapshot in a bounded
//! history and updates per-container consecutive-failure counters:
//!
//! - `unhealthy` or `error` increments the counter, anything else resets it.
//! - Reaching the threshold fires one alert and resets the counter to 0, so
//!   a container that stays down re-alerts every `alert_threshold` ticks.
//!
//! ```text
//!   start_monitoring ──► spawn(run) ──tick──► check_once ──► summarize
//!                                                 │
//!                                   history ◄─────┤
//!                                   counters ◄────┘──► subscribers (in order)
//!   stop_monitoring ──stop signal──► run exits (joined with timeout)
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;

use crate::config::HealthConfig;
use crate::health::evaluator::HealthEvaluator;
use crate::health::status::{HealthState, HealthStatus};
use crate::health::summary::HealthSummary;

/// Floor for the tick period; `tokio::time::interval` panics on zero.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Alert subscriber. Errors are logged and never stop the loop.
pub type AlertCallback = Arc<dyn Fn(&HealthAlert) -> anyhow::Result<()> + Send + Sync>;

/// Payload delivered to subscribers when a container crosses the threshold.
#[derive(Debug, Clone, Serialize)]
pub struct HealthAlert {
    pub container_name: String,
    /// Verdict from the tick that fired the alert.
    pub health: HealthStatus,
    /// Consecutive failures at trigger time.
    pub failure_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Session {
    watched: BTreeSet<String>,
    failure_counts: BTreeMap<String, u32>,
    history: VecDeque<HealthSummary>,
}

struct Shared {
    evaluator: Arc<HealthEvaluator>,
    alert_threshold: u32,
    history_capacity: usize,
    session: Mutex<Session>,
    subscribers: RwLock<Vec<AlertCallback>>,
}

struct Worker {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Polls a registered container set and dispatches alerts.
pub struct HealthMonitor {
    shared: Arc<Shared>,
    check_interval: Duration,
    join_timeout: Duration,
    worker: Mutex<Option<Worker>>,
}

impl HealthMonitor {
    pub fn new(evaluator: Arc<HealthEvaluator>, config: &HealthConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                evaluator,
                alert_threshold: config.alert_threshold.max(1),
                history_capacity: config.history_capacity,
                session: Mutex::new(Session::default()),
                subscribers: RwLock::new(Vec::new()),
            }),
            check_interval: config.check_interval.max(MIN_CHECK_INTERVAL),
            join_timeout: config.join_timeout,
            worker: Mutex::new(None),
        }
    }

    /// Register a container by name. Re-adding is a no-op.
    pub async fn add_container(&self, name: impl Into<String>) {
        let name = name.into();
        let mut session = self.shared.session.lock().await;
        if session.watched.insert(name.clone()) {
            session.failure_counts.insert(name.clone(), 0);
            tracing::debug!(container = %name, "Added container to health monitoring");
        }
    }

    /// Unregister a container; its failure counter is deleted.
    pub async fn remove_container(&self, name: &str) {
        let mut session = self.shared.session.lock().await;
        if session.watched.remove(name) {
            session.failure_counts.remove(name);
            tracing::debug!(container = %name, "Removed container from health monitoring");
        }
    }

    pub async fn watched(&self) -> Vec<String> {
        self.shared
            .session
            .lock()
            .await
            .watched
            .iter()
            .cloned()
            .collect()
    }

    /// Add an alert subscriber. Subscribers run in registration order.
    pub async fn subscribe(&self, callback: AlertCallback) {
        self.shared.subscribers.write().await.push(callback);
    }

    /// Spawn the polling task unless one is already running.
    pub async fn start_monitoring(&self) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let interval = self.check_interval;
        let handle = tokio::spawn(async move { run(shared, interval, stop_rx).await });
        *worker = Some(Worker { stop_tx, handle });

        let count = self.shared.session.lock().await.watched.len();
        tracing::info!(
            containers = count,
            interval_secs = interval.as_secs(),
            "Started health monitoring"
        );
    }

    /// Signal the task to exit and wait up to the join timeout, then clear
    /// the session. A task that does not exit in time is abandoned.
    pub async fn stop_monitoring(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };

        let _ = worker.stop_tx.send(true);
        match tokio::time::timeout(self.join_timeout, worker.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Health monitor task ended abnormally: {}", e),
            Err(_) => tracing::warn!(
                "Health monitor did not stop within {}s, abandoning it",
                self.join_timeout.as_secs()
            ),
        }

        let mut session = self.shared.session.lock().await;
        *session = Session::default();
        tracing::info!("Stopped health monitoring");
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Run a single monitoring tick. `None` when nothing is registered.
    pub async fn check_once(&self) -> Option<HealthSummary> {
        self.shared.check_once(None).await
    }

    /// Evaluate the registered set now without touching history or counters.
    pub async fn current_status(&self) -> HealthSummary {
        let names = self.watched().await;
        self.shared.evaluator.summarize(&names).await
    }

    /// Recorded snapshots, oldest first; `limit` keeps only the newest.
    pub async fn history(&self, limit: Option<usize>) -> Vec<HealthSummary> {
        let session = self.shared.session.lock().await;
        let skip = match limit {
            Some(limit) => session.history.len().saturating_sub(limit),
            None => 0,
        };
        session.history.iter().skip(skip).cloned().collect()
    }

    pub async fn failure_counts(&self) -> BTreeMap<String, u32> {
        self.shared.session.lock().await.failure_counts.clone()
    }
}

impl Shared {
    /// One tick. When `stop` is given and already signalled, the result is
    /// discarded so an abandoned worker cannot write into a fresh session.
    async fn check_once(&self, stop: Option<&watch::Receiver<bool>>) -> Option<HealthSummary> {
        let names: Vec<String> = {
            let session = self.session.lock().await;
            session.watched.iter().cloned().collect()
        };
        if names.is_empty() {
            return None;
        }

        let summary = self.evaluator.summarize(&names).await;

        let alerts = {
            let mut session = self.session.lock().await;
            if stop.is_some_and(|rx| *rx.borrow()) {
                return None;
            }
            session.history.push_back(summary.clone());
            while session.history.len() > self.history_capacity {
                session.history.pop_front();
            }
            self.update_counters(&mut session, &summary)
        };

        tracing::debug!(
            overall = %summary.overall,
            healthy = summary.count(HealthState::Healthy),
            total = summary.total,
            "Health check"
        );

        for alert in &alerts {
            self.dispatch(alert).await;
        }

        Some(summary)
    }

    fn update_counters(&self, session: &mut Session, summary: &HealthSummary) -> Vec<HealthAlert> {
        let mut alerts = Vec::new();
        for (name, health) in &summary.containers {
            // Removed while the tick was in flight.
            if !session.watched.contains(name) {
                continue;
            }

            let count = session.failure_counts.entry(name.clone()).or_insert(0);
            if !health.status.is_failure() {
                *count = 0;
                continue;
            }

            *count += 1;
            if *count >= self.alert_threshold {
                alerts.push(HealthAlert {
                    container_name: name.clone(),
                    health: health.clone(),
                    failure_count: *count,
                    timestamp: Utc::now(),
                });
                *count = 0;
            }
        }
        alerts
    }

    async fn dispatch(&self, alert: &HealthAlert) {
        tracing::warn!(
            container = %alert.container_name,
            failures = alert.failure_count,
            status = %alert.health.status,
            "Health alert"
        );

        let subscribers = self.subscribers.read().await.clone();
        for (index, callback) in subscribers.iter().enumerate() {
            match std::panic::catch_unwind(AssertUnwindSafe(|| callback(alert))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(subscriber = index, "Alert subscriber failed: {}", e),
                Err(_) => tracing::warn!(subscriber = index, "Alert subscriber panicked"),
            }
        }
    }
}

async fn run(shared: Arc<Shared>, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop_rx.changed() => break,
        }
        if *stop_rx.borrow() {
            break;
        }
        shared.check_once(Some(&stop_rx)).await;
    }

    tracing::debug!("Health monitor loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::runtime::{ContainerRecord, ContainerStatus, ExecOutput};
    use crate::testing::StubRuntime;

    fn monitor_with(stub: &Arc<StubRuntime>, threshold: u32) -> HealthMonitor {
        let config = HealthConfig {
            alert_threshold: threshold,
            check_interval: Duration::from_millis(20),
            history_capacity: 3,
            join_timeout: Duration::from_secs(1),
            ..HealthConfig::default()
        };
        let evaluator = Arc::new(HealthEvaluator::new(stub.clone(), &config));
        HealthMonitor::new(evaluator, &config)
    }

    fn failing_db(stub: &StubRuntime) {
        stub.insert(ContainerRecord::new(
            "id-db",
            "db",
            ContainerStatus::Running,
            "postgres:16",
        ));
        stub.script_exec(
            "pg_isready",
            ExecOutput {
                exit_code: 2,
                output: "no response".to_string(),
            },
        );
    }

    fn counting_subscriber(counter: &Arc<AtomicUsize>) -> AlertCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_alert: &HealthAlert| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_alert_fires_once_then_resets() {
        let stub = Arc::new(StubRuntime::new());
        failing_db(&stub);
        let monitor = monitor_with(&stub, 3);
        monitor.add_container("db").await;

        let fired = Arc::new(AtomicUsize::new(0));
        monitor.subscribe(counting_subscriber(&fired)).await;

        monitor.check_once().await;
        monitor.check_once().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.failure_counts().await["db"], 2);

        monitor.check_once().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.failure_counts().await["db"], 0);

        // Fourth and fifth failures do not re-fire.
        monitor.check_once().await;
        monitor.check_once().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        monitor.check_once().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let stub = Arc::new(StubRuntime::new());
        failing_db(&stub);
        let monitor = monitor_with(&stub, 3);
        monitor.add_container("db").await;

        monitor.check_once().await;
        monitor.check_once().await;
        stub.clear_exec_script("pg_isready");
        monitor.check_once().await;
        assert_eq!(monitor.failure_counts().await["db"], 0);
    }

    #[tokio::test]
    async fn test_failing_subscriber_is_isolated() {
        let stub = Arc::new(StubRuntime::new());
        failing_db(&stub);
        let monitor = monitor_with(&stub, 1);
        monitor.add_container("db").await;

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let first = Arc::clone(&order);
        monitor
            .subscribe(Arc::new(move |_a: &HealthAlert| -> anyhow::Result<()> {
                first.lock().unwrap().push("first");
                anyhow::bail!("sink offline")
            }))
            .await;
        monitor
            .subscribe(Arc::new(|_a: &HealthAlert| -> anyhow::Result<()> {
                panic!("bad subscriber")
            }))
            .await;
        let third = Arc::clone(&order);
        monitor
            .subscribe(Arc::new(move |alert: &HealthAlert| -> anyhow::Result<()> {
                assert_eq!(alert.failure_count, 1);
                third.lock().unwrap().push("third");
                Ok(())
            }))
            .await;

        monitor.check_once().await;
        assert_eq!(*order.lock().unwrap(), vec!["first", "third"]);
    }

    #[tokio::test]
    async fn test_removed_container_counter_deleted() {
        let stub = Arc::new(StubRuntime::new());
        failing_db(&stub);
        let monitor = monitor_with(&stub, 3);
        monitor.add_container("db").await;
        monitor.check_once().await;
        assert_eq!(monitor.failure_counts().await["db"], 1);

        monitor.remove_container("db").await;
        assert!(monitor.failure_counts().await.is_empty());
        assert!(monitor.check_once().await.is_none());
        assert_eq!(stub.execs().len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let stub = Arc::new(StubRuntime::new());
        failing_db(&stub);
        let monitor = monitor_with(&stub, 100);
        monitor.add_container("db").await;

        for _ in 0..5 {
            monitor.check_once().await;
        }
        assert_eq!(monitor.history(None).await.len(), 3);
        assert_eq!(monitor.history(Some(2)).await.len(), 2);
        let latest = monitor.history(Some(1)).await;
        assert_eq!(latest[0].count(HealthState::Unhealthy), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_clears_session() {
        let stub = Arc::new(StubRuntime::new());
        failing_db(&stub);
        let monitor = monitor_with(&stub, 100);
        monitor.add_container("db").await;

        monitor.start_monitoring().await;
        monitor.start_monitoring().await;
        assert!(monitor.is_running().await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!monitor.history(None).await.is_empty());

        monitor.stop_monitoring().await;
        assert!(!monitor.is_running().await);
        assert!(monitor.watched().await.is_empty());
        assert!(monitor.history(None).await.is_empty());

        // Stopping twice is harmless.
        monitor.stop_monitoring().await;
    }

    #[tokio::test]
    async fn test_zero_interval_keeps_monitor_alive() {
        let stub = Arc::new(StubRuntime::new());
        failing_db(&stub);
        let config = HealthConfig {
            check_interval: Duration::ZERO,
            alert_threshold: 100,
            join_timeout: Duration::from_secs(1),
            ..HealthConfig::default()
        };
        let evaluator = Arc::new(HealthEvaluator::new(stub.clone(), &config));
        let monitor = HealthMonitor::new(evaluator, &config);
        monitor.add_container("db").await;

        monitor.start_monitoring().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(monitor.is_running().await, "monitor task died with zero interval");
        assert!(!monitor.history(None).await.is_empty());

        monitor.stop_monitoring().await;
    }

    #[tokio::test]
    async fn test_stopped_tick_does_not_write_session() {
        let stub = Arc::new(StubRuntime::new());
        failing_db(&stub);
        let monitor = monitor_with(&stub, 1);
        monitor.add_container("db").await;
        let fired = Arc::new(AtomicUsize::new(0));
        monitor.subscribe(counting_subscriber(&fired)).await;

        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();
        drop(stop_tx);

        assert!(monitor.shared.check_once(Some(&stop_rx)).await.is_none());
        assert!(monitor.history(None).await.is_empty());
        assert_eq!(monitor.failure_counts().await["db"], 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
