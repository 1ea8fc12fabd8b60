use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use safeguard_common::{Alert, AlertType, MonitorConfig, SafeguardError, Severity, Snapshot};
use safeguard_graph::recommend::generate_recommendations;
use safeguard_graph::{
    analyze_at, analyze_communities, AnalysisContext, AnalysisReport, CommunityAnalysis,
};

use crate::detect::{build_snapshot, detect_changes};
use crate::notify::dispatcher::{AlertDispatcher, DispatchSummary};
use crate::report::{
    compute_trends, recent_alerts, save_documents, stage_documents, summarize_alerts,
    MonitorReport,
};
use crate::store::{commit_all, SnapshotStore};
use crate::types::{CurrentCounts, CycleOutcome, CycleStats, MonitorState, MonitorStatus};

#[derive(Debug)]
struct StatusInner {
    state: MonitorState,
    last_check: Option<DateTime<Utc>>,
    last_error: Option<String>,
    checks_completed: u64,
    checks_failed: u64,
    alerts_raised: u64,
    current: Option<CurrentCounts>,
}

struct Scheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic monitoring: load inputs, analyze, diff against the last snapshot,
/// persist, and hand new alerts to the dispatcher.
///
/// Cycles never overlap. Scheduled ticks wait for an in-flight cycle; a manual
/// [`Monitor::check_now`] during one is rejected. Alert dispatch runs on
/// background tasks and never holds up the next cycle.
pub struct Monitor {
    config: MonitorConfig,
    store: SnapshotStore,
    dispatcher: Arc<AlertDispatcher>,
    cycle_lock: Mutex<()>,
    status: Mutex<StatusInner>,
    scheduler: Mutex<Option<Scheduler>>,
    dispatches: Mutex<JoinSet<DispatchSummary>>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, dispatcher: AlertDispatcher) -> Self {
        let store = SnapshotStore::new(config.data_dir.clone(), config.retention_days);
        Self {
            config,
            store,
            dispatcher: Arc::new(dispatcher),
            cycle_lock: Mutex::new(()),
            status: Mutex::new(StatusInner {
                state: MonitorState::Idle,
                last_check: None,
                last_error: None,
                checks_completed: 0,
                checks_failed: 0,
                alerts_raised: 0,
                current: None,
            }),
            scheduler: Mutex::new(None),
            dispatches: Mutex::new(JoinSet::new()),
        }
    }

    pub fn from_config(config: MonitorConfig) -> Self {
        let dispatcher = AlertDispatcher::from_config(&config);
        Self::new(config, dispatcher)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    fn load_inputs(&self) -> Result<AnalysisContext, SafeguardError> {
        AnalysisContext::load(&self.config.graph_path, &self.config.annotations_path)
    }

    /// One-shot analysis without touching monitoring history. Both documents
    /// are written to the data directory.
    pub fn analyze(&self) -> Result<(AnalysisReport, CommunityAnalysis), SafeguardError> {
        let ctx = self.load_inputs()?;
        let report = analyze_at(&ctx, &self.config.heuristics, Utc::now());
        let communities = analyze_communities(&ctx, &self.config.heuristics);
        save_documents(self.store.dir(), &report, &communities)?;
        Ok((report, communities))
    }

    /// Run one monitoring cycle now. Fails with `CycleInFlight` if a cycle is
    /// already running.
    pub async fn check_now(&self) -> Result<CycleOutcome, SafeguardError> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!("Check requested while a cycle is in flight, rejecting");
            return Err(SafeguardError::CycleInFlight);
        };
        self.run_cycle().await
    }

    async fn run_scheduled(&self) {
        let _guard = self.cycle_lock.lock().await;
        match self.run_cycle().await {
            Ok(outcome) => info!("Scheduled check complete. {}", outcome.stats),
            Err(e) => warn!(error = %e, "Scheduled check failed"),
        }
    }

    async fn run_cycle(&self) -> Result<CycleOutcome, SafeguardError> {
        self.status.lock().await.state = MonitorState::Running;
        let started = Instant::now();
        let now = Utc::now();

        match self.execute(now) {
            Ok((snapshot, alerts)) => {
                let stats = CycleStats {
                    danger_sources: snapshot.danger_sources.len(),
                    kids_in_pull: snapshot.kids_in_pull.len(),
                    danger_zones: snapshot.danger_zones.len(),
                    alerts_raised: alerts.len(),
                    elapsed_ms: started.elapsed().as_millis(),
                };
                {
                    let mut status = self.status.lock().await;
                    status.state = MonitorState::Idle;
                    status.last_check = Some(now);
                    status.last_error = None;
                    status.checks_completed += 1;
                    status.alerts_raised += alerts.len() as u64;
                    status.current = Some(CurrentCounts::from(&snapshot));
                }
                self.spawn_dispatch(alerts.clone()).await;
                Ok(CycleOutcome {
                    snapshot,
                    alerts,
                    stats,
                })
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Monitoring check failed");
                {
                    let mut status = self.status.lock().await;
                    status.state = MonitorState::Error;
                    status.last_error = Some(e.to_string());
                    status.checks_failed += 1;
                }
                let alert = Alert::new(
                    AlertType::MonitoringError,
                    Severity::High,
                    now,
                    "Monitoring check failed".to_string(),
                    json!({ "error": e.to_string(), "kind": e.kind() }),
                );
                self.spawn_dispatch(vec![alert]).await;
                Err(e)
            }
        }
    }

    /// Analysis, diff and persistence for one cycle. Every document is staged
    /// before any is replaced, so a failure leaves the data dir as it was.
    fn execute(&self, now: DateTime<Utc>) -> Result<(Snapshot, Vec<Alert>), SafeguardError> {
        let ctx = self.load_inputs()?;
        let h = &self.config.heuristics;

        let mut analysis = analyze_at(&ctx, h, now);
        let communities = analyze_communities(&ctx, h);
        let snapshot = build_snapshot(&analysis, now);

        let previous = self.store.latest_snapshot()?;
        let alerts = detect_changes(previous.as_ref(), &snapshot, &self.config.thresholds, now);
        analysis.recommendations = generate_recommendations(
            &analysis.kids_in_danger_pull,
            &analysis.danger_zones,
            &analysis.alias_networks,
            &alerts,
        );

        let mut staged = stage_documents(self.store.dir(), &analysis, &communities)?;
        staged.extend(self.store.stage_append(&snapshot, &alerts, now)?);
        commit_all(staged)?;
        Ok((snapshot, alerts))
    }

    async fn spawn_dispatch(&self, alerts: Vec<Alert>) {
        if alerts.is_empty() {
            return;
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        let mut tasks = self.dispatches.lock().await;
        // Reap finished sends so the set stays small on long runs.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move { dispatcher.dispatch(&alerts).await });
    }

    /// Wait for every pending alert dispatch to finish.
    pub async fn flush_dispatches(&self) -> Vec<DispatchSummary> {
        let mut tasks = std::mem::take(&mut *self.dispatches.lock().await);
        let mut summaries = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!(error = %e, "Dispatch task failed"),
            }
        }
        summaries
    }

    /// Run one check immediately, then schedule one every `interval_minutes`.
    /// A no-op if already started.
    pub async fn start(self: &Arc<Self>) {
        if self.scheduler.lock().await.is_some() {
            warn!("Monitor already started");
            return;
        }
        info!(interval_minutes = self.config.interval_minutes, "Starting monitor");
        self.run_scheduled().await;

        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_some() {
            return;
        }
        let period = Duration::from_secs(self.config.interval_minutes * 60);
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => monitor.run_scheduled().await,
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("Monitor scheduler stopped");
        });
        *scheduler = Some(Scheduler { shutdown, handle });
    }

    /// Disarm the schedule. An in-flight cycle is allowed to finish.
    pub async fn stop(&self) {
        let Some(scheduler) = self.scheduler.lock().await.take() else {
            return;
        };
        let _ = scheduler.shutdown.send(true);
        if let Err(e) = scheduler.handle.await {
            warn!(error = %e, "Monitor scheduler task ended abnormally");
        }
        info!("Monitor stopped");
    }

    /// Current state, counters and history size. Falls back to the stored
    /// history for the last check when this process has not run one yet.
    pub async fn status(&self) -> Result<MonitorStatus, SafeguardError> {
        let snapshots = self.store.load_snapshots()?;
        let alerts = self.store.load_alerts()?;
        Ok(self.status_from(&snapshots, alerts.len()).await)
    }

    async fn status_from(&self, snapshots: &[Snapshot], alert_count: usize) -> MonitorStatus {
        let scheduled = self.scheduler.lock().await.is_some();
        let inner = self.status.lock().await;
        let latest = snapshots.last();

        MonitorStatus {
            state: inner.state,
            scheduled,
            interval_minutes: self.config.interval_minutes,
            last_check: inner.last_check.or_else(|| latest.map(|s| s.timestamp)),
            last_error: inner.last_error.clone(),
            checks_completed: inner.checks_completed,
            checks_failed: inner.checks_failed,
            alerts_raised: inner.alerts_raised,
            current: inner
                .current
                .clone()
                .or_else(|| latest.map(CurrentCounts::from)),
            snapshot_count: snapshots.len(),
            alert_count,
        }
    }

    pub async fn report(&self) -> Result<MonitorReport, SafeguardError> {
        let snapshots = self.store.load_snapshots()?;
        let alerts = self.store.load_alerts()?;
        Ok(MonitorReport {
            status: self.status_from(&snapshots, alerts.len()).await,
            trends: compute_trends(&snapshots),
            alert_summary: summarize_alerts(&alerts, Utc::now()),
            recent_alerts: recent_alerts(&alerts),
        })
    }
}
