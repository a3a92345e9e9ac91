use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, SourceMode};
use crate::error::{SyncError, SyncResult};
use crate::models::{Acknowledgement, ClusterView, LifecycleState, OperationRecord, OperationType};
use crate::services::{
    filter, http, reconciler, Backoff, BackendClusterSource, CommandDispatcher, ConfigSource,
    ControlPlaneSource, HttpCommandDispatcher, ParameterStoreSource, RuntimeSource,
};

const OPERATION_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub operation_display_timeout: Duration,
    pub request_timeout: Duration,
    pub backoff_max: Duration,
    pub runtime_states: BTreeSet<LifecycleState>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            operation_display_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            backoff_max: Duration::from_secs(60),
            runtime_states: LifecycleState::ALL.into_iter().collect(),
        }
    }
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            operation_display_timeout: config.operation_display_timeout(),
            request_timeout: config.request_timeout(),
            backoff_max: config.backoff_max(),
            ..Self::default()
        }
    }
}

/// Point-in-time state exposed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncView {
    pub all: Vec<ClusterView>,
    pub filtered: Vec<ClusterView>,
    pub filter_text: String,
    pub error: Option<String>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Sequence number of the fetch that produced `all`.
    pub applied_seq: u64,
}

impl Default for SyncView {
    fn default() -> Self {
        Self {
            all: Vec::new(),
            filtered: Vec::new(),
            filter_text: String::new(),
            error: None,
            is_loading: true,
            is_refreshing: false,
            last_refreshed_at: None,
            applied_seq: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Refreshed,
    Failed,
    SkippedOperationPending,
    SkippedBusy,
    SkippedBackoff,
}

#[derive(Default)]
struct OperationBook {
    by_cluster: HashMap<String, OperationRecord>,
    last: Option<OperationRecord>,
}

/// Where a refresh gets its cluster data from.
enum ClusterFeed {
    /// Separate config and runtime sources, joined by name in the reconciler.
    Split {
        config: Arc<dyn ConfigSource>,
        runtime: Arc<dyn RuntimeSource>,
    },
    /// Records the backend already merged; fetched once per refresh.
    Merged(Arc<BackendClusterSource>),
}

struct EngineInner {
    feed: ClusterFeed,
    dispatcher: Arc<dyn CommandDispatcher>,
    settings: SyncSettings,
    view: RwLock<SyncView>,
    operations: Mutex<OperationBook>,
    refresh_guard: Mutex<()>,
    backoff: Mutex<Backoff>,
    next_seq: AtomicU64,
    completed_refreshes: AtomicU64,
    revision_tx: watch::Sender<u64>,
    events_tx: broadcast::Sender<OperationRecord>,
    shutdown: CancellationToken,
}

/// Keeps the reconciled cluster view fresh and runs lifecycle operations.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

/// Handle to a running poll loop.
pub struct PollerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!("Poller task ended abnormally: {}", e);
        }
    }
}

impl SyncEngine {
    pub fn new(
        config_source: Arc<dyn ConfigSource>,
        runtime_source: Arc<dyn RuntimeSource>,
        dispatcher: Arc<dyn CommandDispatcher>,
        settings: SyncSettings,
    ) -> Self {
        let feed = ClusterFeed::Split {
            config: config_source,
            runtime: runtime_source,
        };
        Self::with_feed(feed, dispatcher, settings)
    }

    /// Engine fed by the backend's pre-merged cluster records.
    pub fn with_backend(
        backend: Arc<BackendClusterSource>,
        dispatcher: Arc<dyn CommandDispatcher>,
        settings: SyncSettings,
    ) -> Self {
        Self::with_feed(ClusterFeed::Merged(backend), dispatcher, settings)
    }

    fn with_feed(feed: ClusterFeed, dispatcher: Arc<dyn CommandDispatcher>, settings: SyncSettings) -> Self {
        let (revision_tx, _) = watch::channel(0);
        let (events_tx, _) = broadcast::channel(OPERATION_EVENT_CAPACITY);
        let backoff = Backoff::new(settings.poll_interval, settings.backoff_max);

        Self {
            inner: Arc::new(EngineInner {
                feed,
                dispatcher,
                settings,
                view: RwLock::new(SyncView::default()),
                operations: Mutex::new(OperationBook::default()),
                refresh_guard: Mutex::new(()),
                backoff: Mutex::new(backoff),
                next_seq: AtomicU64::new(0),
                completed_refreshes: AtomicU64::new(0),
                revision_tx,
                events_tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Wires HTTP adapters according to the configured source mode.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http::build_client(config.request_timeout())?;
        let dispatcher = Arc::new(HttpCommandDispatcher::new(client.clone(), &config.backend_url));
        let settings = SyncSettings::from(config);

        let engine = match config.source_mode {
            SourceMode::Backend => {
                let backend = BackendClusterSource::new(
                    client,
                    &config.backend_url,
                    &config.config_exclude_pattern,
                );
                Self::with_backend(Arc::new(backend), dispatcher, settings)
            }
            SourceMode::Direct => {
                let configs = ParameterStoreSource::new(
                    client.clone(),
                    &config.parameters_url(),
                    &config.config_path_prefix,
                    &config.config_exclude_pattern,
                );
                let runtimes = ControlPlaneSource::new(client, &config.control_plane_clusters_url());
                Self::new(Arc::new(configs), Arc::new(runtimes), dispatcher, settings)
            }
        };

        Ok(engine)
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    // ---- polling ----

    /// Spawns the poll loop. The first tick fires immediately.
    pub fn start(&self) -> PollerHandle {
        let token = self.inner.shutdown.child_token();
        let loop_token = token.clone();
        let engine = self.clone();
        let period = self.inner.settings.poll_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Cluster poller started, interval {:?}", period);

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = loop_token.cancelled() => break,
                            outcome = engine.poll_tick() => debug!("Poll tick: {:?}", outcome),
                        }
                    }
                }
            }

            info!("Cluster poller stopped");
        });

        PollerHandle { token, task }
    }

    /// Cancels every poller and pending notice expiry spawned by this engine.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// One scheduled tick: skipped while an operation is pending, while the
    /// previous refresh is still running, or while backing off after failures.
    pub async fn poll_tick(&self) -> TickOutcome {
        if self.operation_in_progress().await {
            return TickOutcome::SkippedOperationPending;
        }
        if !self.inner.backoff.lock().await.ready(Instant::now()) {
            return TickOutcome::SkippedBackoff;
        }
        let Ok(_guard) = self.inner.refresh_guard.try_lock() else {
            return TickOutcome::SkippedBusy;
        };

        match self.fetch_and_reconcile().await {
            Ok(()) => TickOutcome::Refreshed,
            Err(_) => TickOutcome::Failed,
        }
    }

    /// Manual refresh. Returns `Ok(false)` if a refresh was already running.
    pub async fn refresh(&self) -> SyncResult<bool> {
        let Ok(_guard) = self.inner.refresh_guard.try_lock() else {
            return Ok(false);
        };
        self.fetch_and_reconcile().await.map(|_| true)
    }

    /// Refresh that waits for any running one to finish instead of skipping.
    pub async fn force_refresh(&self) -> SyncResult<()> {
        let _guard = self.inner.refresh_guard.lock().await;
        self.fetch_and_reconcile().await
    }

    /// Number of fetch-and-reconcile cycles whose snapshot was applied.
    pub fn completed_refreshes(&self) -> u64 {
        self.inner.completed_refreshes.load(Ordering::SeqCst)
    }

    /// Must be called with `refresh_guard` held.
    async fn fetch_and_reconcile(&self) -> SyncResult<()> {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.view.write().await.is_refreshing = true;

        match self.fetch_views().await {
            Ok(views) => {
                self.inner.backoff.lock().await.record_success();
                self.apply_snapshot(seq, views).await;
                Ok(())
            }
            Err(e) => {
                let delay = self.inner.backoff.lock().await.record_failure();
                warn!("Error fetching cluster data (seq {}): {}; next attempt in >= {:?}", seq, e, delay);
                self.apply_failure(seq, &e).await;
                Err(e)
            }
        }
    }

    async fn fetch_views(&self) -> SyncResult<Vec<ClusterView>> {
        let timeout = self.inner.settings.request_timeout;
        let states = &self.inner.settings.runtime_states;

        match &self.inner.feed {
            ClusterFeed::Split { config, runtime } => {
                let configs = with_timeout("config source", timeout, config.fetch());
                let runtimes = with_timeout("runtime source", timeout, runtime.fetch(states));
                let (configs, runtimes) = tokio::try_join!(configs, runtimes)?;
                Ok(reconciler::merge(&configs, &runtimes))
            }
            ClusterFeed::Merged(backend) => with_timeout("backend", timeout, backend.fetch_views(states)).await,
        }
    }

    async fn apply_snapshot(&self, seq: u64, views: Vec<ClusterView>) -> bool {
        let mut view = self.inner.view.write().await;
        if seq <= view.applied_seq {
            debug!("Discarding stale snapshot seq {} (applied {})", seq, view.applied_seq);
            return false;
        }

        view.filtered = filter::filter_clusters(&views, &view.filter_text);
        view.all = views;
        view.applied_seq = seq;
        view.error = None;
        view.is_loading = false;
        view.is_refreshing = false;
        view.last_refreshed_at = Some(Utc::now());
        drop(view);

        self.inner.completed_refreshes.fetch_add(1, Ordering::SeqCst);
        self.bump_revision();
        true
    }

    async fn apply_failure(&self, seq: u64, err: &SyncError) {
        let mut view = self.inner.view.write().await;
        view.is_loading = false;
        view.is_refreshing = false;
        if seq > view.applied_seq {
            // Last good snapshot stays on display
            view.error = Some(format!("Failed to fetch cluster data: {}", err));
        }
        drop(view);
        self.bump_revision();
    }

    fn bump_revision(&self) {
        self.inner.revision_tx.send_modify(|revision| *revision += 1);
    }

    // ---- view ----

    pub async fn view(&self) -> SyncView {
        self.inner.view.read().await.clone()
    }

    pub async fn clusters(&self) -> Vec<ClusterView> {
        self.inner.view.read().await.filtered.clone()
    }

    pub async fn all_clusters(&self) -> Vec<ClusterView> {
        self.inner.view.read().await.all.clone()
    }

    pub async fn cluster(&self, name: &str) -> Option<ClusterView> {
        self.inner
            .view
            .read()
            .await
            .all
            .iter()
            .find(|cluster| cluster.name == name)
            .cloned()
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.view.read().await.error.clone()
    }

    pub async fn filter_text(&self) -> String {
        self.inner.view.read().await.filter_text.clone()
    }

    /// Sets the filter and recomputes the filtered view from the current snapshot.
    pub async fn set_filter(&self, text: &str) -> Vec<ClusterView> {
        let mut view = self.inner.view.write().await;
        view.filter_text = text.to_string();
        view.filtered = filter::filter_clusters(&view.all, text);
        let filtered = view.filtered.clone();
        drop(view);
        self.bump_revision();
        filtered
    }

    /// Revision counter bumped on every view change.
    pub fn subscribe_view(&self) -> watch::Receiver<u64> {
        self.inner.revision_tx.subscribe()
    }

    // ---- operations ----

    pub async fn start_cluster(&self, cluster_name: &str) -> SyncResult<Acknowledgement> {
        self.submit(OperationType::Start, cluster_name).await
    }

    pub async fn terminate_cluster(&self, cluster_name: &str) -> SyncResult<Acknowledgement> {
        self.submit(OperationType::Terminate, cluster_name).await
    }

    /// Submits a lifecycle command for one cluster.
    ///
    /// Rejected with `OperationInProgress` while that cluster already has a
    /// pending command; other clusters are unaffected. Once the dispatcher
    /// answers, the record is finalized, one extra refresh is forced, and the
    /// dispatcher's error (if any) is returned to the caller.
    pub async fn submit(&self, action: OperationType, cluster_name: &str) -> SyncResult<Acknowledgement> {
        let record = {
            let mut book = self.inner.operations.lock().await;
            if book.by_cluster.get(cluster_name).is_some_and(OperationRecord::is_pending) {
                return Err(SyncError::OperationInProgress {
                    cluster_name: cluster_name.to_string(),
                });
            }
            let record = OperationRecord::pending(action, cluster_name);
            book.by_cluster.insert(cluster_name.to_string(), record.clone());
            book.last = Some(record.clone());
            record
        };
        self.publish(&record);
        info!("Submitting {} for cluster {} ({})", action, cluster_name, record.id);

        let result = with_timeout(
            "execution backend",
            self.inner.settings.request_timeout,
            self.inner.dispatcher.submit(action, cluster_name),
        )
        .await;

        match &result {
            Ok(_) => info!("{} for cluster {} accepted", action, cluster_name),
            Err(e) => error!("Error running {} for cluster {}: {}", action, cluster_name, e),
        }
        self.resolve(cluster_name, record.id, &result).await;

        if let Err(e) = self.force_refresh().await {
            warn!("Refresh after {} of {} failed: {}", action, cluster_name, e);
        }
        self.schedule_expiry(cluster_name, record.id);

        result
    }

    async fn resolve(&self, cluster_name: &str, id: Uuid, result: &SyncResult<Acknowledgement>) {
        let resolved = {
            let mut book = self.inner.operations.lock().await;
            let Some(record) = book.by_cluster.get_mut(cluster_name).filter(|r| r.id == id) else {
                return;
            };
            let changed = match result {
                Ok(_) => record.succeed(),
                Err(e) => record.fail(&e.reason()),
            };
            if !changed {
                return;
            }
            let resolved = record.clone();
            if book.last.as_ref().is_some_and(|last| last.id == id) {
                book.last = Some(resolved.clone());
            }
            resolved
        };
        self.publish(&resolved);
    }

    fn schedule_expiry(&self, cluster_name: &str, id: Uuid) {
        let display = self.inner.settings.operation_display_timeout;
        let token = self.inner.shutdown.clone();
        let inner = Arc::downgrade(&self.inner);
        let cluster_name = cluster_name.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(display) => {
                    if let Some(inner) = inner.upgrade() {
                        expire_record(&inner, &cluster_name, id).await;
                    }
                }
            }
        });
    }

    /// Clears a resolved notice for one cluster. Pending records cannot be dismissed.
    pub async fn dismiss_operation(&self, cluster_name: &str) -> bool {
        let mut book = self.inner.operations.lock().await;
        match book.by_cluster.get(cluster_name) {
            Some(record) if !record.is_pending() => {
                let id = record.id;
                book.by_cluster.remove(cluster_name);
                if book.last.as_ref().is_some_and(|last| last.id == id) {
                    book.last = None;
                }
                true
            }
            _ => false,
        }
    }

    pub async fn operation_in_progress(&self) -> bool {
        self.inner
            .operations
            .lock()
            .await
            .by_cluster
            .values()
            .any(OperationRecord::is_pending)
    }

    pub async fn operation_for(&self, cluster_name: &str) -> Option<OperationRecord> {
        self.inner.operations.lock().await.by_cluster.get(cluster_name).cloned()
    }

    pub async fn operations(&self) -> Vec<OperationRecord> {
        let mut records: Vec<_> = self
            .inner
            .operations
            .lock()
            .await
            .by_cluster
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        records
    }

    pub async fn last_operation(&self) -> Option<OperationRecord> {
        self.inner.operations.lock().await.last.clone()
    }

    /// Every record transition (pending and resolved) is published here.
    pub fn subscribe_operations(&self) -> broadcast::Receiver<OperationRecord> {
        self.inner.events_tx.subscribe()
    }

    fn publish(&self, record: &OperationRecord) {
        // No subscribers is fine
        let _ = self.inner.events_tx.send(record.clone());
    }
}

async fn expire_record(inner: &EngineInner, cluster_name: &str, id: Uuid) {
    let mut book = inner.operations.lock().await;
    let expired = book
        .by_cluster
        .get(cluster_name)
        .is_some_and(|record| record.id == id && !record.is_pending());
    if expired {
        book.by_cluster.remove(cluster_name);
        debug!("Operation notice for {} expired", cluster_name);
    }
    if book.last.as_ref().is_some_and(|last| last.id == id && !last.is_pending()) {
        book.last = None;
    }
}

async fn with_timeout<T, F>(source_name: &str, timeout: Duration, fut: F) -> SyncResult<T>
where
    F: Future<Output = SyncResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::unavailable(
            source_name,
            format!("no response within {:?}", timeout),
        )),
    }
}
