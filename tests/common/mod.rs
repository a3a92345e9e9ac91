// Общие тестовые заглушки для источников данных и диспетчера команд
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use fleetdeck_controller::error::{SyncError, SyncResult};
use fleetdeck_controller::models::{
    Acknowledgement, ClusterConfig, ClusterRuntime, LifecycleState, OperationType, Timeline,
};
use fleetdeck_controller::services::{CommandDispatcher, ConfigSource, RuntimeSource};
use fleetdeck_controller::sync_engine::{SyncEngine, SyncSettings};

const OPEN_GATE: usize = 1 << 20;

pub fn config(name: &str) -> ClusterConfig {
    ClusterConfig {
        name: name.to_string(),
        raw_config: serde_json::json!({ "releaseLabel": "emr-6.15.0" }),
        source_key: format!("/application/ecdp-config/UAT/EMR-BASE/{}", name),
        last_modified: None,
    }
}

pub fn runtime(id: &str, name: &str, state: LifecycleState) -> ClusterRuntime {
    ClusterRuntime {
        control_plane_id: id.to_string(),
        name: name.to_string(),
        state,
        state_change_reason: None,
        timeline: Timeline::default(),
        applications: vec!["Spark".to_string()],
        tags: Vec::new(),
    }
}

/// Settings that keep timers out of the way unless a test asks for them.
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        poll_interval: Duration::from_secs(5),
        operation_display_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(30),
        backoff_max: Duration::from_secs(60),
        ..SyncSettings::default()
    }
}

pub struct FakeConfigSource {
    pub configs: Mutex<Vec<ClusterConfig>>,
    pub error: Mutex<Option<SyncError>>,
    pub calls: AtomicUsize,
}

impl FakeConfigSource {
    pub fn new(configs: Vec<ClusterConfig>) -> Arc<Self> {
        Arc::new(Self {
            configs: Mutex::new(configs),
            error: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_with(&self, error: Option<SyncError>) {
        *self.error.lock().unwrap() = error;
    }
}

#[async_trait]
impl ConfigSource for FakeConfigSource {
    async fn fetch(&self) -> SyncResult<Vec<ClusterConfig>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.configs.lock().unwrap().clone())
    }
}

/// Runtime source that can be held open to simulate a slow control plane.
pub struct FakeRuntimeSource {
    pub runtimes: Mutex<Vec<ClusterRuntime>>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    gate: Semaphore,
}

impl FakeRuntimeSource {
    pub fn new(runtimes: Vec<ClusterRuntime>) -> Arc<Self> {
        Self::with_permits(runtimes, OPEN_GATE)
    }

    /// Every fetch blocks until `release` is called.
    pub fn gated(runtimes: Vec<ClusterRuntime>) -> Arc<Self> {
        Self::with_permits(runtimes, 0)
    }

    fn with_permits(runtimes: Vec<ClusterRuntime>, permits: usize) -> Arc<Self> {
        Arc::new(Self {
            runtimes: Mutex::new(runtimes),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: Semaphore::new(permits),
        })
    }

    pub fn release(&self, fetches: usize) {
        self.gate.add_permits(fetches);
    }

    pub fn set(&self, runtimes: Vec<ClusterRuntime>) {
        *self.runtimes.lock().unwrap() = runtimes;
    }
}

#[async_trait]
impl RuntimeSource for FakeRuntimeSource {
    async fn fetch(&self, states: &BTreeSet<LifecycleState>) -> SyncResult<Vec<ClusterRuntime>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self
            .runtimes
            .lock()
            .unwrap()
            .iter()
            .filter(|r| states.contains(&r.state))
            .cloned()
            .collect())
    }
}

pub struct FakeDispatcher {
    pub responses: Mutex<VecDeque<SyncResult<Acknowledgement>>>,
    pub calls: Mutex<Vec<(OperationType, String)>>,
    gate: Semaphore,
}

impl FakeDispatcher {
    pub fn new() -> Arc<Self> {
        Self::with_permits(OPEN_GATE)
    }

    /// Every submit blocks until `release` is called.
    pub fn gated() -> Arc<Self> {
        Self::with_permits(0)
    }

    fn with_permits(permits: usize) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(permits),
        })
    }

    pub fn respond(&self, response: SyncResult<Acknowledgement>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn release(&self, submits: usize) {
        self.gate.add_permits(submits);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandDispatcher for FakeDispatcher {
    async fn submit(&self, action: OperationType, cluster_name: &str) -> SyncResult<Acknowledgement> {
        self.calls.lock().unwrap().push((action, cluster_name.to_string()));
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();

        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(Acknowledgement {
                status: Some(serde_json::json!(200)),
                message: Some("accepted".to_string()),
            })
        })
    }
}

pub struct Harness {
    pub engine: SyncEngine,
    pub configs: Arc<FakeConfigSource>,
    pub runtimes: Arc<FakeRuntimeSource>,
    pub dispatcher: Arc<FakeDispatcher>,
}

pub fn harness_with(
    configs: Arc<FakeConfigSource>,
    runtimes: Arc<FakeRuntimeSource>,
    dispatcher: Arc<FakeDispatcher>,
    settings: SyncSettings,
) -> Harness {
    let engine = SyncEngine::new(configs.clone(), runtimes.clone(), dispatcher.clone(), settings);
    Harness {
        engine,
        configs,
        runtimes,
        dispatcher,
    }
}

pub fn harness(configs: Vec<ClusterConfig>, runtimes: Vec<ClusterRuntime>) -> Harness {
    harness_with(
        FakeConfigSource::new(configs),
        FakeRuntimeSource::new(runtimes),
        FakeDispatcher::new(),
        test_settings(),
    )
}

/// Yields until `check` holds, giving spawned tasks a chance to run.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..1000 {
        if check().await {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
