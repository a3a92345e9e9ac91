mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{
    config, harness, harness_with, runtime, test_settings, wait_until, FakeConfigSource,
    FakeDispatcher, FakeRuntimeSource,
};
use fleetdeck_controller::error::SyncError;
use fleetdeck_controller::models::{LifecycleState, OperationStatus, OperationType};
use fleetdeck_controller::sync_engine::{SyncSettings, TickOutcome};

#[tokio::test]
async fn test_initial_view_is_loading() {
    let h = harness(vec![config("team-a")], vec![]);
    let view = h.engine.view().await;

    assert!(view.is_loading);
    assert!(view.all.is_empty());
    assert!(view.error.is_none());
    assert!(!h.engine.operation_in_progress().await);
}

#[tokio::test]
async fn test_tick_reconciles_running_cluster() {
    let h = harness(
        vec![config("team-a")],
        vec![runtime("j-1", "team-a", LifecycleState::Running)],
    );

    assert_eq!(h.engine.poll_tick().await, TickOutcome::Refreshed);

    let clusters = h.engine.clusters().await;
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].name, "team-a");
    assert_eq!(clusters[0].state, LifecycleState::Running);

    let view = h.engine.view().await;
    assert!(!view.is_loading);
    assert!(!view.is_refreshing);
    assert!(view.last_refreshed_at.is_some());
    assert_eq!(view.applied_seq, 1);
}

#[tokio::test]
async fn test_tick_defaults_missing_runtime_to_terminated() {
    let h = harness(vec![config("team-b")], vec![]);
    h.engine.poll_tick().await;

    let cluster = h.engine.cluster("team-b").await.expect("team-b in snapshot");
    assert_eq!(cluster.state, LifecycleState::Terminated);
    assert!(cluster.cluster_id.is_none());
}

#[tokio::test]
async fn test_start_success_forces_extra_refresh() {
    let h = harness(vec![config("team-b")], vec![]);
    h.engine.poll_tick().await;
    assert_eq!(h.engine.completed_refreshes(), 1);
    let runtime_calls = h.runtimes.calls.load(Ordering::SeqCst);

    // Control plane reports the cluster as starting right after the command
    h.runtimes.set(vec![runtime("j-NEW", "team-b", LifecycleState::Starting)]);

    let ack = h.engine.start_cluster("team-b").await.expect("start accepted");
    assert_eq!(ack.message.as_deref(), Some("accepted"));

    let record = h.engine.last_operation().await.expect("operation recorded");
    assert_eq!(record.status, OperationStatus::Success);
    assert_eq!(record.operation_type, OperationType::Start);
    assert_eq!(record.cluster_name, "team-b");
    assert!(record.resolved_at.is_some());

    assert_eq!(h.engine.completed_refreshes(), 2);
    assert_eq!(h.runtimes.calls.load(Ordering::SeqCst), runtime_calls + 1);
    assert!(!h.engine.operation_in_progress().await);

    let cluster = h.engine.cluster("team-b").await.unwrap();
    assert_eq!(cluster.state, LifecycleState::Starting);
    assert_eq!(cluster.cluster_id.as_deref(), Some("j-NEW"));
}

#[tokio::test]
async fn test_terminate_failure_keeps_snapshot() {
    let h = harness(
        vec![config("team-a")],
        vec![runtime("j-1", "team-a", LifecycleState::Running)],
    );
    h.engine.poll_tick().await;
    let before = h.engine.all_clusters().await;

    h.dispatcher.respond(Err(SyncError::rejected("cluster busy")));
    let result = h.engine.terminate_cluster("team-a").await;

    match result {
        Err(SyncError::CommandRejected { reason }) => assert_eq!(reason, "cluster busy"),
        other => panic!("expected CommandRejected, got {:?}", other),
    }

    let record = h.engine.last_operation().await.unwrap();
    assert_eq!(record.status, OperationStatus::Error);
    assert!(record.message.unwrap().contains("cluster busy"));

    assert_eq!(h.engine.all_clusters().await, before);
    assert!(h.engine.error().await.is_none());
    assert!(!h.engine.operation_in_progress().await);
}

#[tokio::test]
async fn test_overlapping_ticks_are_skipped() {
    let h = harness_with(
        FakeConfigSource::new(vec![config("team-a")]),
        FakeRuntimeSource::gated(vec![runtime("j-1", "team-a", LifecycleState::Running)]),
        FakeDispatcher::new(),
        test_settings(),
    );

    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.poll_tick().await });

    let runtimes = h.runtimes.clone();
    wait_until(|| {
        let runtimes = runtimes.clone();
        async move { runtimes.in_flight.load(Ordering::SeqCst) == 1 }
    })
    .await;

    assert_eq!(h.engine.poll_tick().await, TickOutcome::SkippedBusy);
    assert_eq!(h.engine.refresh().await, Ok(false));

    h.runtimes.release(1);
    assert_eq!(first.await.unwrap(), TickOutcome::Refreshed);

    assert_eq!(h.runtimes.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.runtimes.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.engine.completed_refreshes(), 1);
}

#[tokio::test]
async fn test_tick_skipped_while_operation_pending() {
    let h = harness_with(
        FakeConfigSource::new(vec![config("team-a")]),
        FakeRuntimeSource::new(vec![]),
        FakeDispatcher::gated(),
        test_settings(),
    );
    h.engine.poll_tick().await;

    let engine = h.engine.clone();
    let op = tokio::spawn(async move { engine.start_cluster("team-a").await });

    let engine = h.engine.clone();
    wait_until(|| {
        let engine = engine.clone();
        async move { engine.operation_in_progress().await }
    })
    .await;

    let pending = h.engine.operation_for("team-a").await.unwrap();
    assert_eq!(pending.status, OperationStatus::Pending);
    assert_eq!(h.engine.poll_tick().await, TickOutcome::SkippedOperationPending);

    h.dispatcher.release(1);
    assert!(op.await.unwrap().is_ok());
    assert!(!h.engine.operation_in_progress().await);
    assert_eq!(h.engine.poll_tick().await, TickOutcome::Refreshed);
}

#[tokio::test]
async fn test_same_cluster_double_submit_rejected() {
    let h = harness_with(
        FakeConfigSource::new(vec![config("team-a"), config("team-b")]),
        FakeRuntimeSource::new(vec![]),
        FakeDispatcher::gated(),
        test_settings(),
    );

    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.start_cluster("team-a").await });

    let dispatcher = h.dispatcher.clone();
    wait_until(|| {
        let dispatcher = dispatcher.clone();
        async move { dispatcher.call_count() == 1 }
    })
    .await;

    let second = h.engine.start_cluster("team-a").await;
    assert_eq!(
        second,
        Err(SyncError::OperationInProgress {
            cluster_name: "team-a".to_string()
        })
    );

    // Другой кластер не блокируется
    let engine = h.engine.clone();
    let other = tokio::spawn(async move { engine.terminate_cluster("team-b").await });
    let dispatcher = h.dispatcher.clone();
    wait_until(|| {
        let dispatcher = dispatcher.clone();
        async move { dispatcher.call_count() == 2 }
    })
    .await;
    assert_eq!(h.engine.operations().await.len(), 2);

    h.dispatcher.release(2);
    assert!(first.await.unwrap().is_ok());
    assert!(other.await.unwrap().is_ok());
    assert_eq!(h.dispatcher.call_count(), 2);
}

#[tokio::test]
async fn test_fetch_failure_keeps_last_good_snapshot() {
    let h = harness(
        vec![config("team-a")],
        vec![runtime("j-1", "team-a", LifecycleState::Waiting)],
    );
    h.engine.poll_tick().await;
    let good = h.engine.all_clusters().await;

    h.configs
        .fail_with(Some(SyncError::unavailable("config store", "connection refused")));
    assert_eq!(h.engine.poll_tick().await, TickOutcome::Failed);

    let view = h.engine.view().await;
    assert_eq!(view.all, good);
    assert!(!view.is_refreshing);
    let error = view.error.expect("error surfaced");
    assert!(error.contains("connection refused"));

    h.configs.fail_with(None);
    assert_eq!(h.engine.poll_tick().await, TickOutcome::Refreshed);
    assert!(h.engine.error().await.is_none());
}

#[tokio::test]
async fn test_repeated_failures_back_off() {
    let h = harness(vec![config("team-a")], vec![]);
    h.configs
        .fail_with(Some(SyncError::unavailable("config store", "timeout")));

    assert_eq!(h.engine.poll_tick().await, TickOutcome::Failed);
    assert_eq!(h.engine.poll_tick().await, TickOutcome::Failed);
    assert_eq!(h.engine.poll_tick().await, TickOutcome::SkippedBackoff);

    // Принудительное обновление не ждёт backoff
    h.configs.fail_with(None);
    assert!(h.engine.force_refresh().await.is_ok());
    assert_eq!(h.engine.poll_tick().await, TickOutcome::Refreshed);
}

#[tokio::test]
async fn test_filter_survives_refresh() {
    let h = harness(
        vec![config("team-a"), config("team-b"), config("ops")],
        vec![],
    );
    h.engine.poll_tick().await;

    let filtered = h.engine.set_filter("TEAM").await;
    assert_eq!(filtered.len(), 2);
    assert_eq!(h.engine.filter_text().await, "TEAM");

    h.configs.configs.lock().unwrap().push(config("team-c"));
    h.engine.poll_tick().await;

    let names: Vec<_> = h.engine.clusters().await.into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["team-a", "team-b", "team-c"]);
    assert_eq!(h.engine.all_clusters().await.len(), 4);

    h.engine.set_filter("").await;
    assert_eq!(h.engine.clusters().await, h.engine.all_clusters().await);
}

#[tokio::test]
async fn test_operation_events_published() {
    let h = harness(vec![config("team-a")], vec![]);
    let mut events = h.engine.subscribe_operations();

    h.engine.start_cluster("team-a").await.unwrap();

    let pending = events.recv().await.unwrap();
    let resolved = events.recv().await.unwrap();
    assert_eq!(pending.status, OperationStatus::Pending);
    assert_eq!(resolved.status, OperationStatus::Success);
    assert_eq!(pending.id, resolved.id);
}

#[tokio::test]
async fn test_view_revision_bumps() {
    let h = harness(vec![config("team-a")], vec![]);
    let mut revisions = h.engine.subscribe_view();
    let start = *revisions.borrow_and_update();

    h.engine.poll_tick().await;
    assert!(revisions.has_changed().unwrap());
    assert!(*revisions.borrow_and_update() > start);
}

#[tokio::test(start_paused = true)]
async fn test_operation_notice_expires() {
    let h = harness(vec![config("team-a")], vec![]);

    h.engine.start_cluster("team-a").await.unwrap();
    assert!(h.engine.operation_for("team-a").await.is_some());
    assert!(h.engine.last_operation().await.is_some());

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(h.engine.operation_for("team-a").await.is_none());
    assert!(h.engine.last_operation().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_next_action_replaces_notice_before_expiry() {
    let h = harness(vec![config("team-a")], vec![]);

    h.engine.start_cluster("team-a").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    h.engine.terminate_cluster("team-a").await.unwrap();

    // Первое уведомление истекает, но не удаляет второе
    tokio::time::sleep(Duration::from_secs(3)).await;
    let record = h.engine.operation_for("team-a").await.expect("second notice kept");
    assert_eq!(record.operation_type, OperationType::Terminate);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(h.engine.operation_for("team-a").await.is_none());
}

#[tokio::test]
async fn test_dismiss_resolved_operation() {
    let h = harness(vec![config("team-a")], vec![]);
    assert!(!h.engine.dismiss_operation("team-a").await);

    h.engine.start_cluster("team-a").await.unwrap();
    assert!(h.engine.dismiss_operation("team-a").await);
    assert!(h.engine.operation_for("team-a").await.is_none());
    assert!(h.engine.last_operation().await.is_none());
}

#[tokio::test]
async fn test_poller_runs_and_stops() {
    let settings = SyncSettings {
        poll_interval: Duration::from_millis(20),
        ..test_settings()
    };
    let h = harness_with(
        FakeConfigSource::new(vec![config("team-a")]),
        FakeRuntimeSource::new(vec![]),
        FakeDispatcher::new(),
        settings,
    );

    let poller = h.engine.start();
    tokio::time::sleep(Duration::from_millis(110)).await;
    poller.shutdown().await;

    let refreshes = h.engine.completed_refreshes();
    assert!(refreshes >= 2, "expected several ticks, got {}", refreshes);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.engine.completed_refreshes(), refreshes);
}

#[tokio::test(start_paused = true)]
async fn test_hung_source_times_out() {
    let settings = SyncSettings {
        request_timeout: Duration::from_secs(2),
        ..test_settings()
    };
    let h = harness_with(
        FakeConfigSource::new(vec![config("team-a")]),
        FakeRuntimeSource::gated(vec![]),
        FakeDispatcher::new(),
        settings,
    );

    assert_eq!(h.engine.poll_tick().await, TickOutcome::Failed);
    let error = h.engine.error().await.unwrap();
    assert!(error.contains("runtime source"));
    assert!(h.engine.all_clusters().await.is_empty());
}
