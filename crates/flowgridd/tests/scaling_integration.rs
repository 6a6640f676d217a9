//! End-to-end scaling scenarios.
//!
//! Drive the cluster, predictor, and controller together in-process with
//! shortened intervals: bursts grow the fleet, idleness drains it toward
//! the floor, the floor holds, and consecutive actions respect the
//! cooldown.

use std::sync::Arc;
use std::time::Duration;

use flowgrid_autoscale::{LoadPredictor, ScaleController, ScaleDecision};
use flowgrid_cluster::Cluster;
use flowgrid_core::config::{ClusterConfig, ControllerConfig};
use flowgrid_core::Job;

fn cluster_config(initial: usize, capacity: u32, min: usize, max: usize) -> ClusterConfig {
    ClusterConfig {
        initial_nodes: initial,
        node_capacity: capacity,
        min_nodes: min,
        max_nodes: max,
        mailbox_depth: 50,
        ingress_depth: 1000,
        retry_backoff_ms: 20,
    }
}

fn controller_config(cooldown_ms: u64) -> ControllerConfig {
    ControllerConfig {
        target_latency: 200.0,
        cooldown_ms,
        step_interval_ms: 20,
    }
}

/// Drive the control loop by hand: sample load into the predictor, step
/// the controller, sleep a beat. Mirrors what the daemon's tickers do.
async fn drive(
    cluster: &Arc<Cluster>,
    predictor: &Arc<LoadPredictor>,
    controller: &mut ScaleController,
    beats: usize,
) {
    for _ in 0..beats {
        predictor.observe(cluster.total_load().await as f64);
        controller.step().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn burst_grows_the_fleet_and_completes_all_jobs() {
    let cluster = Cluster::start(&cluster_config(3, 4, 1, 10));
    let predictor = Arc::new(LoadPredictor::new(0.6));
    let mut controller = ScaleController::new(
        Arc::clone(&cluster),
        Arc::clone(&predictor),
        &controller_config(60),
    );

    // A burst well beyond the initial fleet's 12 units of capacity.
    for id in 0..30 {
        cluster
            .enqueue(Job::new(id, Duration::from_millis(300), 2))
            .await
            .unwrap();
    }

    drive(&cluster, &predictor, &mut controller, 30).await;

    let nodes = cluster.node_count().await;
    assert!(nodes > 3, "fleet did not grow under the burst: {nodes}");
    assert!(nodes <= 10, "fleet exceeded the ceiling: {nodes}");

    // Every burst job must eventually finish.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while cluster.total_load().await > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "burst jobs did not complete"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cluster.shutdown().await;
}

#[tokio::test]
async fn idle_fleet_drains_to_the_floor_one_node_per_cooldown() {
    let cluster = Cluster::start(&cluster_config(4, 8, 1, 10));
    let predictor = Arc::new(LoadPredictor::new(0.6));
    let mut controller = ScaleController::new(
        Arc::clone(&cluster),
        Arc::clone(&predictor),
        &controller_config(50),
    );

    // No traffic: latency sits at 100 (< 0.6 * 200), forecast at 0.
    drive(&cluster, &predictor, &mut controller, 25).await;

    assert_eq!(cluster.node_count().await, 1);
    assert_eq!(cluster.total_load().await, 0);
    assert_eq!(cluster.estimate_latency().await, 100.0);
    cluster.shutdown().await;
}

#[tokio::test]
async fn floor_holds_with_no_traffic() {
    let cluster = Cluster::start(&cluster_config(5, 8, 5, 10));
    let predictor = Arc::new(LoadPredictor::new(0.6));
    let mut controller = ScaleController::new(
        Arc::clone(&cluster),
        Arc::clone(&predictor),
        &controller_config(30),
    );

    drive(&cluster, &predictor, &mut controller, 20).await;

    assert_eq!(cluster.node_count().await, 5);
    cluster.shutdown().await;
}

#[tokio::test]
async fn consecutive_actions_are_separated_by_the_cooldown() {
    let cluster = Cluster::start(&cluster_config(4, 8, 1, 10));
    let predictor = Arc::new(LoadPredictor::new(0.6));
    let mut controller = ScaleController::new(
        Arc::clone(&cluster),
        Arc::clone(&predictor),
        &controller_config(150),
    );
    predictor.observe(0.0);

    // First step acts; the second, inside the cooldown, must hold.
    assert_eq!(controller.step().await, ScaleDecision::ScaleIn);
    assert_eq!(controller.step().await, ScaleDecision::Hold);
    assert_eq!(cluster.node_count().await, 3);

    // Past the cooldown the controller acts again.
    tokio::time::sleep(Duration::from_millis(170)).await;
    assert_eq!(controller.step().await, ScaleDecision::ScaleIn);
    assert_eq!(cluster.node_count().await, 2);
    cluster.shutdown().await;
}

#[tokio::test]
async fn run_loop_acts_until_shutdown_is_signalled() {
    let cluster = Cluster::start(&cluster_config(4, 8, 1, 10));
    let predictor = Arc::new(LoadPredictor::new(0.6));
    let controller = ScaleController::new(
        Arc::clone(&cluster),
        Arc::clone(&predictor),
        &controller_config(40),
    );
    predictor.observe(0.0);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(controller.run(Duration::from_millis(15), shutdown_rx));

    // Idle fleet: the loop should scale in step by step until the floor.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while cluster.node_count().await > 1 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "run loop never drained the fleet"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let _ = shutdown_tx.send(true);
    handle.await.unwrap();
    cluster.shutdown().await;
}

#[tokio::test]
async fn forecast_pressure_alone_triggers_scale_out() {
    let cluster = Cluster::start(&cluster_config(2, 8, 1, 10));
    let predictor = Arc::new(LoadPredictor::new(0.6));
    let mut controller = ScaleController::new(
        Arc::clone(&cluster),
        Arc::clone(&predictor),
        &controller_config(50),
    );

    // Latency is at its 100 floor (no load), but the forecast says demand
    // is far beyond what 2 nodes absorb: need = ceil((12 - 3) / 2) = 5.
    predictor.observe(12.0);
    assert_eq!(controller.step().await, ScaleDecision::ScaleOut(5));
    assert_eq!(cluster.node_count().await, 7);
    cluster.shutdown().await;
}
