use std::sync::Arc;
use std::time::Duration;

use surge_pool::{
    ConnectionFactory, DesiredAmount, NewConnection, NoopReporter, PoolError, PoolOptions,
    PoolState, SocketPool,
};

use crate::*;

fn amount(peers: u32, timeout: u32, burst: u32, wait: i32) -> DesiredAmount {
    DesiredAmount::new(peers, timeout, burst, wait)
}

#[tokio::test(start_paused = true)]
async fn single_peer_connects() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(1, 3000, 0, 0));
    advance(150).await;

    assert_eq!(pool.sockets().len(), 1);
    assert_eq!(pool.connected_sockets().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_to_zero_terminates_once() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(1, 3000, 0, 0));
    advance(150).await;
    assert_eq!(pool.sockets().len(), 1);

    pool.set_desired_amount(amount(0, 30000, 0, 0));
    advance(150).await;

    assert!(pool.sockets().is_empty());
    assert_eq!(factory.counters.terminated(), 1);
}

#[tokio::test(start_paused = true)]
async fn shrink_terminates_exactly_the_excess() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(100, 3000, 0, 0));
    advance(150).await;
    assert_eq!(pool.sockets().len(), 100);
    assert_eq!(pool.connected_sockets().len(), 100);

    pool.set_desired_amount(amount(50, 30000, 0, 0));
    advance(150).await;

    assert_eq!(pool.sockets().len(), 50);
    assert_eq!(factory.counters.terminated(), 50);
    assert_eq!(factory.counters.created(), 100);
}

#[tokio::test(start_paused = true)]
async fn deadline_decays_target_to_zero() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(10, 1000, 0, 0));
    advance(250).await;
    assert_eq!(pool.sockets().len(), 10);
    assert_eq!(factory.counters.terminated(), 0);

    advance(1100).await;

    assert!(pool.sockets().is_empty());
    assert_eq!(factory.counters.terminated(), 10);
    assert_eq!(pool.desired().peers, 0);
}

#[tokio::test(start_paused = true)]
async fn refreshing_target_postpones_decay() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(5, 1000, 0, 0));
    advance(800).await;
    pool.set_desired_amount(amount(5, 1000, 0, 0));
    advance(800).await;

    assert_eq!(pool.sockets().len(), 5);
    assert_eq!(factory.counters.terminated(), 0);
}

#[tokio::test(start_paused = true)]
async fn burst_bounds_in_flight_attempts() {
    let factory = FakeFactory::with(Duration::from_millis(50), 0);
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(10, 60_000, 3, 20));
    advance(1000).await;

    assert_eq!(pool.connected_sockets().len(), 10);
    assert_eq!(factory.counters.created(), 10);
    assert_eq!(factory.counters.max_pending(), 3);
}

#[tokio::test(start_paused = true)]
async fn unlimited_burst_launches_everything_at_once() {
    let factory = FakeFactory::with(Duration::from_millis(50), 0);
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(10, 60_000, 0, 0));
    advance(300).await;

    assert_eq!(pool.connected_sockets().len(), 10);
    assert_eq!(factory.counters.max_pending(), 10);
}

#[tokio::test(start_paused = true)]
async fn burst_wait_paces_creation() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(6, 60_000, 2, 500));
    advance(250).await;
    // One burst launched, the loop is sleeping out the wait.
    assert_eq!(factory.counters.created(), 2);

    advance(1500).await;
    assert_eq!(pool.connected_sockets().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn negative_wait_means_no_pause() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(6, 60_000, 2, -500));
    advance(150).await;

    assert_eq!(pool.connected_sockets().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn failed_connections_are_replaced() {
    let factory = FakeFactory::with(Duration::ZERO, 4);
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(5, 60_000, 0, 0));
    advance(500).await;

    assert_eq!(pool.sockets().len(), 5);
    assert_eq!(pool.connected_sockets().len(), 5);
    assert_eq!(factory.counters.created(), 9);
}

#[tokio::test(start_paused = true)]
async fn zero_target_creates_nothing() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    advance(500).await;

    assert_eq!(factory.counters.created(), 0);
    assert!(pool.sockets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn snapshots_are_detached_copies() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(4, 60_000, 0, 0));
    advance(150).await;
    let before = pool.sockets();
    assert_eq!(before.len(), 4);

    pool.set_desired_amount(amount(1, 60_000, 0, 0));
    advance(150).await;

    assert_eq!(before.len(), 4);
    assert_eq!(pool.sockets().len(), 1);
    assert!(pool.sockets().keys().all(|id| before.contains_key(id)));
}

#[tokio::test(start_paused = true)]
async fn stop_then_restart_resumes_target() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(3, 60_000, 0, 0));
    advance(150).await;
    assert_eq!(pool.connected_sockets().len(), 3);

    pool.stop();
    pool.stopped().await;
    advance(10).await;
    assert_eq!(pool.state(), PoolState::Stopped);
    assert!(pool.sockets().is_empty());
    assert_eq!(factory.counters.terminated(), 3);

    pool.restart().await.unwrap();
    advance(150).await;
    assert_eq!(pool.connected_sockets().len(), 3);
    assert_eq!(factory.counters.created(), 6);
}

#[tokio::test(start_paused = true)]
async fn stopping_pool_cannot_be_started() {
    let factory = FakeFactory::new();
    let (pool, _fatal) = pool(factory);
    pool.start().unwrap();

    pool.stop();
    assert!(matches!(
        pool.start(),
        Err(PoolError::InvalidState(PoolState::Stopping))
    ));
}

#[tokio::test(start_paused = true)]
async fn metrics_follow_grow_shrink_and_decay() {
    let factory = FakeFactory::new();
    let (pool, _fatal, metrics) = pool_with_metrics(factory);
    pool.start().unwrap();

    pool.set_desired_amount(amount(5, 1000, 0, 0));
    advance(150).await;
    assert_eq!(sample(&metrics, "surge_desired_peers"), Some(5.0));
    assert_eq!(sample(&metrics, "surge_connected_peers"), Some(5.0));

    pool.set_desired_amount(amount(2, 1000, 0, 0));
    advance(150).await;
    assert_eq!(sample(&metrics, "surge_desired_peers"), Some(2.0));
    assert_eq!(sample(&metrics, "surge_connected_peers"), Some(2.0));

    // No further update: the deadline alone drives both series to zero.
    advance(1200).await;
    assert_eq!(pool.desired().peers, 0);
    assert_eq!(sample(&metrics, "surge_desired_peers"), Some(0.0));
    assert_eq!(sample(&metrics, "surge_connected_peers"), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn slow_disconnects_are_not_terminated_twice() {
    let factory = FakeFactory::slow_to_disconnect(Duration::from_millis(350));
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(10, 60_000, 0, 0));
    advance(150).await;
    assert_eq!(pool.connected_sockets().len(), 10);

    pool.set_desired_amount(amount(4, 60_000, 0, 0));
    advance(150).await;
    // Terminated handles stay live until their disconnect arrives.
    assert_eq!(factory.counters.terminated(), 6);
    assert_eq!(pool.sockets().len(), 10);

    // Several ticks pass while the disconnects are still in flight.
    advance(150).await;
    assert_eq!(factory.counters.terminated(), 6);
    assert_eq!(pool.sockets().len(), 10);

    advance(300).await;
    assert_eq!(pool.sockets().len(), 4);
    assert_eq!(pool.connected_sockets().len(), 4);
    assert_eq!(factory.counters.terminated(), 6);
    assert_eq!(factory.counters.created(), 10);
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_in_flight_burst() {
    let factory = FakeFactory::with(Duration::from_millis(200), 0);
    let (pool, _fatal) = pool(factory.clone());
    pool.start().unwrap();

    pool.set_desired_amount(amount(6, 60_000, 3, 0));
    advance(50).await;
    assert_eq!(factory.counters.created(), 3);

    pool.stop();
    assert_eq!(pool.state(), PoolState::Stopping);

    // The first burst is still settling, so the loop cannot have stopped.
    let early = tokio::time::timeout(Duration::from_millis(100), pool.stopped()).await;
    assert!(early.is_err(), "stopped before the burst settled");
    assert_eq!(pool.state(), PoolState::Stopping);

    pool.stopped().await;
    advance(10).await;

    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(factory.counters.pending.load(std::sync::atomic::Ordering::SeqCst), 0);
    // Every attempt settled before the drain, so every one was terminated.
    assert_eq!(factory.counters.terminated(), factory.counters.created());
    assert!(pool.sockets().is_empty());
}

struct PanickingFactory;

impl ConnectionFactory for PanickingFactory {
    fn connect(&self) -> anyhow::Result<NewConnection> {
        panic!("transport blew up");
    }
}

#[tokio::test(start_paused = true)]
async fn reconciler_panic_is_delivered_to_owner() {
    let (pool, mut fatal) = SocketPool::new(
        Arc::new(PanickingFactory),
        Arc::new(NoopReporter),
        PoolOptions::default(),
    );
    pool.start().unwrap();
    pool.set_desired_amount(amount(1, 60_000, 0, 0));

    let err = fatal.recv().await.expect("fatal error");
    assert!(matches!(err, PoolError::Panicked(_)), "{err}");

    pool.stopped().await;
    assert_eq!(pool.state(), PoolState::Stopped);
}
