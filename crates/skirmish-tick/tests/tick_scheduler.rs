//! Integration tests for the tick scheduler.
//!
//! Async tests run with `start_paused = true`: Tokio's clock only moves
//! when every task is idle, so `sleep_until` resolves exactly on schedule
//! unless a test advances time on purpose.

use std::time::Duration;

use skirmish_tick::{TickConfig, TickPolicy, TickScheduler};

fn config_20hz() -> TickConfig {
    TickConfig::with_rate(20)
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_60hz_skip() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 60);
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert_eq!(cfg.tick_duration(), Duration::from_secs_f64(1.0 / 60.0));
}

#[test]
fn test_with_rate_sets_duration() {
    assert_eq!(config_20hz().tick_duration(), Duration::from_millis(50));
}

#[test]
fn test_config_from_json() {
    let cfg: TickConfig =
        serde_json::from_str(r#"{"tick_rate_hz": 30, "policy": {"catch_up": {"max_catchup": 4}}}"#)
            .unwrap();
    assert_eq!(cfg.tick_rate_hz, 30);
    assert_eq!(cfg.policy, TickPolicy::CatchUp { max_catchup: 4 });
    assert!(cfg.metrics_enabled);
}

#[test]
fn test_zero_rate_is_clamped_not_event_driven() {
    let s = TickScheduler::with_rate(0);
    assert_eq!(s.tick_rate_hz(), 1);
    assert_eq!(s.tick_duration(), Duration::from_secs(1));
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticks_fire_in_order_with_fixed_dt() {
    let mut s = TickScheduler::new(config_20hz());

    for expected in 1..=5u32 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.dt, Duration::from_millis(50));
        assert!((info.dt_secs() - 0.05).abs() < 1e-6);
        assert!(!info.overrun);
        assert_eq!(info.ticks_skipped, 0);
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_waits_one_period() {
    let start = tokio::time::Instant::now();
    let mut s = TickScheduler::new(config_20hz());
    s.wait_for_tick().await;
    assert_eq!(start.elapsed(), Duration::from_millis(50));
}

// =========================================================================
// Overrun policies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_drops_missed_ticks() {
    let mut s = TickScheduler::new(config_20hz());
    s.wait_for_tick().await;

    // Stall for 3.5 ticks.
    tokio::time::advance(Duration::from_millis(225)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 3);
    assert_eq!(s.metrics().total_skipped, 3);

    // Next tick is a full period after the late one.
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_catchup_policy_runs_missed_ticks_immediately() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::CatchUp { max_catchup: 5 },
        ..config_20hz()
    });
    s.wait_for_tick().await;

    tokio::time::advance(Duration::from_millis(125)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);

    // The following tick is already due.
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_cadence() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..config_20hz()
    });
    s.wait_for_tick().await;

    tokio::time::advance(Duration::from_millis(60)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let s = TickScheduler::new(config_20hz());
    let m = s.metrics();
    assert_eq!(m.total_ticks, 0);
    assert_eq!(m.total_overruns, 0);
    assert_eq!(m.avg_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_tracks_work_time() {
    let mut s = TickScheduler::new(config_20hz());

    // record_tick_end measures wall-clock time, so burn a little.
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(200));
    s.record_tick_end();

    let m = s.metrics();
    assert_eq!(m.total_ticks, 1);
    assert!(m.max_tick_time > Duration::ZERO);
    assert!(m.budget_utilization > 0.0);
    assert!(m.budget_utilization < 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_tick_is_noop() {
    let mut s = TickScheduler::new(config_20hz());
    s.record_tick_end();
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_skips_averages() {
    let mut s = TickScheduler::new(TickConfig {
        metrics_enabled: false,
        ..config_20hz()
    });
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(100));
    s.record_tick_end();
    assert_eq!(s.metrics().avg_tick_time, Duration::ZERO);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// select! loop with a shutdown signal (how the game loop drives it)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_stops_on_shutdown() {
    let mut s = TickScheduler::new(config_20hz());
    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(160)).await;
        let _ = stop_tx.send(true);
    });

    let mut fired = 0u32;
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            info = s.wait_for_tick() => {
                fired += 1;
                assert_eq!(info.tick, fired);
                s.record_tick_end();
            }
        }
    }
    assert_eq!(fired, 3);
}
