//! Integration tests for the campaign engine.
//!
//! All tests run on a paused Tokio clock, so pacing sleeps and working-hours
//! waits complete in virtual time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use outreach_rs::config::{CampaignConfig, Credentials, EngineTuning};
use outreach_rs::error::Error;
use outreach_rs::event::LogStatus;
use outreach_rs::ledger::Ledger;
use outreach_rs::model::ControlState;
use outreach_rs::schedule::ManualClock;

fn statuses(engine: &outreach_rs::engine::CampaignEngine) -> Vec<(Option<String>, LogStatus)> {
    engine
        .status()
        .logs
        .into_iter()
        .map(|e| (e.target_key, e.status))
        .collect()
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_item_is_logged_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("processed.json");
    let client = Arc::new(
        ScriptedClient::new()
            .failing("b")
            .latency(Duration::from_secs(2)),
    );
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &ledger_path, clock);

    engine
        .start(items(&["a", "b", "c"]), credentials(), steady_campaign())
        .unwrap();
    engine.wait().await;

    let key = |k: &str| Some(k.to_string());
    assert_eq!(
        statuses(&engine),
        vec![
            (key("a"), LogStatus::Start),
            (key("a"), LogStatus::Success),
            (key("b"), LogStatus::Start),
            (key("b"), LogStatus::Error),
            (key("c"), LogStatus::Start),
            (key("c"), LogStatus::Success),
        ]
    );

    let status = engine.status();
    assert_eq!(status.state, ControlState::Idle);
    assert_eq!((status.completed, status.total), (3, 3));
    assert_eq!(status.avg_seconds, Some(2.0));
    assert_eq!(status.eta_seconds, Some(0));
    assert_eq!(client.calls(), vec!["a", "b", "c"]);

    let error = &status.logs[3];
    assert_eq!(error.details, "API Error: 500 - boom");
    assert_eq!(error.elapsed_seconds, Some(2.0));
    assert_eq!(status.logs[1].details, "Container ID: c-a");

    let expected: std::collections::HashSet<String> =
        ["a".to_string(), "c".to_string()].into_iter().collect();
    assert_eq!(engine.processed(), expected);
    assert_eq!(Ledger::new(&ledger_path).load(), expected);
}

#[tokio::test(start_paused = true)]
async fn processed_keys_are_never_dispatched() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("processed.json");
    let seeded: std::collections::HashSet<String> = ["b".to_string()].into_iter().collect();
    Ledger::new(&ledger_path).save(&seeded).unwrap();

    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &ledger_path, clock);

    engine
        .start(items(&["a", "b", "c", "a"]), credentials(), steady_campaign())
        .unwrap();
    assert_eq!(engine.status().total, 2);
    engine.wait().await;

    assert_eq!(client.calls(), vec!["a", "c"]);
    assert_eq!(engine.status().completed, 2);
}

#[tokio::test(start_paused = true)]
async fn ledger_survives_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("processed.json");
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));

    let first = Arc::new(ScriptedClient::new());
    let engine = engine_with(Arc::clone(&first), &ledger_path, Arc::clone(&clock));
    engine
        .start(items(&["a", "b"]), credentials(), steady_campaign())
        .unwrap();
    engine.wait().await;
    drop(engine);

    let second = Arc::new(ScriptedClient::new());
    let engine = engine_with(Arc::clone(&second), &ledger_path, clock);
    engine
        .start(items(&["a", "b", "c"]), credentials(), steady_campaign())
        .unwrap();
    engine.wait().await;

    assert_eq!(first.calls(), vec!["a", "b"]);
    assert_eq!(second.calls(), vec!["c"]);
}

#[tokio::test(start_paused = true)]
async fn all_items_already_processed_finishes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("processed.json");
    let seeded: std::collections::HashSet<String> =
        ["a".to_string(), "b".to_string()].into_iter().collect();
    Ledger::new(&ledger_path).save(&seeded).unwrap();

    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &ledger_path, clock);

    engine
        .start(items(&["a", "b"]), credentials(), steady_campaign())
        .unwrap();
    engine.wait().await;

    let status = engine.status();
    assert_eq!(status.state, ControlState::Idle);
    assert_eq!((status.completed, status.total), (0, 0));
    assert_eq!(status.logs.len(), 1);
    assert_eq!(status.logs[0].status, LogStatus::Info);
    assert!(client.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn completed_moves_one_step_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new().latency(Duration::from_secs(1)));
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(client, &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a", "b", "c", "d"]), credentials(), steady_campaign())
        .unwrap();

    let mut seen = vec![0];
    loop {
        let status = engine.status();
        assert!(status.completed <= status.total);
        if seen.last() != Some(&status.completed) {
            seen.push(status.completed);
        }
        if status.state == ControlState::Idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn extended_breaks_are_announced() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(client, &dir.path().join("p.json"), clock);

    let campaign = CampaignConfig {
        extended_break_chance_pct: 100.0,
        extended_break_min_sec: 300.0,
        extended_break_max_sec: 300.0,
        ..steady_campaign()
    };
    engine
        .start(items(&["a", "b", "c"]), credentials(), campaign)
        .unwrap();
    engine.wait().await;

    let breaks: Vec<_> = engine
        .status()
        .logs
        .into_iter()
        .filter(|e| e.status == LogStatus::Info)
        .collect();
    // No pause after the final item.
    assert_eq!(breaks.len(), 2);
    assert_eq!(breaks[0].details, "Extended break: ~6 min");
    assert!(breaks[0].target_key.is_none());
}

// ---------------------------------------------------------------------------
// Control surface
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stop_during_pacing_sleep_prevents_further_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a", "b", "c"]), credentials(), steady_campaign())
        .unwrap();
    wait_until(&engine, |s| s.completed == 2).await;

    assert!(engine.stop());
    assert!(!engine.stop(), "second stop is a no-op");
    engine.wait().await;

    let status = engine.status();
    assert_eq!(status.state, ControlState::Stopped);
    assert_eq!(status.completed, 2);
    assert_eq!(client.calls(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn stop_lets_in_flight_action_finish() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new().latency(Duration::from_secs(10)));
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a", "b"]), credentials(), steady_campaign())
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(client.calls(), vec!["a"]);

    assert!(engine.stop());
    // Worker is still finishing "a".
    assert!(matches!(
        engine.start(items(&["z"]), credentials(), steady_campaign()),
        Err(Error::AlreadyActive)
    ));
    engine.wait().await;

    let status = engine.status();
    assert_eq!(status.state, ControlState::Stopped);
    assert_eq!(status.completed, 1);
    assert!(engine.processed().contains("a"));
    assert_eq!(client.calls(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn new_run_after_stop_picks_up_remaining_items() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a", "b", "c"]), credentials(), steady_campaign())
        .unwrap();
    wait_until(&engine, |s| s.completed == 1).await;
    engine.stop();
    engine.wait().await;

    engine
        .start(items(&["a", "b", "c"]), credentials(), steady_campaign())
        .unwrap();
    let status = engine.status();
    assert_eq!(status.total, 2);
    assert!(status.logs.is_empty(), "logs reset on start");
    engine.wait().await;

    assert_eq!(client.calls(), vec!["a", "b", "c"]);
    assert_eq!(engine.state(), ControlState::Idle);
}

#[tokio::test(start_paused = true)]
async fn pause_then_resume_keeps_order_and_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a", "b", "c"]), credentials(), steady_campaign())
        .unwrap();
    assert!(engine.pause());
    assert!(!engine.pause(), "already paused");

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(engine.state(), ControlState::Paused);
    assert!(client.calls().is_empty());

    assert!(engine.resume());
    assert!(!engine.resume(), "already running");
    engine.wait().await;

    assert_eq!(client.calls(), vec!["a", "b", "c"]);
    assert_eq!(engine.processed().len(), 3);
    assert_eq!(engine.state(), ControlState::Idle);
}

#[tokio::test(start_paused = true)]
async fn pause_during_pacing_sleep_holds_next_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a", "b"]), credentials(), steady_campaign())
        .unwrap();
    wait_until(&engine, |s| s.completed == 1).await;
    engine.pause();

    // Far longer than the 60 s pacing delay.
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(client.calls(), vec!["a"]);

    engine.resume();
    engine.wait().await;
    assert_eq!(client.calls(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn control_commands_are_noops_when_idle() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::new(ScriptedClient::new()), &dir.path().join("p.json"), clock);

    assert!(!engine.pause());
    assert!(!engine.resume());
    assert!(!engine.stop());
    assert_eq!(engine.state(), ControlState::Idle);
}

#[tokio::test(start_paused = true)]
async fn start_rejects_bad_requests() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::new(ScriptedClient::new()), &dir.path().join("p.json"), clock);

    assert!(matches!(
        engine.start(vec![], credentials(), steady_campaign()),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        engine.start(items(&["a"]), Credentials::new("", "agent"), steady_campaign()),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        engine.start(items(&["a"]), Credentials::new("key", " "), steady_campaign()),
        Err(Error::Config(_))
    ));
    let bad_hours = CampaignConfig {
        start_hour: 30,
        ..steady_campaign()
    };
    assert!(matches!(
        engine.start(items(&["a"]), credentials(), bad_hours),
        Err(Error::Config(_))
    ));
    assert_eq!(engine.state(), ControlState::Idle);

    engine
        .start(items(&["a", "b"]), credentials(), steady_campaign())
        .unwrap();
    assert!(matches!(
        engine.start(items(&["c"]), credentials(), steady_campaign()),
        Err(Error::AlreadyActive)
    ));
    engine.pause();
    assert!(matches!(
        engine.start(items(&["c"]), credentials(), steady_campaign()),
        Err(Error::AlreadyActive)
    ));
    engine.stop();
    engine.wait().await;
}

// ---------------------------------------------------------------------------
// Working hours
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn closed_window_waits_until_it_opens() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(saturday_at(10, 0)));
    let engine = engine_with(
        Arc::clone(&client),
        &dir.path().join("p.json"),
        Arc::clone(&clock),
    );

    engine
        .start(items(&["a"]), credentials(), steady_campaign())
        .unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let status = engine.status();
    assert_eq!(status.logs.len(), 1);
    assert_eq!(status.logs[0].status, LogStatus::Wait);
    assert_eq!(status.logs[0].details, "Outside working hours. Sleeping 1h 0m 0s.");
    assert!(client.calls().is_empty());

    // Still closed after an hour on a Sunday: the gate waits again.
    clock.set(saturday_at(10, 0) + chrono::TimeDelta::days(1));
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(client.calls().is_empty());
    let waits = engine
        .status()
        .logs
        .iter()
        .filter(|e| e.status == LogStatus::Wait)
        .count();
    assert_eq!(waits, 2);

    clock.set(monday_at(9, 30));
    engine.wait().await;
    assert_eq!(client.calls(), vec!["a"]);
    assert_eq!(engine.status().completed, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_working_hours_wait() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(18, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock)
        .with_tuning(EngineTuning {
            closed_wait: Duration::from_secs(3600),
            ..EngineTuning::default()
        });

    engine
        .start(items(&["a"]), credentials(), steady_campaign())
        .unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let started = tokio::time::Instant::now();
    engine.stop();
    engine.wait().await;
    assert!(started.elapsed() <= Duration::from_secs(1));
    assert!(client.calls().is_empty());
    assert_eq!(engine.state(), ControlState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn restart_is_rejected_while_stopped_run_is_finishing() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new().latency(Duration::from_secs(10)));
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a", "b"]), credentials(), steady_campaign())
        .unwrap();
    // A background waiter holds the worker handle, as the CLI does.
    let waiter = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.wait().await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(engine.stop());
    assert!(matches!(
        engine.start(items(&["x", "y", "z"]), credentials(), steady_campaign()),
        Err(Error::AlreadyActive)
    ));
    waiter.await.unwrap();

    engine
        .start(items(&["x", "y", "z"]), credentials(), steady_campaign())
        .unwrap();
    engine.wait().await;

    let status = engine.status();
    assert_eq!((status.completed, status.total), (3, 3));
    assert!(
        status
            .logs
            .iter()
            .all(|e| e.target_key.as_deref() != Some("a")),
        "previous run's outcome must not appear in the new run"
    );
    assert_eq!(client.calls(), vec!["a", "x", "y", "z"]);
}

#[tokio::test(start_paused = true)]
async fn idle_engine_accepts_new_run_without_wait() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a"]), credentials(), steady_campaign())
        .unwrap();
    wait_until(&engine, |s| s.state == ControlState::Idle).await;

    engine
        .start(items(&["b"]), credentials(), steady_campaign())
        .unwrap();
    engine.wait().await;
    assert_eq!(client.calls(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn queue_exhausted_while_paused_returns_to_idle() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new().latency(Duration::from_secs(10)));
    let clock = Arc::new(ManualClock::new(monday_at(10, 0)));
    let engine = engine_with(Arc::clone(&client), &dir.path().join("p.json"), clock);

    engine
        .start(items(&["a"]), credentials(), steady_campaign())
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(engine.pause());
    engine.wait().await;

    let status = engine.status();
    assert_eq!(status.state, ControlState::Idle);
    assert_eq!(status.completed, 1);
    assert!(!engine.resume());
}

#[tokio::test(start_paused = true)]
async fn pause_during_closed_window_suspends_gate_wait() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(saturday_at(10, 0)));
    let engine = engine_with(
        Arc::clone(&client),
        &dir.path().join("p.json"),
        Arc::clone(&clock),
    );

    engine
        .start(items(&["a"]), credentials(), steady_campaign())
        .unwrap();
    // 600 s into the 3600 s gate wait.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(engine.pause());

    clock.set(monday_at(9, 30));
    tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
    assert!(client.calls().is_empty());

    let resumed = tokio::time::Instant::now();
    assert!(engine.resume());
    wait_until(&engine, |s| {
        s.logs.iter().any(|e| e.status == LogStatus::Start)
    })
    .await;

    let waited = resumed.elapsed();
    assert!(waited >= Duration::from_secs(2999), "{waited:?}");
    assert!(waited <= Duration::from_secs(3001), "{waited:?}");
    engine.wait().await;
    assert_eq!(client.calls(), vec!["a"]);
}
