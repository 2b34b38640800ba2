//! Shared fixtures for engine tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use outreach_rs::action::{ActionClient, ActionResult};
use outreach_rs::config::{CampaignConfig, Credentials};
use outreach_rs::engine::CampaignEngine;
use outreach_rs::ledger::Ledger;
use outreach_rs::model::{StatusSnapshot, WorkItem};
use outreach_rs::schedule::ManualClock;
use parking_lot::Mutex;

/// Action client that records calls and fails the keys it is told to.
#[derive(Default)]
pub struct ScriptedClient {
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
    latency: Duration,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ActionClient for ScriptedClient {
    async fn execute(&self, _credentials: &Credentials, item: &WorkItem) -> ActionResult {
        self.calls.lock().push(item.target_key.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(&item.target_key) {
            ActionResult::failure("API Error: 500 - boom")
        } else {
            ActionResult::Success {
                container_id: Some(format!("c-{}", item.target_key)),
                data: serde_json::json!({}),
            }
        }
    }
}

/// 2025-03-03 is a Monday.
pub fn monday_at(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2025, 3, 3, hour, minute, 0)
        .single()
        .expect("unambiguous local time")
}

pub fn saturday_at(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2025, 3, 8, hour, minute, 0)
        .single()
        .expect("unambiguous local time")
}

pub fn credentials() -> Credentials {
    Credentials::new("test-key", "agent-1")
}

/// 9-17 window, a flat 60 s between actions, no extended breaks.
pub fn steady_campaign() -> CampaignConfig {
    CampaignConfig {
        start_hour: 9,
        end_hour: 17,
        min_delay_sec: 60.0,
        max_delay_sec: 60.0,
        extended_break_chance_pct: 0.0,
        extended_break_min_sec: 0.0,
        extended_break_max_sec: 0.0,
    }
}

pub fn items(keys: &[&str]) -> Vec<WorkItem> {
    keys.iter()
        .map(|k| WorkItem::new(*k, format!("hello {k}")))
        .collect()
}

pub fn engine_with(
    client: Arc<ScriptedClient>,
    ledger_path: &Path,
    clock: Arc<ManualClock>,
) -> CampaignEngine {
    CampaignEngine::new(client, Ledger::new(ledger_path))
        .with_clock(clock)
        .with_pacing_seed(7)
}

/// Poll the engine in virtual time until `done` holds.
pub async fn wait_until(
    engine: &CampaignEngine,
    done: impl Fn(&StatusSnapshot) -> bool,
) -> StatusSnapshot {
    for _ in 0..1_000_000 {
        let status = engine.status();
        if done(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition never reached: {:?}", engine.status());
}
