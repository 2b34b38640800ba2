//! Core data model.
//!
//! A work item is one outreach target. A run drives an ordered queue of work
//! items through the engine; the engine exposes its progress as a
//! [`StatusSnapshot`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::LogEvent;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// One outreach target. Identity is `target_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Target identifier (e.g. a profile URL). Used for duplicate suppression.
    pub target_key: String,
    /// Message delivered to the target. Opaque to the engine.
    pub payload: String,
}

impl WorkItem {
    pub fn new(target_key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            target_key: target_key.into(),
            payload: payload.into(),
        }
    }
}

/// Build the run queue: every item whose key is not already processed,
/// in input order. A key repeated in the input is kept only once.
pub fn build_run_queue(items: Vec<WorkItem>, processed: &HashSet<String>) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !processed.contains(&item.target_key))
        .filter(|item| seen.insert(item.target_key.clone()))
        .collect()
}

/// Parse a JSON array of `{targetKey, payload}` objects.
///
/// Every key must be non-blank; the first offending row is reported.
pub fn parse_items(json: &str) -> Result<Vec<WorkItem>> {
    let items: Vec<WorkItem> = serde_json::from_str(json).map_err(|e| {
        Error::MalformedInput(format!("items are not a JSON array of work items: {e}"))
    })?;
    if let Some(row) = items.iter().position(|i| i.target_key.trim().is_empty()) {
        return Err(Error::MalformedInput(format!("row {row}: targetKey is empty")));
    }
    Ok(items)
}

/// Newtype for run IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Control State
// ---------------------------------------------------------------------------

/// Lifecycle state of the campaign engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlState {
    /// No run active. Also the state after a run exhausts its queue.
    #[default]
    Idle,
    /// Worker is dispatching items.
    Running,
    /// Worker is suspended at its next suspension point.
    Paused,
    /// Run was cancelled by the operator.
    Stopped,
}

impl ControlState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: ControlState) -> bool {
        use ControlState::*;
        matches!(
            (self, to),
            (Idle, Running)
                | (Stopped, Running)    // new run after stop
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopped)
                | (Paused, Stopped)
                | (Running, Idle) // queue exhausted
                | (Paused, Idle)
        )
    }

    /// Is a run in progress (running or paused)?
    pub fn is_active(self) -> bool {
        matches!(self, ControlState::Running | ControlState::Paused)
    }
}

impl std::fmt::Display for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ControlState::Idle => "idle",
            ControlState::Running => "running",
            ControlState::Paused => "paused",
            ControlState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ControlState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "idle" => Ok(ControlState::Idle),
            "running" => Ok(ControlState::Running),
            "paused" => Ok(ControlState::Paused),
            "stopped" => Ok(ControlState::Stopped),
            other => Err(format!("unknown control state: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Progress counters for the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Items that reached a terminal outcome (success or error).
    pub completed: usize,
    /// Queue length at run start.
    pub total: usize,
    /// Mean seconds per terminal item, once at least one has finished.
    pub rolling_avg_seconds: Option<f64>,
}

impl RunMetrics {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

/// Point-in-time view of the engine, for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub run_id: Option<RunId>,
    pub state: ControlState,
    pub completed: usize,
    pub total: usize,
    pub remaining: usize,
    pub avg_seconds: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub logs: Vec<LogEvent>,
}
