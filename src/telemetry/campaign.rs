//! Campaign span helpers.
//!
//! One span per dispatched item; outcome fields are declared empty and
//! filled in by [`record_outcome`].

use std::time::Duration;

use tracing::Span;

use crate::model::{ControlState, RunId};

/// Start a span for one item's action.
pub fn start_item_span(run_id: RunId, target_key: &str) -> Span {
    tracing::info_span!(
        "campaign.item",
        "campaign.run_id" = %run_id,
        "campaign.target_key" = target_key,
        "campaign.outcome" = tracing::field::Empty,
        "campaign.elapsed_ms" = tracing::field::Empty,
    )
}

/// Record an item's outcome on its span.
pub fn record_outcome(span: &Span, outcome: &str, elapsed: Duration) {
    span.record("campaign.outcome", outcome);
    span.record("campaign.elapsed_ms", elapsed.as_millis() as u64);
}

/// Emit a control-state transition event.
pub fn record_control_transition(run_id: Option<RunId>, from: ControlState, to: ControlState) {
    match run_id {
        Some(run_id) => tracing::info!(%run_id, %from, %to, "control_transition"),
        None => tracing::info!(%from, %to, "control_transition"),
    }
}
