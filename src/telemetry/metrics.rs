//! Metric instrument factories.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("outreach-rs")
}

/// Counter: actions attempted.
/// Labels: `outcome` ("success" | "error").
pub fn actions() -> Counter<u64> {
    meter()
        .u64_counter("outreach.actions")
        .with_description("Number of outreach actions attempted")
        .build()
}

/// Histogram: action call duration in milliseconds.
pub fn action_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("outreach.action.duration_ms")
        .with_description("Action call duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: ledger writes that failed.
pub fn ledger_save_failures() -> Counter<u64> {
    meter()
        .u64_counter("outreach.ledger.save_failures")
        .with_description("Failed processed-ledger writes")
        .build()
}

/// Counter: times the run waited on a closed working-hours window.
pub fn gate_waits() -> Counter<u64> {
    meter()
        .u64_counter("outreach.gate.waits")
        .with_description("Waits caused by closed working hours")
        .build()
}
