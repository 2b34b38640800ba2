//! Structured log events emitted by the engine during a run.
//!
//! The event list is the engine's voice: consumers read it to build
//! dashboards or export it as CSV. It grows for the lifetime of a run and is
//! cleared when the next run starts.

use std::io;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A structured event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Local wall-clock time the event was recorded.
    pub timestamp: DateTime<Local>,
    /// Item the event concerns, if any.
    pub target_key: Option<String>,
    pub status: LogStatus,
    pub details: String,
    /// Duration of the action call, on terminal events.
    pub elapsed_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    Start,
    Success,
    Error,
    Wait,
    Info,
}

impl LogStatus {
    /// Does this status close out an item?
    pub fn is_terminal(self) -> bool {
        matches!(self, LogStatus::Success | LogStatus::Error)
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogStatus::Start => "START",
            LogStatus::Success => "SUCCESS",
            LogStatus::Error => "ERROR",
            LogStatus::Wait => "WAIT",
            LogStatus::Info => "INFO",
        };
        write!(f, "{s}")
    }
}

impl LogEvent {
    pub fn new(
        timestamp: DateTime<Local>,
        target_key: Option<&str>,
        status: LogStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            target_key: target_key.map(str::to_string),
            status,
            details: details.into(),
            elapsed_seconds: None,
        }
    }

    /// Attach an elapsed duration, rounded to two decimals.
    pub fn with_elapsed(mut self, elapsed: std::time::Duration) -> Self {
        self.elapsed_seconds = Some((elapsed.as_secs_f64() * 100.0).round() / 100.0);
        self
    }
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CsvRow<'a> {
    time: String,
    #[serde(rename = "targetKey")]
    target_key: &'a str,
    status: String,
    details: &'a str,
    #[serde(rename = "elapsedSeconds")]
    elapsed_seconds: Option<f64>,
}

/// Write events as CSV with columns `time,targetKey,status,details,elapsedSeconds`.
pub fn write_csv<W: io::Write>(events: &[LogEvent], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if events.is_empty() {
        csv.write_record(["time", "targetKey", "status", "details", "elapsedSeconds"])
            .map_err(csv_error)?;
    }
    for event in events {
        csv.serialize(CsvRow {
            time: event.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            target_key: event.target_key.as_deref().unwrap_or(""),
            status: event.status.to_string(),
            details: &event.details,
            elapsed_seconds: event.elapsed_seconds,
        })
        .map_err(csv_error)?;
    }
    csv.flush()?;
    Ok(())
}

/// Render events as a CSV string.
pub fn to_csv_string(events: &[LogEvent]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(events, &mut buf)?;
    String::from_utf8(buf).map_err(|e| crate::error::Error::Other(format!("csv not utf-8: {e}")))
}

fn csv_error(e: csv::Error) -> crate::error::Error {
    crate::error::Error::Other(format!("csv export failed: {e}"))
}

/// Default export file name, e.g. `outreach_logs_20250101_093000.csv`.
pub fn export_file_name(now: DateTime<Local>) -> String {
    format!("outreach_logs_{}.csv", now.format("%Y%m%d_%H%M%S"))
}
