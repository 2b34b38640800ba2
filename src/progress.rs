//! Rolling-average and ETA estimation.

use std::time::Duration;

use crate::event::LogEvent;

/// Mean `elapsed_seconds` across terminal events. `None` until one exists.
pub fn rolling_average(logs: &[LogEvent]) -> Option<f64> {
    let (sum, count) = logs
        .iter()
        .filter(|e| e.status.is_terminal())
        .filter_map(|e| e.elapsed_seconds)
        .fold((0.0, 0usize), |(sum, n), secs| (sum + secs, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Estimated time left for `remaining` items at `avg_seconds` each.
pub fn eta(remaining: usize, avg_seconds: Option<f64>) -> Option<Duration> {
    let avg = avg_seconds.filter(|a| a.is_finite() && *a >= 0.0)?;
    Duration::try_from_secs_f64(remaining as f64 * avg).ok()
}

/// Render seconds as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_hms(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
