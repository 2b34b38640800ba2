//! Typed configuration.
//!
//! Process settings load once at startup from environment variables and fail
//! fast if required vars are missing. Sensitive values are wrapped in
//! secrecy::SecretString to prevent log leaks. Campaign tuning (hours,
//! delays) is a plain serde struct, loadable from TOML.

pub mod secrets;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.phantombuster.com";
pub const DEFAULT_LEDGER_PATH: &str = "processed_profiles.json";
/// Upper bound for any single delay or break setting.
pub const MAX_DELAY_SEC: f64 = 24.0 * 60.0 * 60.0;

#[derive(Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub base_url: String,
    pub ledger_path: PathBuf,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            credentials: Credentials::new(
                required_var("PHANTOMBUSTER_API_KEY")?,
                required_var("PHANTOMBUSTER_AGENT_ID")?,
            ),
            base_url: std::env::var("PHANTOMBUSTER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            ledger_path: ledger_path_from_env(),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Ledger location: `OUTREACH_LEDGER_PATH`, or the default file name.
pub fn ledger_path_from_env() -> PathBuf {
    std::env::var("OUTREACH_LEDGER_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_PATH))
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Action API credentials. `Debug` redacts the key.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: SecretString,
    pub agent_id: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            agent_id: agent_id.into(),
        }
    }

    /// Both the key and the agent ID are non-blank.
    pub fn is_complete(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty() && !self.agent_id.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Campaign
// ---------------------------------------------------------------------------

/// Per-run pacing and scheduling settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// First hour (24h, local) at which actions may run.
    pub start_hour: u32,
    /// Hour at which the window closes (exclusive).
    pub end_hour: u32,
    pub min_delay_sec: f64,
    pub max_delay_sec: f64,
    /// Chance, in percent, of adding an extended break after an action.
    pub extended_break_chance_pct: f64,
    pub extended_break_min_sec: f64,
    pub extended_break_max_sec: f64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
            min_delay_sec: 45.0,
            max_delay_sec: 120.0,
            extended_break_chance_pct: 15.0,
            extended_break_min_sec: 300.0,
            extended_break_max_sec: 600.0,
        }
    }
}

impl CampaignConfig {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read campaign config {}: {e}", path.display()))
        })?;
        let config: CampaignConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("bad campaign config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges. Hours must be 0-23, the break chance 0-100 and every
    /// delay within 0 and [`MAX_DELAY_SEC`].
    pub fn validate(&self) -> Result<()> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(Error::Config(format!(
                "working hours must be within 0-23, got {}-{}",
                self.start_hour, self.end_hour
            )));
        }
        if !(0.0..=100.0).contains(&self.extended_break_chance_pct) {
            return Err(Error::Config(format!(
                "extended break chance must be within 0-100, got {}",
                self.extended_break_chance_pct
            )));
        }
        let delays = [
            ("min_delay_sec", self.min_delay_sec),
            ("max_delay_sec", self.max_delay_sec),
            ("extended_break_min_sec", self.extended_break_min_sec),
            ("extended_break_max_sec", self.extended_break_max_sec),
        ];
        for (name, value) in delays {
            if !(0.0..=MAX_DELAY_SEC).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} must be within 0-{MAX_DELAY_SEC} seconds, got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine tuning
// ---------------------------------------------------------------------------

/// Suspension-point granularity for the run loop.
#[derive(Debug, Clone)]
pub struct EngineTuning {
    /// Longest single sleep inside a pacing or gate wait. Bounds how stale
    /// pause state can get.
    pub tick: Duration,
    /// How often a paused worker re-checks its gate when no signal arrives.
    pub pause_poll: Duration,
    /// How long to wait before re-checking a closed working-hours window.
    pub closed_wait: Duration,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
            pause_poll: Duration::from_millis(200),
            closed_wait: Duration::from_secs(60 * 60),
        }
    }
}
