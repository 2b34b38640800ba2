//! Action client: launches one outreach action per work item.
//!
//! The engine only sees [`ActionResult`]. Transport errors, non-200
//! responses and unreadable bodies all become `Failure` with a readable
//! reason; nothing escapes this boundary as an error.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::config::Credentials;
use crate::config::secrets::ExposeSecret;
use crate::error::{Error, Result};
use crate::model::WorkItem;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const API_KEY_HEADER: &str = "X-Phantombuster-Key-1";
const MAX_REQUESTS_PER_DAY: u32 = 20;

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Success {
        /// Remote job identifier, when the API reports one.
        container_id: Option<String>,
        data: serde_json::Value,
    },
    Failure {
        reason: String,
    },
}

impl ActionResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        ActionResult::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success { .. })
    }
}

/// Performs the external action for a single item.
#[async_trait]
pub trait ActionClient: Send + Sync {
    async fn execute(&self, credentials: &Credentials, item: &WorkItem) -> ActionResult;
}

// ---------------------------------------------------------------------------
// PhantomBuster
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct LaunchRequest<'a> {
    arguments: LaunchArguments<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchArguments<'a> {
    specific_profile_url: &'a str,
    message: &'a str,
    delay: u32,
    max_requests_per_day: u32,
    randomize_delay: bool,
}

/// Agent-launch client for the PhantomBuster API.
#[derive(Debug, Clone)]
pub struct PhantomClient {
    http: reqwest::Client,
    base_url: String,
}

impl PhantomClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn launch_url(&self, agent_id: &str) -> String {
        format!("{}/api/v2/agents/{agent_id}/launch", self.base_url)
    }

    async fn launch(&self, credentials: &Credentials, item: &WorkItem) -> Result<serde_json::Value> {
        // Secondary delay the agent applies on its side.
        let delay = rand::thread_rng().gen_range(3..=8);
        let body = LaunchRequest {
            arguments: LaunchArguments {
                specific_profile_url: &item.target_key,
                message: &item.payload,
                delay,
                max_requests_per_day: MAX_REQUESTS_PER_DAY,
                randomize_delay: true,
            },
        };

        let url = self.launch_url(&credentials.agent_id);
        debug!(%url, target_key = %item.target_key, "launching agent");

        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, credentials.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(Error::Api {
                status: status.as_u16(),
                body: error_body(resp.text().await),
            });
        }
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Body of a non-200 response. An unreadable body is reported as empty so
/// the status still reaches the caller.
fn error_body<E: std::fmt::Display>(body: std::result::Result<String, E>) -> String {
    body.unwrap_or_else(|e| {
        debug!(error = %e, "could not read error response body");
        String::new()
    })
}

#[async_trait]
impl ActionClient for PhantomClient {
    async fn execute(&self, credentials: &Credentials, item: &WorkItem) -> ActionResult {
        match self.launch(credentials, item).await {
            Ok(data) => {
                let container_id = match data.get("containerId") {
                    Some(serde_json::Value::String(s)) => Some(s.clone()),
                    Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                ActionResult::Success { container_id, data }
            }
            Err(Error::Api { status, body }) => {
                ActionResult::failure(format!("API Error: {status} - {body}"))
            }
            Err(Error::Network(e)) => ActionResult::failure(format!("Network error: {e}")),
            Err(Error::Json(e)) => ActionResult::failure(format!("Malformed response: {e}")),
            Err(e) => ActionResult::failure(e.to_string()),
        }
    }
}
