//! The run loop: one task per run, one item at a time through
//! gate → client → ledger → pacing.

use std::sync::Arc;

use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{Instrument, error, info, warn};

use crate::action::{ActionClient, ActionResult};
use crate::config::{CampaignConfig, Credentials, EngineTuning};
use crate::event::{LogEvent, LogStatus};
use crate::ledger::Ledger;
use crate::model::{ControlState, RunId, WorkItem};
use crate::pacing::Pacer;
use crate::progress::{format_hms, rolling_average};
use crate::schedule::{Clock, WorkingHours};
use crate::telemetry::campaign::{record_outcome, start_item_span};
use crate::telemetry::metrics;

use super::Shared;
use super::suspend::{Cancelled, Suspension};

pub(crate) struct Runner {
    pub(crate) run_id: RunId,
    pub(crate) shared: Arc<Mutex<Shared>>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) client: Arc<dyn ActionClient>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) tuning: EngineTuning,
    pub(crate) credentials: Credentials,
    pub(crate) campaign: CampaignConfig,
    pub(crate) pacer: Pacer,
    pub(crate) suspension: Suspension,
}

impl Runner {
    /// Drive `queue` to exhaustion or until stopped.
    pub(crate) async fn run(mut self, queue: Vec<WorkItem>) {
        let total = queue.len();
        info!(run_id = %self.run_id, total, "campaign run started");

        let mut items = queue.into_iter().peekable();
        let outcome = loop {
            let Some(item) = items.next() else {
                break Ok(());
            };
            if let Err(c) = self.before_dispatch().await {
                break Err(c);
            }
            self.dispatch(&item).await;

            if items.peek().is_none() {
                break Ok(());
            }
            if let Err(c) = self.pace().await {
                break Err(c);
            }
        };

        self.finish(outcome);
    }

    /// Stop check, pause gate, working-hours gate.
    async fn before_dispatch(&mut self) -> Result<(), Cancelled> {
        if self.suspension.is_cancelled() {
            return Err(Cancelled);
        }
        self.suspension.wait_while_paused().await?;
        self.wait_for_working_hours().await
    }

    async fn wait_for_working_hours(&mut self) -> Result<(), Cancelled> {
        let hours = WorkingHours::from(&self.campaign);
        loop {
            let now = self.clock.now();
            if hours.is_open(&now) {
                return Ok(());
            }

            let wait = self.tuning.closed_wait;
            info!(
                run_id = %self.run_id,
                start_hour = hours.start_hour,
                end_hour = hours.end_hour,
                wait_secs = wait.as_secs(),
                "outside working hours, waiting"
            );
            metrics::gate_waits().add(1, &[]);
            self.push_log(LogEvent::new(
                now,
                None,
                LogStatus::Wait,
                format!("Outside working hours. Sleeping {}.", format_hms(wait.as_secs())),
            ));

            self.suspension.sleep(wait).await?;
            self.suspension.wait_while_paused().await?;
        }
    }

    async fn dispatch(&mut self, item: &WorkItem) {
        let span = start_item_span(self.run_id, &item.target_key);
        async {
            self.push_log(LogEvent::new(
                self.clock.now(),
                Some(&item.target_key),
                LogStatus::Start,
                "Launching action…",
            ));

            let started = Instant::now();
            let result = self.client.execute(&self.credentials, item).await;
            let elapsed = started.elapsed();
            metrics::action_duration_ms().record(elapsed.as_secs_f64() * 1000.0, &[]);

            match result {
                ActionResult::Success { container_id, .. } => {
                    record_outcome(&tracing::Span::current(), "success", elapsed);
                    metrics::actions().add(1, &[KeyValue::new("outcome", "success")]);
                    let container = container_id.as_deref().unwrap_or("unknown");
                    info!(target_key = %item.target_key, container_id = container, elapsed_secs = elapsed.as_secs_f64(), "action succeeded");

                    let now = self.clock.now();
                    let mut shared = self.shared.lock();
                    shared.logs.push(
                        LogEvent::new(
                            now,
                            Some(&item.target_key),
                            LogStatus::Success,
                            format!("Container ID: {container}"),
                        )
                        .with_elapsed(elapsed),
                    );
                    shared.processed.insert(item.target_key.clone());
                    if let Err(e) = self.ledger.save(&shared.processed) {
                        error!(path = %self.ledger.path().display(), error = %e, "ledger save failed");
                        metrics::ledger_save_failures().add(1, &[]);
                        shared.logs.push(LogEvent::new(
                            now,
                            Some(&item.target_key),
                            LogStatus::Info,
                            format!("Ledger write failed: {e}"),
                        ));
                    }
                    shared.complete_item();
                }
                ActionResult::Failure { reason } => {
                    record_outcome(&tracing::Span::current(), "error", elapsed);
                    metrics::actions().add(1, &[KeyValue::new("outcome", "error")]);
                    warn!(target_key = %item.target_key, %reason, elapsed_secs = elapsed.as_secs_f64(), "action failed");

                    let now = self.clock.now();
                    let mut shared = self.shared.lock();
                    shared.logs.push(
                        LogEvent::new(now, Some(&item.target_key), LogStatus::Error, reason)
                            .with_elapsed(elapsed),
                    );
                    shared.complete_item();
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn pace(&mut self) -> Result<(), Cancelled> {
        let delay = self.pacer.next_delay(&self.campaign);
        if delay.extended {
            let minutes = (delay.duration.as_secs_f64() / 60.0 * 10.0).round() / 10.0;
            info!(run_id = %self.run_id, minutes, "extended break");
            self.push_log(LogEvent::new(
                self.clock.now(),
                None,
                LogStatus::Info,
                format!("Extended break: ~{minutes} min"),
            ));
        }
        self.suspension.sleep(delay.duration).await
    }

    fn finish(&self, outcome: Result<(), Cancelled>) {
        let mut shared = self.shared.lock();
        shared.worker_active = false;
        let (completed, total) = (shared.metrics.completed, shared.metrics.total);
        match outcome {
            Ok(()) => {
                if shared.state.is_active() {
                    shared.transition(ControlState::Idle);
                }
                info!(run_id = %self.run_id, completed, total, "campaign run finished");
            }
            Err(Cancelled) => {
                info!(run_id = %self.run_id, completed, total, "campaign run stopped");
            }
        }
    }

    fn push_log(&self, event: LogEvent) {
        self.shared.lock().logs.push(event);
    }
}

impl Shared {
    /// Count one terminal outcome and refresh the rolling average.
    fn complete_item(&mut self) {
        self.metrics.completed += 1;
        debug_assert!(self.metrics.completed <= self.metrics.total);
        self.metrics.rolling_avg_seconds = rolling_average(&self.logs);
    }
}
