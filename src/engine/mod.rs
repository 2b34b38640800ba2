//! Campaign engine: the control surface over a single background run.
//!
//! The engine owns every piece of mutable run state behind one lock. The
//! presentation layer holds a cloned handle, issues `start`/`pause`/
//! `resume`/`stop`, and polls `status`.
//!
//! ```text
//! Idle ──start──▶ Running ◀──resume── Paused
//!   ▲               │  └────pause────▶  │
//!   └──exhausted────┤                   │
//!                   └──────stop─────▶ Stopped ◀──stop──┘
//! ```

mod runner;
pub mod suspend;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::action::ActionClient;
use crate::config::{CampaignConfig, Credentials, EngineTuning};
use crate::error::{Error, Result};
use crate::event::{LogEvent, LogStatus};
use crate::ledger::Ledger;
use crate::model::{ControlState, RunId, RunMetrics, StatusSnapshot, WorkItem, build_run_queue};
use crate::pacing::Pacer;
use crate::progress::eta;
use crate::schedule::{Clock, SystemClock};
use crate::telemetry::campaign::record_control_transition;

use runner::Runner;
use suspend::Suspension;

/// State shared between the control surface and the worker.
pub(crate) struct Shared {
    state: ControlState,
    run_id: Option<RunId>,
    processed: HashSet<String>,
    logs: Vec<LogEvent>,
    metrics: RunMetrics,
    cancel: CancellationToken,
    /// A worker task owns this state until it clears the flag on exit.
    worker_active: bool,
}

impl Shared {
    fn transition(&mut self, to: ControlState) -> bool {
        let from = self.state;
        if !from.can_transition_to(to) {
            return false;
        }
        self.state = to;
        record_control_transition(self.run_id, from, to);
        true
    }
}

/// Handle to the campaign engine. Clones share the same engine.
pub struct CampaignEngine {
    shared: Arc<Mutex<Shared>>,
    ledger: Arc<Ledger>,
    client: Arc<dyn ActionClient>,
    clock: Arc<dyn Clock>,
    pause_tx: Arc<watch::Sender<bool>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tuning: EngineTuning,
    pacing_seed: Option<u64>,
}

impl Clone for CampaignEngine {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            ledger: Arc::clone(&self.ledger),
            client: Arc::clone(&self.client),
            clock: Arc::clone(&self.clock),
            pause_tx: Arc::clone(&self.pause_tx),
            worker: Arc::clone(&self.worker),
            tuning: self.tuning.clone(),
            pacing_seed: self.pacing_seed,
        }
    }
}

impl CampaignEngine {
    /// Create an engine and load the processed ledger.
    pub fn new(client: Arc<dyn ActionClient>, ledger: Ledger) -> Self {
        let processed = ledger.load();
        info!(path = %ledger.path().display(), processed = processed.len(), "engine ready");
        let (pause_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: ControlState::Idle,
                run_id: None,
                processed,
                logs: Vec::new(),
                metrics: RunMetrics::default(),
                cancel: CancellationToken::new(),
                worker_active: false,
            })),
            ledger: Arc::new(ledger),
            client,
            clock: Arc::new(SystemClock),
            pause_tx: Arc::new(pause_tx),
            worker: Arc::new(Mutex::new(None)),
            tuning: EngineTuning::default(),
            pacing_seed: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tuning(mut self, tuning: EngineTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Make pacing delays reproducible.
    pub fn with_pacing_seed(mut self, seed: u64) -> Self {
        self.pacing_seed = Some(seed);
        self
    }

    /// Start a run over `items`.
    ///
    /// Items already in the ledger are skipped. Must be called from within a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyActive`] while a run is running, paused, or still
    /// finishing its in-flight action after a stop; [`Error::Config`] for an
    /// empty item list, incomplete credentials, or invalid campaign settings.
    pub fn start(
        &self,
        items: Vec<WorkItem>,
        credentials: Credentials,
        campaign: CampaignConfig,
    ) -> Result<RunId> {
        let mut worker = self.worker.lock();
        if items.is_empty() {
            return Err(Error::Config("no work items to process".to_string()));
        }
        if !credentials.is_complete() {
            return Err(Error::Config(
                "API key and agent ID are required".to_string(),
            ));
        }
        campaign.validate()?;

        let run_id = RunId::new();
        let input_len = items.len();
        let cancel = CancellationToken::new();

        let queue = {
            let mut shared = self.shared.lock();
            if shared.worker_active || shared.state.is_active() {
                return Err(Error::AlreadyActive);
            }
            let queue = build_run_queue(items, &shared.processed);

            shared.run_id = Some(run_id);
            shared.logs.clear();
            shared.metrics = RunMetrics {
                completed: 0,
                total: queue.len(),
                rolling_avg_seconds: None,
            };
            shared.cancel = cancel.clone();
            self.pause_tx.send_replace(false);
            shared.transition(ControlState::Running);

            if queue.is_empty() {
                shared.logs.push(LogEvent::new(
                    self.clock.now(),
                    None,
                    LogStatus::Info,
                    format!("All {input_len} items already processed."),
                ));
                shared.transition(ControlState::Idle);
                info!(%run_id, input_len, "nothing left to process");
                return Ok(run_id);
            }
            shared.worker_active = true;
            queue
        };

        info!(
            %run_id,
            queued = queue.len(),
            skipped = input_len - queue.len(),
            "starting campaign run"
        );

        let runner = Runner {
            run_id,
            shared: Arc::clone(&self.shared),
            ledger: Arc::clone(&self.ledger),
            client: Arc::clone(&self.client),
            clock: Arc::clone(&self.clock),
            tuning: self.tuning.clone(),
            credentials,
            campaign,
            pacer: self.pacing_seed.map(Pacer::seeded).unwrap_or_default(),
            suspension: Suspension::new(
                cancel,
                Arc::clone(&self.pause_tx),
                self.tuning.tick,
                self.tuning.pause_poll,
            ),
        };
        *worker = Some(tokio::spawn(runner.run(queue)));
        Ok(run_id)
    }

    /// Pause a running run. Returns whether the state changed.
    pub fn pause(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.state != ControlState::Running {
            return false;
        }
        self.pause_tx.send_replace(true);
        shared.transition(ControlState::Paused)
    }

    /// Resume a paused run. Returns whether the state changed.
    pub fn resume(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.state != ControlState::Paused {
            return false;
        }
        self.pause_tx.send_replace(false);
        shared.transition(ControlState::Running)
    }

    /// Stop the active run. The in-flight action, if any, still completes.
    /// Returns whether the state changed.
    pub fn stop(&self) -> bool {
        let mut shared = self.shared.lock();
        if !shared.state.is_active() {
            return false;
        }
        shared.cancel.cancel();
        self.pause_tx.send_replace(false);
        shared.transition(ControlState::Stopped)
    }

    /// Current state, progress, ETA and logs.
    pub fn status(&self) -> StatusSnapshot {
        let shared = self.shared.lock();
        let metrics = shared.metrics;
        StatusSnapshot {
            run_id: shared.run_id,
            state: shared.state,
            completed: metrics.completed,
            total: metrics.total,
            remaining: metrics.remaining(),
            avg_seconds: metrics.rolling_avg_seconds,
            eta_seconds: eta(metrics.remaining(), metrics.rolling_avg_seconds)
                .map(|d| d.as_secs()),
            logs: shared.logs.clone(),
        }
    }

    pub fn state(&self) -> ControlState {
        self.shared.lock().state
    }

    /// Snapshot of the processed-key set.
    pub fn processed(&self) -> HashSet<String> {
        self.shared.lock().processed.clone()
    }

    /// Wait for the current run's worker to exit.
    ///
    /// Only one caller observes the exit; later calls return at once.
    pub async fn wait(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(error = %e, "campaign worker panicked");
            let mut shared = self.shared.lock();
            shared.worker_active = false;
            if shared.state.is_active() {
                shared.transition(ControlState::Stopped);
            }
        }
    }
}
