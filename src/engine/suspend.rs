//! Suspension points for the run loop.
//!
//! Every wait the worker performs goes through [`Suspension`]: it returns
//! early with [`Cancelled`] once the run's token fires, and it stops the
//! clock while the pause flag is set.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The run was stopped while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

pub(crate) struct Suspension {
    cancel: CancellationToken,
    // Held so `changed()` can never observe a closed channel.
    _pause_tx: Arc<watch::Sender<bool>>,
    pause_rx: watch::Receiver<bool>,
    tick: Duration,
    pause_poll: Duration,
}

impl Suspension {
    pub(crate) fn new(
        cancel: CancellationToken,
        pause_tx: Arc<watch::Sender<bool>>,
        tick: Duration,
        pause_poll: Duration,
    ) -> Self {
        let pause_rx = pause_tx.subscribe();
        Self {
            cancel,
            _pause_tx: pause_tx,
            pause_rx,
            tick: tick.max(Duration::from_millis(1)),
            pause_poll: pause_poll.max(Duration::from_millis(1)),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block while paused.
    pub(crate) async fn wait_while_paused(&mut self) -> Result<(), Cancelled> {
        loop {
            self.check()?;
            if !*self.pause_rx.borrow_and_update() {
                return Ok(());
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Cancelled),
                _ = self.pause_rx.changed() => {}
                _ = tokio::time::sleep(self.pause_poll) => {}
            }
        }
    }

    /// Sleep for `total` of unpaused time, in steps of at most one tick.
    pub(crate) async fn sleep(&mut self, total: Duration) -> Result<(), Cancelled> {
        let mut remaining = total;
        while !remaining.is_zero() {
            self.wait_while_paused().await?;

            let step = remaining.min(self.tick);
            let started = Instant::now();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Cancelled),
                _ = self.pause_rx.changed() => {
                    // Credit the part of the step that ran before the flag flipped.
                    remaining = remaining.saturating_sub(started.elapsed().min(step));
                }
                _ = tokio::time::sleep(step) => {
                    remaining = remaining.saturating_sub(step);
                }
            }
        }
        self.check()
    }
}
