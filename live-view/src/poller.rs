//! Fixed-period driver for state refreshes.

use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Owns the polling task. Stopping or dropping the handle cancels the timer
/// and any fetch still outstanding.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs `poll` immediately and then every `period`. A slow poll does not
/// hold back the next tick, so responses may overlap and are applied in
/// whatever order they complete.
pub fn spawn<F, Fut>(period: Duration, poll: F) -> PollHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inflight = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !inflight.is_empty() {
                        debug!(target: "poller", outstanding = inflight.len(), "previous refresh still running");
                    }
                    inflight.spawn(poll());
                }
                Some(joined) = inflight.join_next() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            warn!(target: "poller", %err, "refresh task panicked");
                        }
                    }
                }
            }
        }
    });
    PollHandle { task }
}
