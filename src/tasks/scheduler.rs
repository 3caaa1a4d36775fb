//! Periodic cycle trigger

use super::{Task, TaskDispatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Dispatches [`Task::StartCycle`] once per interval until cancelled
pub struct CycleScheduler {
    dispatcher: Arc<dyn TaskDispatcher>,
    interval: Duration,
    cancel: CancellationToken,
}

impl CycleScheduler {
    /// Create a scheduler firing every `interval`
    pub fn new(
        dispatcher: Arc<dyn TaskDispatcher>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            interval,
            cancel,
        }
    }

    /// Run until the cancellation token fires. The first cycle starts immediately.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "cycle scheduler started");

        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatcher.dispatch(Task::StartCycle).await {
                        warn!(error = %e, "failed to start sync cycle");
                    }
                }
            }
        }

        info!("cycle scheduler shutting down");
    }
}
