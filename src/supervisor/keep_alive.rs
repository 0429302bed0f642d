use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::backoff::Backoff;
use super::runner::run_child;
use super::shutdown::ShutdownCoordinator;
use super::Replica;
use crate::config::RestartPolicy;
use crate::event::EventPublisher;
use crate::message::HiveMessage;

/// Owns the restart policy of one replica: runs the child, decides whether
/// to restart it, and sleeps the backoff delay in a cancellable way.
pub(super) struct KeepAlive {
    replica: Replica,
    backoff: Backoff,
    coordinator: Arc<ShutdownCoordinator>,
    events: EventPublisher<HiveMessage>,
}

impl KeepAlive {
    pub(super) fn new(
        replica: Replica,
        coordinator: Arc<ShutdownCoordinator>,
        events: EventPublisher<HiveMessage>,
    ) -> Self {
        Self {
            replica,
            backoff: Backoff::new(),
            coordinator,
            events,
        }
    }

    pub(super) fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub(super) fn run(self) {
        let ctx = self.coordinator.context();
        let mut backoff_count: i32 = -1;
        let mut attempt: u32 = 0;

        loop {
            let started_at = Instant::now();
            let outcome = run_child(&self.replica, attempt, &self.coordinator, &self.events);
            if outcome.torn_down {
                info!(
                    process = %self.replica.name,
                    index = self.replica.index,
                    "tearing down, not restarting"
                );
                return;
            }

            backoff_count = next_backoff_count(backoff_count, started_at.elapsed(), &self.backoff);

            let restart = match self.replica.restart {
                RestartPolicy::Never => false,
                RestartPolicy::Always => true,
                RestartPolicy::OnFailure => outcome.exit_code != 0,
            };
            if !restart {
                debug!(
                    process = %self.replica.name,
                    index = self.replica.index,
                    exit_code = outcome.exit_code,
                    "restart policy is satisfied, replica done"
                );
                return;
            }

            let delay = self.backoff.delay(backoff_count);
            info!(
                process = %self.replica.name,
                index = self.replica.index,
                delay_ms = delay.as_millis() as u64,
                "restarting child after backoff"
            );
            if ctx.wait_timeout(delay) {
                // teardown arrived mid-sleep
                return;
            }
            attempt += 1;
        }
    }
}

/// A child that stayed up past the reset threshold earns a fresh backoff
/// sequence; anything shorter escalates it.
fn next_backoff_count(current: i32, elapsed: Duration, backoff: &Backoff) -> i32 {
    if backoff.resets_after(elapsed) {
        0
    } else {
        current + 1
    }
}
