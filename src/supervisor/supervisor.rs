use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use tracing::{error, info, warn};

use super::backoff::Backoff;
use super::error::SupervisorError;
use super::keep_alive::KeepAlive;
use super::shutdown::ShutdownCoordinator;
use super::Replica;
use crate::config::HiveSpec;
use crate::event::EventPublisher;
use crate::message::HiveMessage;
use crate::sequence;

/// Orchestrates one hive run: validates argument allocation, fans out one
/// keep-alive loop per replica, and waits for all of them. Owns the
/// shutdown coordinator the signal handler acts through.
pub struct Supervisor {
    spec: HiveSpec,
    events: EventPublisher<HiveMessage>,
    coordinator: Arc<ShutdownCoordinator>,
    backoff: Backoff,
}

impl Supervisor {
    pub fn new(spec: HiveSpec, events: EventPublisher<HiveMessage>) -> Self {
        Self {
            spec,
            events,
            coordinator: Arc::new(ShutdownCoordinator::new()),
            backoff: Backoff::new(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Installs the SIGINT/SIGTERM handler. On signal the coordinator
    /// enters teardown and interrupts every registered child.
    pub fn install_signal_handler(&self) -> Result<(), SupervisorError> {
        let coordinator = self.coordinator();
        ctrlc::set_handler(move || {
            warn!("termination signal received, tearing down");
            coordinator.shutdown_all();
        })?;
        Ok(())
    }

    /// Runs the hive to completion. Returning closes the event pipeline:
    /// by then every keep-alive loop has dropped its publisher clone.
    pub fn run(self) -> Result<(), SupervisorError> {
        // Fail on over-subscribed sequences before anything spawns; the
        // allocations made here are discarded.
        sequence::validate_allocation(&self.spec)?;

        let mut used = HashSet::new();
        let mut handles = Vec::with_capacity(self.spec.replica_count());
        let mut index: usize = 0;

        'enumerate: for process in &self.spec.spec.processes {
            // cmd is validated non-empty at load time
            let Some((program, arg_templates)) = process.cmd.split_first() else {
                continue;
            };
            for _ in 0..process.replicas {
                if self.coordinator.is_tearing_down() {
                    warn!("teardown in progress, skipping remaining replica spawns");
                    break 'enumerate;
                }

                let args = sequence::resolve_args(arg_templates, &mut used)?;
                let replica = Replica {
                    index,
                    name: process.name.clone(),
                    program: program.clone(),
                    args,
                    env: process.env_pairs(),
                    forward_os_env: process.forward_os_env,
                    restart: process.restart,
                };

                let keep_alive =
                    KeepAlive::new(replica, self.coordinator(), self.events.clone())
                        .with_backoff(self.backoff.clone());
                let handle = thread::Builder::new()
                    .name(format!("keep-alive-{index}"))
                    .spawn(move || keep_alive.run())?;
                handles.push(handle);
                index += 1;
            }
        }

        info!(replicas = handles.len(), "supervising replicas");
        for handle in handles {
            if handle.join().is_err() {
                error!("keep-alive thread panicked");
            }
        }
        info!("all replicas finished");
        Ok(())
    }
}
