use std::collections::HashMap;
use std::io;
use std::process::{Child, Command};
use std::sync::Mutex;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{info, warn};

use crate::context::Context;

/// Daemon-wide teardown state: the tearing-down flag and the registry of
/// running children live under one mutex so signal delivery and spawns
/// cannot interleave.
pub struct ShutdownCoordinator {
    state: Mutex<State>,
    ctx: Context,
}

struct State {
    tearing_down: bool,
    children: HashMap<usize, u32>,
}

/// Outcome of a spawn request made through the coordinator.
#[derive(Debug)]
pub enum SpawnAttempt {
    /// Teardown was already in progress; nothing was spawned.
    TornDown,
    Failed(io::Error),
    Spawned(Child),
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tearing_down: false,
                children: HashMap::new(),
            }),
            ctx: Context::new(),
        }
    }

    /// Context cancelled when teardown begins; keep-alive loops use it for
    /// cancellable backoff sleeps.
    pub fn context(&self) -> Context {
        self.ctx.clone()
    }

    pub fn is_tearing_down(&self) -> bool {
        self.state.lock().unwrap().tearing_down
    }

    /// Spawns `command` and registers the child under `index`, all while
    /// holding the shutdown lock: a teardown that has already started
    /// refuses the spawn, and one that starts later will see the child.
    pub fn try_spawn(&self, index: usize, command: &mut Command) -> SpawnAttempt {
        let mut state = self.state.lock().unwrap();
        if state.tearing_down {
            return SpawnAttempt::TornDown;
        }
        match command.spawn() {
            Ok(child) => {
                state.children.insert(index, child.id());
                SpawnAttempt::Spawned(child)
            }
            Err(err) => SpawnAttempt::Failed(err),
        }
    }

    /// Removes the child registered under `index` once it has exited.
    /// During teardown the entry is left in place so the coordinator can
    /// observe completion. Returns whether teardown is in progress.
    pub fn deregister(&self, index: usize) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.tearing_down {
            state.children.remove(&index);
        }
        state.tearing_down
    }

    /// Enters teardown: sets the flag, wakes every cancellable sleep, and
    /// delivers a polite interrupt (escalating to a forceful kill) to every
    /// registered child. Safe to call more than once.
    pub fn shutdown_all(&self) {
        let children: Vec<(usize, u32)> = {
            let mut state = self.state.lock().unwrap();
            state.tearing_down = true;
            state.children.iter().map(|(i, p)| (*i, *p)).collect()
        };
        self.ctx.cancel();

        for (index, pid) in children {
            ProcessTerminator::new(pid).shutdown(index);
        }
    }

    #[cfg(test)]
    pub(crate) fn registered_children(&self) -> usize {
        self.state.lock().unwrap().children.len()
    }
}

/// Kills one child: SIGINT first, SIGKILL if the interrupt cannot be
/// delivered.
pub struct ProcessTerminator {
    pid: u32,
}

impl ProcessTerminator {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }

    pub fn shutdown(self, index: usize) {
        let pid = Pid::from_raw(self.pid as i32);
        match signal::kill(pid, Signal::SIGINT) {
            Ok(()) => info!(index, pid = self.pid, "sent interrupt to child"),
            Err(err) => {
                warn!(
                    index,
                    pid = self.pid,
                    "interrupt failed ({err}), killing child"
                );
                match signal::kill(pid, Signal::SIGKILL) {
                    Ok(()) => info!(index, pid = self.pid, "killed child"),
                    Err(err) => warn!(index, pid = self.pid, "kill failed: {err}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::process::{Command, Stdio};

    use assert_matches::assert_matches;

    use super::*;

    fn sleeper() -> Command {
        let mut cmd = Command::new("sleep");
        cmd.arg("30").stdin(Stdio::null());
        cmd
    }

    #[test]
    fn spawn_registers_and_deregister_removes() {
        let coordinator = ShutdownCoordinator::new();
        let attempt = coordinator.try_spawn(0, &mut sleeper());
        let mut child = match attempt {
            SpawnAttempt::Spawned(child) => child,
            _ => panic!("expected spawn to succeed"),
        };
        assert_eq!(1, coordinator.registered_children());

        child.kill().unwrap();
        child.wait().unwrap();

        assert!(!coordinator.deregister(0));
        assert_eq!(0, coordinator.registered_children());
    }

    #[test]
    fn spawn_failure_registers_nothing() {
        let coordinator = ShutdownCoordinator::new();
        let mut command = Command::new("surely-not-an-installed-binary");
        assert_matches!(
            coordinator.try_spawn(0, &mut command),
            SpawnAttempt::Failed(_)
        );
        assert_eq!(0, coordinator.registered_children());
    }

    #[test]
    fn teardown_refuses_new_spawns() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown_all();
        assert!(coordinator.is_tearing_down());
        assert!(coordinator.context().is_cancelled());

        assert_matches!(
            coordinator.try_spawn(0, &mut sleeper()),
            SpawnAttempt::TornDown
        );
    }

    #[test]
    fn teardown_interrupts_registered_children() {
        let coordinator = ShutdownCoordinator::new();
        let mut child = match coordinator.try_spawn(0, &mut sleeper()) {
            SpawnAttempt::Spawned(child) => child,
            _ => panic!("expected spawn to succeed"),
        };

        coordinator.shutdown_all();

        // the interrupt terminates the sleep; wait() reaps it
        let status = child.wait().unwrap();
        assert!(!status.success());

        // deregister during teardown keeps the entry observable
        assert!(coordinator.deregister(0));
        assert_eq!(1, coordinator.registered_children());
    }
}
