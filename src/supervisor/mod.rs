pub mod backoff;
mod error;
mod keep_alive;
mod runner;
pub mod shutdown;
mod supervisor;

pub use backoff::{Backoff, BACKOFF_RESET_THRESHOLD};
pub use error::SupervisorError;
pub use shutdown::{ProcessTerminator, ShutdownCoordinator, SpawnAttempt};
pub use supervisor::Supervisor;

use crate::config::RestartPolicy;

/// One materialized instance of a process spec: the executable, its fully
/// resolved arguments, and the composed environment. `index` is assigned at
/// spawn enumeration and stays stable across restarts.
#[derive(Debug, Clone)]
pub struct Replica {
    pub index: usize,
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub forward_os_env: bool,
    pub restart: RestartPolicy,
}
