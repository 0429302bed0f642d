use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Cancellation context shared between the shutdown coordinator and every
/// task that needs to observe teardown (keep-alive sleeps, flush waits).
/// Cancellation is one-way: once cancelled a context stays cancelled.
pub struct Context {
    cancelled: Arc<(Mutex<bool>, Condvar)>,
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.cancelled;
        let mut cancelled = lock.lock().unwrap();
        *cancelled = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.cancelled;
        *lock.lock().unwrap()
    }

    /// Blocks until the context is cancelled.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.cancelled;
        let mut cancelled = lock.lock().unwrap();
        while !*cancelled {
            cancelled = cvar.wait(cancelled).unwrap();
        }
    }

    /// Blocks for at most `timeout`. Returns true if the context was
    /// cancelled before the timeout elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.cancelled;
        let mut cancelled = lock.lock().unwrap();
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = cvar.wait_timeout(cancelled, deadline - now).unwrap();
            cancelled = guard;
            if result.timed_out() {
                return *cancelled;
            }
        }
        true
    }
}
