//! In-process named locks.
//!
//! # Responsibilities
//! - Hand out one mutual-exclusion lock per scope name
//! - Allow the owning thread to re-acquire a lock it already holds
//! - Honor an optional acquisition deadline
//!
//! # Design Decisions
//! - Mutex + Condvar per scope, created lazily and never dropped
//! - Waiters are all woken on release so a timed-out waiter cannot swallow
//!   the wakeup meant for another

use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::lock::{HeldLock, LockError, LockGuard, LockProvider};

#[derive(Debug, Default)]
struct Holder {
    owner: Option<ThreadId>,
    depth: usize,
}

#[derive(Debug, Default)]
struct NamedLock {
    holder: Mutex<Holder>,
    released: Condvar,
}

struct LocalHeld {
    lock: Arc<NamedLock>,
}

impl HeldLock for LocalHeld {
    fn release(&mut self) {
        let mut holder = self.lock.holder.lock().unwrap_or_else(|e| e.into_inner());
        holder.depth = holder.depth.saturating_sub(1);
        if holder.depth == 0 {
            holder.owner = None;
            self.lock.released.notify_all();
        }
    }
}

/// Named, reentrant locks shared by the threads of one process.
#[derive(Debug, Default)]
pub struct LocalLockProvider {
    locks: DashMap<String, Arc<NamedLock>>,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide provider.
    pub fn shared() -> Arc<LocalLockProvider> {
        static SHARED: OnceLock<Arc<LocalLockProvider>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(LocalLockProvider::new())).clone()
    }

    fn lock_for(&self, scope: &str) -> Arc<NamedLock> {
        self.locks.entry(scope.to_string()).or_default().value().clone()
    }
}

impl LockProvider for LocalLockProvider {
    fn acquire(&self, scope: &str, timeout: Option<Duration>) -> Result<LockGuard, LockError> {
        let lock = self.lock_for(scope);
        let me = thread::current().id();
        let started = Instant::now();
        let poisoned = || LockError::Poisoned {
            scope: scope.to_string(),
        };

        let mut holder = lock.holder.lock().map_err(|_| poisoned())?;
        loop {
            match holder.owner {
                None => {
                    holder.owner = Some(me);
                    holder.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    holder.depth += 1;
                    break;
                }
                Some(_) => {}
            }

            holder = match timeout {
                None => lock.released.wait(holder).map_err(|_| poisoned())?,
                Some(limit) => {
                    let waited = started.elapsed();
                    if waited >= limit {
                        tracing::warn!(scope = %scope, waited_ms = waited.as_millis() as u64, "Lock acquisition timed out");
                        return Err(LockError::Timeout {
                            scope: scope.to_string(),
                            waited,
                        });
                    }
                    let (next, _) = lock
                        .released
                        .wait_timeout(holder, limit - waited)
                        .map_err(|_| poisoned())?;
                    next
                }
            };
        }
        drop(holder);

        tracing::trace!(scope = %scope, "Lock acquired");
        Ok(LockGuard::new(scope, Box::new(LocalHeld { lock })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_reentrant_on_same_thread() {
        let provider = LocalLockProvider::new();
        let outer = provider.acquire("scope", None).unwrap();
        let inner = provider
            .acquire("scope", Some(Duration::from_millis(10)))
            .unwrap();
        drop(inner);
        drop(outer);

        // Fully released: another thread can take it
        let provider = Arc::new(provider);
        let p = provider.clone();
        let taken = thread::spawn(move || p.acquire("scope", Some(Duration::from_millis(100))).is_ok())
            .join()
            .unwrap();
        assert!(taken);
    }

    #[test]
    fn test_times_out_while_held_elsewhere() {
        let provider = Arc::new(LocalLockProvider::new());
        let guard = provider.acquire("busy", None).unwrap();

        let p = provider.clone();
        let result = thread::spawn(move || p.acquire("busy", Some(Duration::from_millis(30))))
            .join()
            .unwrap();
        assert!(matches!(result, Err(LockError::Timeout { .. })));

        drop(guard);
    }

    #[test]
    fn test_scopes_are_independent() {
        let provider = Arc::new(LocalLockProvider::new());
        let _a = provider.acquire("a", None).unwrap();

        let p = provider.clone();
        let result = thread::spawn(move || p.acquire("b", Some(Duration::from_millis(30))).is_ok())
            .join()
            .unwrap();
        assert!(result);
    }

    #[test]
    fn test_waiter_proceeds_after_release() {
        let provider = Arc::new(LocalLockProvider::new());
        let guard = provider.acquire("handoff", None).unwrap();

        let (tx, rx) = mpsc::channel();
        let p = provider.clone();
        let waiter = thread::spawn(move || {
            let _g = p.acquire("handoff", None).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        guard.release();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        waiter.join().unwrap();
    }
}
