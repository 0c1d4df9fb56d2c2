//! Named lock subsystem.
//!
//! # Data Flow
//! ```text
//! Engine operation
//!     → LockProvider::acquire(scope, timeout)
//!     → LockGuard (held for the whole read-modify-write)
//!     → released on drop, on every exit path
//! ```
//!
//! # Design Decisions
//! - Scoped acquisition: the guard owns the release
//! - Blocking acquire; `None` timeout waits forever
//! - local.rs serializes threads of one process, file.rs serializes processes
//!   sharing a directory
//! - Only local.rs is reentrant

pub mod backoff;
pub mod file;
pub mod local;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub use file::FileLockProvider;
pub use local::LocalLockProvider;

/// Errors raised while acquiring a named lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock stayed held elsewhere past the acquisition deadline.
    #[error("timed out after {waited:?} waiting for lock '{scope}'")]
    Timeout { scope: String, waited: Duration },

    /// The lock's internal state was poisoned by a panicking holder.
    #[error("lock '{scope}' is poisoned")]
    Poisoned { scope: String },

    /// The lock backend failed.
    #[error("lock '{scope}' I/O error: {source}")]
    Io {
        scope: String,
        #[source]
        source: std::io::Error,
    },
}

/// Issues named mutual-exclusion locks.
///
/// Reentrancy is backend-specific: [`LocalLockProvider`] lets the owning
/// thread re-acquire a lock it holds, [`FileLockProvider`] does not. Callers
/// must not nest acquisitions of one scope; the engine takes exactly one lock
/// per operation.
pub trait LockProvider: Send + Sync {
    /// Block until the lock for `scope` is held, or `timeout` elapses.
    fn acquire(&self, scope: &str, timeout: Option<Duration>) -> Result<LockGuard, LockError>;
}

/// Backend-specific release hook for a held lock.
pub trait HeldLock: Send {
    fn release(&mut self);
}

/// A held lock. Released on drop or by [`LockGuard::release`].
pub struct LockGuard {
    scope: String,
    held: Option<Box<dyn HeldLock>>,
}

impl LockGuard {
    pub fn new(scope: impl Into<String>, held: Box<dyn HeldLock>) -> Self {
        Self {
            scope: scope.into(),
            held: Some(held),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Release explicitly.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(mut held) = self.held.take() {
            held.release();
            tracing::trace!(scope = %self.scope, "Lock released");
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("scope", &self.scope)
            .field("held", &self.held.is_some())
            .finish()
    }
}
