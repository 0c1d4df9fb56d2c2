//! Cross-process locks backed by OS file locks.
//!
//! # Responsibilities
//! - Serialize processes that share a lock directory
//! - Poll a contended lock with jittered backoff until acquired or timed out
//!
//! # Design Decisions
//! - A lock is an exclusive advisory lock (`flock` / `LockFileEx`) on
//!   `<dir>/<scope>.lock`; the file is created once and never deleted
//! - The OS drops the lock when the holder's handle closes, including when the
//!   holder crashes, so there is no stale-lock recovery to race on
//! - Every acquire opens its own handle, so threads of one process exclude
//!   each other too
//! - Not reentrant: a second acquire from the same holder waits like any other

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::lock::backoff::PollBackoff;
use crate::lock::{HeldLock, LockError, LockGuard, LockProvider};

/// Named locks shared between processes through a directory.
#[derive(Debug, Clone)]
pub struct FileLockProvider {
    dir: PathBuf,
    poll_base: Duration,
    poll_max: Duration,
}

struct FileHeld {
    file: File,
    path: PathBuf,
}

impl HeldLock for FileHeld {
    fn release(&mut self) {
        // Closing the handle on drop releases the lock even if this fails
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to unlock lock file");
        }
    }
}

impl FileLockProvider {
    /// Create a provider rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            poll_base: Duration::from_millis(5),
            poll_max: Duration::from_millis(200),
        })
    }

    pub fn with_poll_interval(mut self, base: Duration, max: Duration) -> Self {
        self.poll_base = base;
        self.poll_max = max;
        self
    }

    pub fn lock_path(&self, scope: &str) -> PathBuf {
        let name: String = scope
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.lock", name))
    }
}

/// Open (creating if absent) a file used only as a lock handle.
pub(crate) fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == fs2::lock_contended_error().kind()
}

impl LockProvider for FileLockProvider {
    fn acquire(&self, scope: &str, timeout: Option<Duration>) -> Result<LockGuard, LockError> {
        let path = self.lock_path(scope);
        let io_error = |source: io::Error| LockError::Io {
            scope: scope.to_string(),
            source,
        };
        let file = open_lock_file(&path).map_err(io_error)?;
        let started = Instant::now();
        let mut backoff = PollBackoff::new(self.poll_base, self.poll_max);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::trace!(scope = %scope, attempts = backoff.attempts(), "File lock acquired");
                    return Ok(LockGuard::new(scope, Box::new(FileHeld { file, path })));
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(io_error(e)),
            }

            let mut delay = backoff.next_delay();
            if let Some(limit) = timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    tracing::warn!(scope = %scope, waited_ms = waited.as_millis() as u64, "File lock acquisition timed out");
                    return Err(LockError::Timeout {
                        scope: scope.to_string(),
                        waited,
                    });
                }
                delay = delay.min(limit - waited);
            }
            thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn test_lock_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileLockProvider::new(dir.path()).unwrap();
        let path = provider.lock_path("orders/api");
        assert_eq!(path.file_name().unwrap(), "orders_api.lock");

        let guard = provider.acquire("orders/api", None).unwrap();
        assert!(path.exists());
        guard.release();

        // The file stays; only the OS lock is dropped
        assert!(path.exists());
        let again = provider.acquire("orders/api", Some(Duration::from_millis(50)));
        assert!(again.is_ok());
    }

    #[test]
    fn test_second_provider_waits_then_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileLockProvider::new(dir.path()).unwrap();
        let b = FileLockProvider::new(dir.path()).unwrap();

        let _held = a.acquire("shared", None).unwrap();
        let started = Instant::now();
        let result = b.acquire("shared", Some(Duration::from_millis(40)));
        assert!(matches!(result, Err(LockError::Timeout { .. })));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_waiter_acquires_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FileLockProvider::new(dir.path()).unwrap());
        let guard = provider.acquire("handoff", None).unwrap();

        let p = provider.clone();
        let waiter = thread::spawn(move || p.acquire("handoff", Some(Duration::from_secs(5))).is_ok());

        thread::sleep(Duration::from_millis(30));
        drop(guard);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_leftover_lock_file_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileLockProvider::new(dir.path()).unwrap();

        // A holder that crashed leaves the file behind but not the OS lock
        fs::write(provider.lock_path("crashed"), "dead-owner").unwrap();

        let guard = provider.acquire("crashed", Some(Duration::from_millis(100)));
        assert!(guard.is_ok());
    }

    #[test]
    fn test_handoff_keeps_exclusion() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileLockProvider::new(dir.path()).unwrap();
        let second = FileLockProvider::new(dir.path()).unwrap();
        let third = FileLockProvider::new(dir.path()).unwrap();

        let guard = first.acquire("s", None).unwrap();
        let (tx, rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let successor = thread::spawn(move || {
            let _g = second.acquire("s", Some(Duration::from_secs(5))).unwrap();
            tx.send(()).unwrap();
            done_rx.recv().unwrap();
        });

        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // The earlier holder's release never frees the successor's lock
        let contender = third.acquire("s", Some(Duration::from_millis(40)));
        assert!(matches!(contender, Err(LockError::Timeout { .. })));

        done_tx.send(()).unwrap();
        successor.join().unwrap();
        assert!(third.acquire("s", Some(Duration::from_secs(1))).is_ok());
    }
}
