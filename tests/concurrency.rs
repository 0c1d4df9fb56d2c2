//! Concurrent access to shared breaker state.

use std::sync::Arc;
use std::time::Duration;

use circuit_breaker::breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerEngine, ErrorType, TripOutcome,
};
use circuit_breaker::config::LockScope;
use circuit_breaker::lock::{FileLockProvider, LocalLockProvider, LockProvider};
use circuit_breaker::store::{FileStore, MemoryStore};

mod common;

const WORKERS: usize = 8;
const TRIPS_PER_WORKER: usize = 50;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_lost_updates_across_engines() {
    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(LocalLockProvider::new());
    let engines = [
        common::engine_over(store.clone(), locks.clone()),
        common::engine_over(store.clone(), locks.clone()),
    ];

    let mut handles = Vec::new();
    for i in 0..WORKERS {
        let cb = common::breaker(&engines[i % 2], "shared", u32::MAX, 60_000);
        handles.push(tokio::task::spawn_blocking(move || {
            for _ in 0..TRIPS_PER_WORKER {
                cb.trip(None, None).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let cb = common::breaker(&engines[0], "shared", u32::MAX, 60_000);
    assert_eq!(
        cb.status().unwrap().record.failure_count,
        (WORKERS * TRIPS_PER_WORKER) as u64
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_caller_opens_the_breaker() {
    let engine = common::engine_over(
        Arc::new(MemoryStore::new()),
        Arc::new(LocalLockProvider::new()),
    );

    let mut handles = Vec::new();
    for _ in 0..20 {
        let cb = common::breaker(&engine, "race", 10, 60_000);
        handles.push(tokio::task::spawn_blocking(move || cb.trip(None, None).unwrap()));
    }

    let mut opened = 0;
    for handle in handles {
        if let TripOutcome::Counted { opened: true, .. } = handle.await.unwrap() {
            opened += 1;
        }
    }
    assert_eq!(opened, 1);

    let cb = common::breaker(&engine, "race", 10, 60_000);
    let status = cb.status().unwrap();
    assert_eq!(status.record.failure_count, 20);
    assert!(cb.filter().unwrap_err().is_open());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_backends_serialize_separate_instances() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("state.json");
    let lock_dir = dir.path().join("locks");

    // Each worker opens its own store and lock provider, like separate processes
    let workers = 4;
    let trips = 25;
    let mut handles = Vec::new();
    for _ in 0..workers {
        let store = Arc::new(FileStore::open(&store_path).unwrap());
        let locks = Arc::new(
            FileLockProvider::new(&lock_dir)
                .unwrap()
                .with_poll_interval(Duration::from_millis(1), Duration::from_millis(10)),
        );
        let cb = common::breaker(&common::engine_over(store, locks), "disk", u32::MAX, 60_000);
        handles.push(tokio::task::spawn_blocking(move || {
            for _ in 0..trips {
                cb.trip(None, None).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let reader = common::engine_over(
        Arc::new(FileStore::open(&store_path).unwrap()),
        Arc::new(FileLockProvider::new(&lock_dir).unwrap()),
    );
    let cb = common::breaker(&reader, "disk", u32::MAX, 60_000);
    assert_eq!(
        cb.status().unwrap().record.failure_count,
        (workers * trips) as u64
    );
    assert!(lock_dir.join(format!("{}.lock", common::STORE)).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_per_breaker_locks_on_one_file_store_keep_both_counts() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("state.json");
    let lock_dir = dir.path().join("locks");
    let trips = 100;

    // Different breaker locks never exclude each other; only the store does
    let mut handles = Vec::new();
    for name in ["a", "b"] {
        let engine = common::engine_over(
            Arc::new(FileStore::open(&store_path).unwrap()),
            Arc::new(FileLockProvider::new(&lock_dir).unwrap()),
        );
        let config = common::config(name, u32::MAX, 60_000).with_lock_scope(LockScope::Breaker);
        let cb = CircuitBreaker::new(config, engine);
        handles.push(tokio::task::spawn_blocking(move || {
            for _ in 0..trips {
                cb.trip(None, None).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let reader = common::engine_over(
        Arc::new(FileStore::open(&store_path).unwrap()),
        Arc::new(FileLockProvider::new(&lock_dir).unwrap()),
    );
    for name in ["a", "b"] {
        let cb = common::breaker(&reader, name, u32::MAX, 60_000);
        assert_eq!(cb.status().unwrap().record.failure_count, trips as u64);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lock_timeout_is_internal_error() {
    let locks = Arc::new(LocalLockProvider::new());
    let engine = Arc::new(
        CircuitBreakerEngine::new(
            common::store_manager(Arc::new(MemoryStore::new())),
            locks.clone(),
        )
        .with_lock_timeout(Some(Duration::from_millis(50))),
    );

    // Held by this thread; the engine runs on a blocking worker
    let guard = locks.acquire(common::STORE, None).unwrap();

    let cb = common::breaker(&engine, "blocked", 3, 1000);
    let err = tokio::task::spawn_blocking(move || cb.filter().unwrap_err())
        .await
        .unwrap();
    assert_eq!(err.error_type(), ErrorType::CircuitError);
    assert!(matches!(err, BreakerError::Internal { .. }));

    guard.release();
    let cb = common::breaker(&engine, "blocked", 3, 1000);
    let state = tokio::task::spawn_blocking(move || cb.filter().unwrap())
        .await
        .unwrap();
    assert_eq!(state.as_str(), "CLOSED");
}
