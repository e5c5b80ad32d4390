//! Fan-out engine integration tests.
//!
//! Exercises chunk dispatch counts, the concurrency ceiling, failure
//! aggregation and cancellation against instrumented in-test queries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use brokersync_platform::error::{PlatformError, Result};
use brokersync_platform::fanout::query_chunked;

fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("id-{i}")).collect()
}

#[tokio::test]
async fn test_dispatches_ceil_n_over_c_chunks() {
    let cancel = CancellationToken::new();
    let gate = Arc::new(Semaphore::new(8));
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let records = query_chunked(&cancel, &gate, ids(10), 3, move |chunk| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(chunk)
        }
    })
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4); // ceil(10 / 3)
    assert_eq!(records.len(), 10);
}

#[tokio::test]
async fn test_never_exceeds_max_parallel() {
    let cancel = CancellationToken::new();
    let gate = Arc::new(Semaphore::new(3));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let current = Arc::clone(&in_flight);
    let high_water = Arc::clone(&max_in_flight);
    let records = query_chunked(&cancel, &gate, ids(12), 1, move |chunk| {
        let current = Arc::clone(&current);
        let high_water = Arc::clone(&high_water);
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(chunk)
        }
    })
    .await
    .unwrap();

    assert_eq!(records.len(), 12);
    let observed = max_in_flight.load(Ordering::SeqCst);
    assert!(observed <= 3, "ceiling exceeded: {observed} chunks in flight");
    assert!(observed >= 2, "chunks never actually overlapped");
}

#[tokio::test]
async fn test_single_chunk_failure_fails_the_fan_out() {
    let cancel = CancellationToken::new();
    let gate = Arc::new(Semaphore::new(4));

    let result: Result<Vec<String>> = query_chunked(&cancel, &gate, ids(6), 2, |chunk| async move {
        if chunk.contains(&"id-3".to_string()) {
            return Err(PlatformError::request("chunk with id-3", "boom"));
        }
        Ok(chunk)
    })
    .await;

    match result {
        Err(PlatformError::Composite(composite)) => {
            assert_eq!(composite.len(), 1);
            assert!(composite.to_string().contains("id-3"));
        }
        other => panic!("expected composite error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_composite_carries_every_chunk_failure() {
    let cancel = CancellationToken::new();
    let gate = Arc::new(Semaphore::new(4));

    let result: Result<Vec<String>> = query_chunked(&cancel, &gate, ids(6), 2, |chunk| async move {
        if chunk.contains(&"id-0".to_string()) || chunk.contains(&"id-4".to_string()) {
            return Err(PlatformError::request(format!("chunk {}", chunk[0]), "boom"));
        }
        Ok(chunk)
    })
    .await;

    match result {
        Err(PlatformError::Composite(composite)) => {
            assert_eq!(composite.len(), 2);
            assert!(composite
                .errors()
                .iter()
                .all(|e| matches!(e, PlatformError::Request { .. })));
            let rendered = composite.to_string();
            assert!(rendered.contains("id-0"));
            assert!(rendered.contains("id-4"));
        }
        other => panic!("expected composite error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancelled_before_dispatch_issues_no_queries() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let gate = Arc::new(Semaphore::new(4));
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let result: Result<Vec<String>> = query_chunked(&cancel, &gate, ids(10), 2, move |chunk| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(chunk)
        }
    })
    .await;

    assert!(matches!(result, Err(PlatformError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch_but_admitted_chunks_finish() {
    let cancel = CancellationToken::new();
    let gate = Arc::new(Semaphore::new(1));
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let started_counter = Arc::clone(&started);
    let finished_counter = Arc::clone(&finished);
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    let result: Result<Vec<String>> = query_chunked(&cancel, &gate, ids(5), 1, move |chunk| {
        let started_counter = Arc::clone(&started_counter);
        let finished_counter = Arc::clone(&finished_counter);
        async move {
            started_counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(40)).await;
            finished_counter.fetch_add(1, Ordering::SeqCst);
            Ok(chunk)
        }
    })
    .await;

    assert!(matches!(result, Err(PlatformError::Cancelled)));
    // Dispatch stopped early, but whatever was admitted ran to its end.
    let started = started.load(Ordering::SeqCst);
    assert!(started < 5, "dispatch kept going after cancellation");
    assert_eq!(finished.load(Ordering::SeqCst), started);
}

#[tokio::test]
async fn test_empty_input_returns_empty() {
    let cancel = CancellationToken::new();
    let gate = Arc::new(Semaphore::new(4));
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let records: Vec<String> = query_chunked(&cancel, &gate, Vec::new(), 2, move |chunk| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(chunk)
        }
    })
    .await
    .unwrap();

    assert!(records.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
