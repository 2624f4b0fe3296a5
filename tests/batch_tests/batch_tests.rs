//! Batch Tests
//!
//! Tests verify:
//! - Chunk partitioning (sizes, contiguity, remainder on the last chunk)
//! - Ordered results from parallel workers
//! - First-error-in-item-order reporting after every item ran
//! - Extra worker connections released afterwards

#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;

use common::{reply, text, Action, MockServer};
use ssdbc::{BatchCoordinator, BatchPlan, Client, Command, Pool, SsdbError};

// =============================================================================
// Partitioning
// =============================================================================

#[test]
fn test_plan_last_chunk_takes_remainder() {
    let plan = BatchPlan::new((0..10).collect::<Vec<_>>(), 3).unwrap();
    assert_eq!(plan.chunk_ranges(), vec![0..3, 3..6, 6..10]);

    let sizes: Vec<usize> = plan.into_chunks().iter().map(|(_, c)| c.len()).collect();
    assert_eq!(sizes, vec![3, 3, 4]);
}

#[test]
fn test_plan_chunks_concatenate_to_input() {
    for total in [0usize, 1, 7, 16, 33] {
        for workers in 1..=6 {
            let items: Vec<usize> = (0..total).collect();
            let plan = BatchPlan::new(items.clone(), workers).unwrap();
            let chunks = plan.into_chunks();
            assert_eq!(chunks.len(), workers);

            let mut next = 0;
            let mut joined = Vec::new();
            for (offset, chunk) in chunks {
                assert_eq!(offset, next, "total {} workers {}", total, workers);
                next += chunk.len();
                joined.extend(chunk);
            }
            assert_eq!(joined, items);
        }
    }
}

#[test]
fn test_plan_more_workers_than_items() {
    let plan = BatchPlan::new(vec!['a', 'b'], 4).unwrap();
    assert_eq!(plan.chunk_ranges(), vec![0..0, 0..0, 0..0, 0..2]);
}

#[test]
fn test_plan_needs_a_worker() {
    assert!(matches!(
        BatchPlan::new(vec![1, 2, 3], 0),
        Err(SsdbError::Config(_))
    ));
}

// =============================================================================
// Execution
// =============================================================================

fn set_commands(count: usize) -> Vec<Command> {
    (0..count)
        .map(|i| Command::new("set").arg(format!("key{}", i)).arg(i as i64))
        .collect()
}

#[test]
fn test_multi_write_returns_results_in_item_order() {
    // Echo the key so each response can be matched to its command.
    let server = MockServer::start(|request| {
        Action::Reply(vec![b"ok".to_vec(), request[1].to_vec()])
    });
    let pool = Pool::new(server.config()).unwrap();
    let primary = pool.acquire().unwrap();

    let responses = BatchCoordinator::new(&pool)
        .multi_write(&primary, set_commands(10), 3)
        .unwrap();

    assert_eq!(responses.len(), 10);
    for (i, response) in responses.into_iter().enumerate() {
        let key = response.into_value().unwrap().unwrap();
        assert_eq!(key, format!("key{}", i).as_bytes());
    }

    // Every item reached the server exactly once, over three sockets.
    let keys: HashSet<String> = server.requests().into_iter().map(|r| r[1].clone()).collect();
    assert_eq!(keys.len(), 10);
    assert_eq!(server.accepted(), 3);

    // The two extra worker connections are gone; the primary is untouched.
    assert_eq!(pool.len(), 1);
    assert!(primary.is_ready());
    assert_eq!(pool.stats().closed, 2);
}

#[test]
fn test_multi_write_empty_input() {
    let server = MockServer::ok();
    let pool = Pool::new(server.config()).unwrap();
    let primary = pool.acquire().unwrap();

    let responses = BatchCoordinator::new(&pool)
        .multi_write(&primary, Vec::new(), 4)
        .unwrap();
    assert!(responses.is_empty());
    assert_eq!(server.accepted(), 1);
}

#[test]
fn test_multi_write_reports_lowest_failing_item() {
    let server = MockServer::start(|request| match text(&request[1]).as_str() {
        "key4" => reply(&["error", "disk full"]),
        "key8" => reply(&["client_error", "bad value"]),
        _ => reply(&["ok", "1"]),
    });
    let pool = Pool::new(server.config()).unwrap();
    let primary = pool.acquire().unwrap();

    let err = BatchCoordinator::new(&pool)
        .multi_write(&primary, set_commands(12), 3)
        .unwrap_err();
    assert_eq!(err.status(), Some("error"));

    // Failures do not cut chunks short: every item was still sent.
    let keys: HashSet<String> = server.requests().into_iter().map(|r| r[1].clone()).collect();
    assert_eq!(keys.len(), 12);
    assert!(keys.contains("key5"));
    assert!(keys.contains("key11"));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_multi_write_pool_exhaustion_fails_cleanly() {
    let server = MockServer::ok();
    let config = ssdbc::ClientConfig {
        max_connections: 2,
        ..server.config()
    };
    let pool = Pool::new(config).unwrap();
    let primary = pool.acquire().unwrap();

    let err = BatchCoordinator::new(&pool)
        .multi_write(&primary, set_commands(6), 3)
        .unwrap_err();
    assert!(matches!(err, SsdbError::PoolExhausted(_)));

    // The one extra that was acquired has been given back.
    assert_eq!(pool.len(), 1);
    assert_eq!(server.request_count(), 0);
}

#[test]
fn test_client_multi_set_uses_configured_workers() {
    let server = MockServer::store();
    let config = ssdbc::ClientConfig {
        batch_workers: 4,
        ..server.config()
    };
    let client = Client::connect(config).unwrap();

    let pairs: Vec<(String, String)> = (0..20)
        .map(|i| (format!("k{:02}", i), format!("v{}", i)))
        .collect();
    let responses = client.multi_set(pairs).unwrap();
    assert_eq!(responses.len(), 20);
    assert!(responses.iter().all(|r| r.is_ok()));

    assert_eq!(server.accepted(), 4);
    assert_eq!(client.pool().len(), 1);
    assert_eq!(client.get("k13").unwrap().unwrap(), "v13".as_bytes());
}
