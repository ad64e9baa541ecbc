//! Integration tests for stopping the generator under concurrent load.
//!
//! Every in-flight `next_token` must either finish with a full token or
//! fail with `GeneratorStopped`. A hang shows up as the timeout firing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use warden_token::{TokenError, TokenGenerator};

const CONSUMERS: usize = 50;
const DEADLINE: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_with_50_in_flight_consumers_never_hangs() {
    let tokens = Arc::new(TokenGenerator::new());
    tokens.start().await;

    let mut handles = Vec::with_capacity(CONSUMERS);
    for i in 0..CONSUMERS {
        let tokens = Arc::clone(&tokens);
        handles.push(tokio::spawn(async move {
            tokens.next_token(16 + i).await.map(|t| (i, t))
        }));
    }

    tokio::time::timeout(DEADLINE, tokens.stop())
        .await
        .expect("stop should not hang");

    let mut completed = 0;
    let mut stopped = 0;
    for handle in handles {
        let result = tokio::time::timeout(DEADLINE, handle)
            .await
            .expect("consumer should not hang")
            .expect("consumer should not panic");
        match result {
            Ok((i, token)) => {
                assert_eq!(token.len(), 16 + i, "partial token delivered");
                completed += 1;
            }
            Err(TokenError::GeneratorStopped) => stopped += 1,
        }
    }

    assert_eq!(completed + stopped, CONSUMERS);
    assert!(!tokens.is_running().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_start_stop_cycles_under_load() {
    let tokens = Arc::new(TokenGenerator::new());

    for _ in 0..20 {
        tokens.start().await;

        let consumers: Vec<_> = (0..8)
            .map(|_| {
                let tokens = Arc::clone(&tokens);
                tokio::spawn(async move { tokens.next_token(24).await })
            })
            .collect();

        tokio::time::timeout(DEADLINE, tokens.stop())
            .await
            .expect("stop should not hang");

        for consumer in consumers {
            let result = tokio::time::timeout(DEADLINE, consumer)
                .await
                .expect("consumer should not hang")
                .expect("consumer should not panic");
            if let Ok(token) = result {
                assert_eq!(token.len(), 24);
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumers_never_share_tokens() {
    let tokens = Arc::new(TokenGenerator::new());
    tokens.start().await;

    let consumers: Vec<_> = (0..64)
        .map(|_| {
            let tokens = Arc::clone(&tokens);
            tokio::spawn(async move { tokens.next_token(20).await })
        })
        .collect();

    let mut seen = HashSet::new();
    for consumer in consumers {
        let token = consumer.await.unwrap().expect("generator is running");
        assert!(seen.insert(token), "two consumers received the same token");
    }

    tokens.stop().await;
}

#[tokio::test]
async fn test_drop_while_running_does_not_block() {
    let tokens = TokenGenerator::new();
    tokens.start().await;
    let _ = tokens.next_token(8).await;

    drop(tokens);
}
