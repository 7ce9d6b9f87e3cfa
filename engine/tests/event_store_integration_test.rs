//! Integration tests for the session event store under concurrency

use ragroute_engine::events::SessionEventStore;
use sdk::events::{ProcessEvent, StepType};
use std::sync::Arc;

fn event(session: &str, question: &str) -> ProcessEvent {
    ProcessEvent::started(session, StepType::Routing, question)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_keep_per_writer_order() {
    let store = Arc::new(SessionEventStore::default());

    let writers: Vec<_> = (0..8)
        .map(|w| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..50 {
                    store.record(event("shared", &format!("{}:{}", w, i))).await;
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let events = store.get_events("shared").await;
    assert_eq!(events.len(), 400);
    for w in 0..8 {
        let seen: Vec<usize> = events
            .iter()
            .filter_map(|e| {
                let (writer, i) = e.question.split_once(':')?;
                (writer == w.to_string()).then(|| i.parse().unwrap())
            })
            .collect();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_subscriber_sees_every_event_once_across_backlog() {
    let store = Arc::new(SessionEventStore::new(1000));
    for i in 0..10 {
        store.record(event("s", &i.to_string())).await;
    }

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 10..60 {
                store.record(event("s", &i.to_string())).await;
            }
        })
    };

    let (backlog, mut sub) = store.subscribe_with_backlog("s").await;
    writer.await.unwrap();

    let mut seen: Vec<String> = backlog.into_iter().map(|e| e.question).collect();
    while let Ok(e) = sub.receiver.try_recv() {
        seen.push(e.question);
    }

    let expected: Vec<String> = (0..60).map(|i| i.to_string()).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_clear_then_backlog_is_empty_and_new_event_alone() {
    let store = SessionEventStore::default();
    store.record(event("s", "old")).await;
    store.record(event("s", "older")).await;

    assert_eq!(store.clear("s").await, 2);
    assert!(store.get_events("s").await.is_empty());
    assert!(store.sessions().await.is_empty());

    store.record(event("s", "new")).await;
    let events = store.get_events("s").await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].question, "new");
    assert_eq!(store.sessions().await, vec!["s".to_string()]);
}

#[tokio::test]
async fn test_slow_subscriber_never_blocks_writers() {
    let store = SessionEventStore::new(2);
    let _slow = store.subscribe("s").await;
    let mut fast = store.subscribe("s").await;

    for i in 0..5 {
        store.record(event("s", &i.to_string())).await;
        // Keep the fast subscriber drained
        assert_eq!(fast.receiver.recv().await.unwrap().question, i.to_string());
    }

    assert_eq!(store.get_events("s").await.len(), 5);
    assert_eq!(store.subscriber_count("s").await, 1);
}
