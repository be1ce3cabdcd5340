use super::cancel::{cancel_pair, CancelToken};
use super::coordinator::{Coordinator, Outcome, Submission};
use super::runner::ReleasedItem;
use super::wait::{FixedPoll, WaitUnit};
use crate::errors::StoreError;
use crate::store::{LocalStore, RedisStore, SessionStore};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn redis_test_pool() -> Option<deadpool_redis::Pool> {
    let url = std::env::var("QUIESCE_REDIS_TEST_URL")
        .ok()
        .or_else(|| std::env::var("REDIS_URL").ok())?;
    let cfg = deadpool_redis::Config::from_url(url);
    cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1)).ok()
}

fn submission(key: &str, content: &str, wait_secs: f64) -> Submission {
    Submission::new(key, content, wait_secs, WaitUnit::Seconds)
}

#[tokio::test]
async fn single_submission_drains_after_wait() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Coordinator::new(store.clone(), "run-1");

    let started = Instant::now();
    let outcome = coordinator
        .submit(&submission("burst", "hello", 0.1), CancelToken::none())
        .await
        .expect("submit should succeed");

    assert_eq!(outcome, Outcome::Released(vec!["hello".to_string()]));
    assert!(started.elapsed() >= Duration::from_millis(90));
    assert_eq!(
        store.get("burst").await.expect("get should succeed"),
        None,
        "drained key must be gone from the store"
    );
}

#[tokio::test]
async fn join_pushes_deadline_and_returns_skipped() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Arc::new(Coordinator::new(store, "run-1"));

    let opener = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = coordinator
                .submit(&submission("burst", "a", 0.15), CancelToken::none())
                .await
                .expect("opener should succeed");
            (outcome, started.elapsed())
        })
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    let joined = coordinator
        .submit(&submission("burst", "b", 0.15), CancelToken::none())
        .await
        .expect("join should succeed");
    assert_eq!(joined, Outcome::Skipped);

    let (outcome, elapsed) = opener.await.expect("opener task should not panic");
    assert_eq!(
        outcome,
        Outcome::Released(vec!["a".to_string(), "b".to_string()])
    );
    // The join at t=60ms restamped the deadline to t=60ms + 150ms.
    assert!(
        elapsed >= Duration::from_millis(190),
        "drain happened before the extended deadline: {elapsed:?}"
    );
}

#[tokio::test]
async fn joins_accumulate_in_arrival_order() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Arc::new(Coordinator::new(store, "run-1"));

    let opener = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .submit(&submission("burst", "a", 0.25), CancelToken::none())
                .await
                .expect("opener should succeed")
        })
    };

    tokio::time::sleep(Duration::from_millis(40)).await;
    coordinator
        .submit(&submission("burst", "b", 0.2), CancelToken::none())
        .await
        .expect("first join should succeed");
    tokio::time::sleep(Duration::from_millis(40)).await;
    coordinator
        .submit(&submission("burst", "c", 0.2), CancelToken::none())
        .await
        .expect("second join should succeed");

    let outcome = opener.await.expect("opener task should not panic");
    assert_eq!(
        outcome,
        Outcome::Released(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
}

#[tokio::test]
async fn drained_key_starts_a_fresh_buffer() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Coordinator::new(store, "run-1");

    let first = coordinator
        .submit(&submission("burst", "old", 0.05), CancelToken::none())
        .await
        .expect("first submit should succeed");
    assert_eq!(first, Outcome::Released(vec!["old".to_string()]));

    let second = coordinator
        .submit(&submission("burst", "new", 0.05), CancelToken::none())
        .await
        .expect("second submit should succeed");
    assert_eq!(
        second,
        Outcome::Released(vec!["new".to_string()]),
        "no leakage of previously drained items"
    );
}

#[tokio::test]
async fn cancellation_cleans_up_the_key() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Arc::new(Coordinator::new(store.clone(), "run-1"));
    let (handle, token) = cancel_pair();

    let opener = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .submit(&submission("burst", "a", 5.0), token)
                .await
                .expect("cancelled submit should not error")
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let outcome = opener.await.expect("opener task should not panic");
    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(
        store.get("burst").await.expect("get should succeed"),
        None,
        "cancelled buffer must not be left behind"
    );
}

// Pins the literal deadline policy: a join writes `now + its own wait`, so a
// shorter-wait joiner pulls the deadline closer instead of extending it. The
// opener polls at a fixed interval so it notices the pulled-in deadline
// before its original one would have passed.
#[tokio::test]
async fn shorter_join_wait_pulls_the_deadline_closer() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Arc::new(
        Coordinator::new(store, "run-1")
            .with_wait_policy(Box::new(FixedPoll(Duration::from_millis(10)))),
    );

    let opener = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = coordinator
                .submit(&submission("burst", "a", 2.0), CancelToken::none())
                .await
                .expect("opener should succeed");
            (outcome, started.elapsed())
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator
        .submit(&submission("burst", "b", 0.1), CancelToken::none())
        .await
        .expect("join should succeed");

    let (outcome, elapsed) = opener.await.expect("opener task should not panic");
    assert_eq!(
        outcome,
        Outcome::Released(vec!["a".to_string(), "b".to_string()])
    );
    assert!(
        elapsed < Duration::from_secs(1),
        "the joiner's shorter wait should have overwritten the 2s deadline: {elapsed:?}"
    );
}

#[tokio::test]
async fn namespaced_submissions_never_interact() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let left = Arc::new(Coordinator::new(store.clone(), "workflow-a"));
    let right = Arc::new(Coordinator::new(store, "workflow-b"));

    let left_task = tokio::spawn({
        let left = left.clone();
        async move {
            left.submit(
                &submission("shared", "from-a", 0.1).avoiding_collisions(),
                CancelToken::none(),
            )
            .await
            .expect("left submit should succeed")
        }
    });
    let right_task = tokio::spawn({
        let right = right.clone();
        async move {
            right
                .submit(
                    &submission("shared", "from-b", 0.1).avoiding_collisions(),
                    CancelToken::none(),
                )
                .await
                .expect("right submit should succeed")
        }
    });

    let (left_outcome, right_outcome) = tokio::join!(left_task, right_task);
    assert_eq!(
        left_outcome.expect("left task should not panic"),
        Outcome::Released(vec!["from-a".to_string()])
    );
    assert_eq!(
        right_outcome.expect("right task should not panic"),
        Outcome::Released(vec!["from-b".to_string()])
    );
}

#[tokio::test]
async fn missing_state_mid_wait_is_fatal_and_names_the_key() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Arc::new(Coordinator::new(store.clone(), "run-1"));

    let opener = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .submit(&submission("burst", "a", 0.3), CancelToken::none())
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    store
        .delete("burst")
        .await
        .expect("out-of-band delete should succeed");

    let err = opener
        .await
        .expect("opener task should not panic")
        .expect_err("vanished state during the wait must be fatal");
    assert!(err.is_buffer());
    assert!(err.to_string().contains("\"burst\""));
}

#[tokio::test]
async fn concurrent_creates_yield_one_winner_and_one_joiner() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Arc::new(Coordinator::new(store, "run-1"));

    let a = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .submit(&submission("burst", "a", 0.15), CancelToken::none())
                .await
                .expect("submit a should succeed")
        }
    });
    let b = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .submit(&submission("burst", "b", 0.15), CancelToken::none())
                .await
                .expect("submit b should succeed")
        }
    });

    let (a, b) = tokio::join!(a, b);
    let mut outcomes = vec![
        a.expect("task a should not panic"),
        b.expect("task b should not panic"),
    ];
    outcomes.sort_by_key(|o| matches!(o, Outcome::Skipped));

    match (&outcomes[0], &outcomes[1]) {
        (Outcome::Released(items), Outcome::Skipped) => {
            assert_eq!(items.len(), 2, "the winner drains both fragments");
            assert!(items.contains(&"a".to_string()));
            assert!(items.contains(&"b".to_string()));
        }
        other => panic!("expected one winner and one joiner, got {other:?}"),
    }
}

#[tokio::test]
async fn unreadable_value_counts_as_absent_on_initial_read() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    store
        .set("burst", b"definitely-not-json")
        .await
        .expect("seed should succeed");

    let coordinator = Coordinator::new(store.clone(), "run-1");
    let outcome = coordinator
        .submit(&submission("burst", "fresh", 0.05), CancelToken::none())
        .await
        .expect("submit over garbage should succeed");

    assert_eq!(outcome, Outcome::Released(vec!["fresh".to_string()]));
    assert_eq!(store.get("burst").await.expect("get should succeed"), None);
}

#[tokio::test]
async fn empty_session_key_is_rejected() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Coordinator::new(store, "run-1");

    let err = coordinator
        .submit(&submission("", "a", 0.1), CancelToken::none())
        .await
        .expect_err("empty session key must be rejected");
    assert!(err.is_buffer());
}

#[tokio::test]
async fn fixed_poll_policy_still_drains() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Coordinator::new(store, "run-1")
        .with_wait_policy(Box::new(FixedPoll(Duration::from_millis(10))));

    let outcome = coordinator
        .submit(&submission("burst", "polled", 0.1), CancelToken::none())
        .await
        .expect("submit should succeed");
    assert_eq!(outcome, Outcome::Released(vec!["polled".to_string()]));
}

struct FailingStore;

#[async_trait::async_trait]
impl SessionStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Pool("connection refused".to_string()))
    }
    async fn set(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Pool("connection refused".to_string()))
    }
    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Pool("connection refused".to_string()))
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Pool("connection refused".to_string()))
    }
}

#[tokio::test]
async fn batch_continue_on_fail_emits_error_items() {
    let coordinator = Coordinator::new(Arc::new(FailingStore), "run-1");
    let submissions = vec![
        submission("burst-1", "a", 0.05),
        submission("burst-2", "b", 0.05),
    ];

    let output = coordinator
        .run_batch(&submissions, true, CancelToken::none())
        .await
        .expect("continue-on-fail batch should not abort");
    assert_eq!(output.released.len(), 2);
    assert!(output.skipped.is_empty());
    for item in &output.released {
        match item {
            ReleasedItem::Error { error } => assert!(error.contains("connection refused")),
            other => panic!("expected error items, got {other:?}"),
        }
    }

    let err = coordinator
        .run_batch(&submissions, false, CancelToken::none())
        .await
        .expect_err("without continue-on-fail the first error aborts the batch");
    assert!(err.is_store());
}

#[tokio::test]
async fn batch_output_serializes_per_channel() {
    let store: Arc<dyn SessionStore> = Arc::new(LocalStore::new());
    let coordinator = Coordinator::new(store, "run-1");
    let submissions = vec![
        submission("burst-1", "a", 0.05),
        submission("burst-2", "b", 0.05),
    ];

    let output = coordinator
        .run_batch(&submissions, false, CancelToken::none())
        .await
        .expect("batch should succeed");

    let json = serde_json::to_value(&output).expect("output should serialize");
    assert_eq!(
        json,
        serde_json::json!({
            "released": [ { "items": ["a"] }, { "items": ["b"] } ],
            "skipped": [],
        })
    );

    let error_item = ReleasedItem::Error {
        error: "boom".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&error_item).unwrap(),
        serde_json::json!({ "error": "boom" })
    );
}

#[tokio::test]
async fn submission_deserializes_from_host_parameters() {
    let submission: Submission = serde_json::from_value(serde_json::json!({
        "session_key": "11b0de85-babd-43ac-b1a2-b65c766597a1",
        "content": "fragment",
        "wait_amount": 2.5,
        "wait_unit": "minutes",
        "avoid_collisions": true,
    }))
    .expect("submission should deserialize");

    assert_eq!(submission.session_key, "11b0de85-babd-43ac-b1a2-b65c766597a1");
    assert_eq!(submission.wait_unit, WaitUnit::Minutes);
    assert!(submission.avoid_collisions);
}

#[tokio::test]
async fn redis_single_submission_roundtrip() {
    let Some(pool) = redis_test_pool() else {
        eprintln!("skip redis roundtrip test: REDIS_URL/QUIESCE_REDIS_TEST_URL not set");
        return;
    };

    let store: Arc<dyn SessionStore> = Arc::new(RedisStore::new(pool));
    store.ping().await.expect("redis ping should succeed");

    let key = format!("quiesce:test:{}", uuid::Uuid::new_v4());
    let coordinator = Coordinator::new(store.clone(), "run-redis");
    let outcome = coordinator
        .submit(&submission(&key, "hello", 0.1), CancelToken::none())
        .await
        .expect("redis submit should succeed");

    assert_eq!(outcome, Outcome::Released(vec!["hello".to_string()]));
    assert_eq!(
        store.get(&key).await.expect("redis get should succeed"),
        None
    );
}
