//! Balancer state machine and transactional work-unit bracketing.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{MockPool, MockState};
use rowbind::balancer::{read_only, run_in_transaction, AccessMode, Balancer, Session};
use rowbind::source::MemoryRows;
use rowbind::value::Value;
use rowbind::{Error, Record};

#[derive(Debug, Default, PartialEq, Record)]
struct Counter {
    n: i64,
}

fn setup() -> (Balancer<MockPool>, Arc<MockState>) {
    let pool = MockPool::new();
    let state = Arc::clone(&pool.state);
    (Balancer::new(pool), state)
}

#[tokio::test]
async fn begin_is_idempotent_per_session() {
    let (balancer, state) = setup();
    let session = Session::new();
    let tx_session = balancer.begin_transaction(&session, &[]).await.unwrap();
    let joined = balancer.begin_transaction(&tx_session, &[]).await.unwrap();
    assert!(joined.is_transactional());
    assert_eq!(state.begun.load(Ordering::SeqCst), 1);

    // The original session stays non-transactional.
    assert!(!session.is_transactional());
    assert!(!balancer.runner(&session).is_transactional());
}

#[tokio::test]
async fn commit_consumes_the_transaction() {
    let (balancer, state) = setup();
    let session = balancer
        .begin_transaction(&Session::new(), &[])
        .await
        .unwrap();

    balancer.commit_transaction(&session).await.unwrap();
    assert!(state.committed.load(Ordering::SeqCst));

    let err = balancer.commit_transaction(&session).await.unwrap_err();
    assert!(matches!(err, Error::TransactionClosed));
}

#[tokio::test]
async fn rollback_after_commit_is_a_no_op_success() {
    let (balancer, state) = setup();
    let session = balancer
        .begin_transaction(&Session::new(), &[])
        .await
        .unwrap();
    balancer.commit_transaction(&session).await.unwrap();

    balancer.rollback_transaction(&session).await.unwrap();
    // The driver never saw a rollback; the handle was already gone.
    assert!(!state.rolled_back.load(Ordering::SeqCst));
}

#[tokio::test]
async fn commit_and_rollback_require_a_transactional_session() {
    let (balancer, _state) = setup();
    let session = Session::new();
    assert!(balancer
        .commit_transaction(&session)
        .await
        .unwrap_err()
        .is_no_transaction());
    assert!(balancer
        .rollback_transaction(&session)
        .await
        .unwrap_err()
        .is_no_transaction());
}

#[tokio::test]
async fn runner_routes_by_session_state() {
    let (balancer, state) = setup();
    let plain = Session::new();
    balancer
        .runner(&plain)
        .execute("insert into t values (1)")
        .await
        .unwrap();

    let tx_session = balancer.begin_transaction(&plain, &[]).await.unwrap();
    balancer
        .runner(&tx_session)
        .execute("insert into t values (2)")
        .await
        .unwrap();

    assert_eq!(
        state.executed(),
        vec![
            "pool:insert into t values (1)".to_owned(),
            "tx:insert into t values (2)".to_owned(),
        ]
    );
}

#[tokio::test]
async fn runner_scans_query_results() {
    let (balancer, state) = setup();
    state.queue_result(
        MemoryRows::new(&["n"])
            .with_row(vec![Value::Int64(1)])
            .with_row(vec![Value::Int64(2)]),
    );

    let mut counters: Vec<Counter> = Vec::new();
    balancer
        .runner(&Session::new())
        .fetch_many("select n from t", &mut counters)
        .await
        .unwrap();
    assert_eq!(counters, vec![Counter { n: 1 }, Counter { n: 2 }]);
}

#[tokio::test]
async fn runner_fetch_one_applies_cardinality_rules() {
    let (balancer, state) = setup();
    state.queue_result(MemoryRows::new(&["n"]).with_row(vec![Value::Int64(5)]));
    state.queue_result(MemoryRows::new(&["n"]));

    let runner = balancer.runner(&Session::new());
    let mut counter = Counter::default();
    runner.fetch_one("select n from t", &mut counter).await.unwrap();
    assert_eq!(counter.n, 5);

    let err = runner
        .fetch_one("select n from t", &mut counter)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn runner_on_completed_transaction_fails() {
    let (balancer, _state) = setup();
    let session = balancer
        .begin_transaction(&Session::new(), &[])
        .await
        .unwrap();
    balancer.commit_transaction(&session).await.unwrap();

    let err = balancer
        .runner(&session)
        .execute("select 1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransactionClosed));
}

#[tokio::test]
async fn read_only_option_reaches_the_driver() {
    let (balancer, state) = setup();
    balancer
        .begin_transaction(&Session::new(), &[read_only])
        .await
        .unwrap();
    let options = state.last_options.lock().unwrap().unwrap();
    assert_eq!(options.access_mode, AccessMode::ReadOnly);
}

#[tokio::test]
async fn work_unit_commits_on_success() {
    let (balancer, state) = setup();
    let value = run_in_transaction(&balancer, &Session::new(), &[], |session| {
        let balancer = &balancer;
        async move {
            balancer
                .runner(&session)
                .execute("update t set n = 1")
                .await?;
            Ok(10)
        }
    })
    .await
    .unwrap();

    assert_eq!(value, 10);
    assert!(state.committed.load(Ordering::SeqCst));
    assert!(!state.rolled_back.load(Ordering::SeqCst));
    assert_eq!(state.executed(), vec!["tx:update t set n = 1".to_owned()]);
}

#[tokio::test]
async fn work_unit_error_rolls_back_and_passes_through() {
    let (balancer, state) = setup();
    let err = run_in_transaction(&balancer, &Session::new(), &[], |_session| async {
        Err::<(), _>(Error::NotFound)
    })
    .await
    .unwrap_err();

    assert!(err.is_not_found());
    assert!(!state.committed.load(Ordering::SeqCst));
    assert!(state.rolled_back.load(Ordering::SeqCst));
}

#[tokio::test]
async fn work_unit_wraps_begin_failure() {
    let (balancer, state) = setup();
    state.fail_begin.store(true, Ordering::SeqCst);

    let err = run_in_transaction(&balancer, &Session::new(), &[], |_session| async { Ok(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Begin { .. }));
}

#[tokio::test]
async fn work_unit_wraps_commit_failure() {
    let (balancer, state) = setup();
    state.fail_commit.store(true, Ordering::SeqCst);

    let err = run_in_transaction(&balancer, &Session::new(), &[], |_session| async { Ok(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Commit { .. }));
}
