//! Integration tests for per-session serialization and cross-session isolation.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use session_exec::AppError;

use super::test_helpers::{deadline, run, test_registry, RELAXED_MS};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_on_one_session_never_interleave() {
    let (registry, _temp) = test_registry();
    let session = registry.get_or_create("").await.expect("session");
    run(&session, "counter = 0\nseen = []").await;

    const CALLS: usize = 10;
    let calls = (0..CALLS).map(|_| {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .execute(
                    "counter += 1\nseen = seen + [counter]",
                    deadline(RELAXED_MS * 3),
                )
                .await
        })
    });
    for outcome in join_all(calls).await {
        let execution = outcome.expect("task joins").expect("execution completes");
        assert_eq!(execution.stderr, "");
    }

    let out = run(&session, "print(counter)\nprint(seen)").await;
    let expected: Vec<String> = (1..=CALLS).map(|n| n.to_string()).collect();
    assert_eq!(
        out.stdout,
        format!("{CALLS}\n[{}]\n", expected.join(", "))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sessions_do_not_see_each_other() {
    let (registry, _temp) = test_registry();
    let left = registry.get_or_create("left").await.expect("left");
    let right = registry.get_or_create("right").await.expect("right");

    let (l, r) = tokio::join!(
        left.execute("secret = 'left'", deadline(RELAXED_MS)),
        right.execute("other = 'right'", deadline(RELAXED_MS)),
    );
    l.expect("left runs");
    r.expect("right runs");

    let left_view = run(&left, "print(secret)\nprint(other)").await;
    assert_eq!(left_view.stdout, "left\n");
    assert!(left_view.stderr.contains("NameError"));

    let right_view = run(&right, "print(other)\nprint(secret)").await;
    assert_eq!(right_view.stdout, "right\n");
    assert!(right_view.stderr.contains("NameError"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_sessions_run_in_parallel() {
    let (registry, _temp) = test_registry();
    let a = registry.get_or_create("").await.expect("a");
    let b = registry.get_or_create("").await.expect("b");
    // Warm up both sessions so interpreter start-up is not measured twice.
    run(&a, "pass").await;
    run(&b, "pass").await;

    let started = tokio::time::Instant::now();
    let (ra, rb) = tokio::join!(
        a.execute("import time\ntime.sleep(1)", deadline(RELAXED_MS)),
        b.execute("import time\ntime.sleep(1)", deadline(RELAXED_MS)),
    );
    ra.expect("a runs");
    rb.expect("b runs");

    assert!(
        started.elapsed() < Duration::from_millis(1_900),
        "sessions were serialized: {:?}",
        started.elapsed()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cleanup_waits_for_in_flight_execution() {
    let (registry, _temp) = test_registry();
    let session = registry.get_or_create("busy").await.expect("session");

    let running = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .execute(
                    "import time\ntime.sleep(0.5)\nfinished = True\nprint('done')",
                    deadline(RELAXED_MS),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(registry.remove("busy").await);

    let execution = running
        .await
        .expect("task joins")
        .expect("in-flight execution completes");
    assert_eq!(execution.stdout, "done\n");

    let after = session.execute("print(1)", deadline(1_000)).await;
    assert!(matches!(after, Err(AppError::SessionGone(_))));
}
