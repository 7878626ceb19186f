use std::time::{Duration, Instant};

use lope::{ExitStatus, RunLimits, Runner, RunStatus};

use super::{fixture_path, test_config};

#[tokio::test]
async fn infinite_loop_times_out_within_deadline_plus_grace() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("slow_loop.sh");

    let runner = Runner::new(test_config(cache.path()));
    let started = Instant::now();
    let outcome = runner
        .run_file(&source, &[], &RunLimits::new().with_timeout(2))
        .await
        .expect("run should complete with a timeout classification");
    let elapsed = started.elapsed();

    assert_eq!(outcome.execution.status, ExitStatus::TimedOut);
    assert_eq!(outcome.status, RunStatus::TimedOut);
    // 2s deadline plus at most the 2s TERM-to-KILL grace, with margin
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(8), "took {elapsed:?}");

    // Output produced before the kill is preserved
    assert_eq!(outcome.execution.stdout, b"starting\n");
}

#[tokio::test]
async fn interpreted_run_propagates_exit_code() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("exit_five.sh");

    let runner = Runner::new(test_config(cache.path()));
    let outcome = runner
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();

    assert_eq!(outcome.execution.status, ExitStatus::NonZeroExit(5));
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.execution.status.exit_code(), 5);
}

#[tokio::test]
async fn timeout_zero_means_unbounded() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("exit_five.sh");

    // CLI maps 0 to None; an unbounded run just completes
    let runner = Runner::new(test_config(cache.path()));
    let outcome = runner
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();
    assert_eq!(outcome.execution.status, ExitStatus::NonZeroExit(5));
}

#[tokio::test]
async fn compiled_binary_runs_under_timeout_without_tripping_it() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("hello.c");

    let runner = Runner::new(test_config(cache.path()));
    let outcome = runner
        .run_file(&source, &[], &RunLimits::new().with_timeout(30))
        .await
        .unwrap();

    assert!(outcome.execution.is_success());
    assert_eq!(outcome.status, RunStatus::Success);
}
