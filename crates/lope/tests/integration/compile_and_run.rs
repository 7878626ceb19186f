use lope::{CompileError, RunError, RunLimits, Runner};

use super::{fixture_path, test_config, test_config_toml};

#[tokio::test]
async fn second_build_of_identical_source_hits_the_cache() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("hello.c");

    let first = Runner::new(test_config(cache.path()));
    let outcome = first
        .run_file(&source, &[], &RunLimits::new())
        .await
        .expect("first run failed");
    assert!(outcome.execution.is_success());
    assert!(!outcome.cache_hit);
    assert_eq!(outcome.execution.stdout, b"hello world\n");

    // A fresh runner sharing the cache directory must not invoke the
    // compiler again: the build step is satisfied from the store
    let second = Runner::new(test_config(cache.path()));
    let outcome = second
        .run_file(&source, &[], &RunLimits::new())
        .await
        .expect("second run failed");
    assert!(outcome.execution.is_success());
    assert!(outcome.cache_hit);
    assert!(outcome.compiler_output.is_none());
    assert_eq!(outcome.execution.stdout, b"hello world\n");
}

#[tokio::test]
async fn changed_flags_miss_the_cache() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("hello.c");

    let toml = r#"
[languages.c]
name = "C"
extension = "c"
strategy = "compile"

[languages.c.compile]
command = ["cc", "{flags}", "{source}", "-o", "{output}"]
default_flags = "-O0"
flags_env = "LOPE_TEST_FLAGS_SCENARIO_B"
"#;

    let runner = Runner::new(test_config_toml(toml, cache.path()));
    let outcome = runner
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();
    assert!(!outcome.cache_hit);

    // Same source, different flags: the key changes and the compiler runs
    // again
    unsafe { std::env::set_var("LOPE_TEST_FLAGS_SCENARIO_B", "-O2") };
    let outcome = runner
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();
    unsafe { std::env::remove_var("LOPE_TEST_FLAGS_SCENARIO_B") };

    assert!(!outcome.cache_hit);
    assert!(outcome.execution.is_success());
}

#[tokio::test]
async fn invalid_syntax_is_a_compile_error_and_never_executes() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("compile_error.c");

    let runner = Runner::new(test_config(cache.path()));
    let result = runner.run_file(&source, &[], &RunLimits::new()).await;

    match result {
        Err(RunError::Compile(CompileError::Failed { exit_code, output })) => {
            assert_ne!(exit_code, 0);
            // The compiler's own diagnostics are carried verbatim
            assert!(!output.is_empty());
        }
        other => panic!("expected CompileError::Failed, got {other:?}"),
    }

    // Nothing was cached for the broken source
    let entries = std::fs::read_dir(cache.path()).unwrap().count();
    assert_eq!(entries, 0);
}

#[tokio::test]
async fn program_arguments_are_forwarded_to_compiled_binary() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("echo_args.c");

    let runner = Runner::new(test_config(cache.path()));
    let outcome = runner
        .run_file(
            &source,
            &["alpha".to_owned(), "beta gamma".to_owned()],
            &RunLimits::new(),
        )
        .await
        .unwrap();

    assert!(outcome.execution.is_success());
    // Arguments with spaces arrive as single argv entries, untouched by any
    // shell
    assert_eq!(outcome.execution.stdout, b"alpha\nbeta gamma\n");
}

#[tokio::test]
async fn runtime_bundle_roundtrips_through_the_cache() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("hello.c");

    // A synthetic runtime language: the "compiler" (sh) copies the source
    // into the workdir as two intermediate files, the "runtime" (cat) reads
    // one back
    let toml = r#"
[languages.fake]
name = "Fake Runtime"
extension = "c"
strategy = "compile_to_runtime"

[languages.fake.compile]
command = ["sh", "-c", "cp {source} {dir}/main.ir && cp {source} {dir}/aux.ir"]
artifact_ext = "ir"

[languages.fake.run]
command = ["cat", "{dir}/main.ir"]
"#;

    let expected = std::fs::read(&source).unwrap();

    let first = Runner::new(test_config_toml(toml, cache.path()));
    let outcome = first
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();
    assert!(outcome.execution.is_success());
    assert!(!outcome.cache_hit);
    assert_eq!(outcome.execution.stdout, expected);

    // The restored bundle must contain the full intermediate set
    let second = Runner::new(test_config_toml(toml, cache.path()));
    let outcome = second
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();
    assert!(outcome.execution.is_success());
    assert!(outcome.cache_hit);
    assert_eq!(outcome.execution.stdout, expected);
}

#[tokio::test]
async fn runtime_compiler_producing_no_artifacts_is_a_compile_error() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("hello.c");

    // Exits 0 but generates nothing
    let toml = r#"
[languages.fake]
name = "Fake Runtime"
extension = "c"
strategy = "compile_to_runtime"

[languages.fake.compile]
command = ["sh", "-c", "true"]
artifact_ext = "ir"

[languages.fake.run]
command = ["cat", "{dir}/main.ir"]
"#;

    let runner = Runner::new(test_config_toml(toml, cache.path()));
    let result = runner.run_file(&source, &[], &RunLimits::new()).await;
    assert!(matches!(
        result,
        Err(RunError::Compile(CompileError::NoArtifacts))
    ));
}

#[tokio::test]
async fn concurrent_uncached_builds_of_one_source_both_succeed() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("hello.c");

    let runner_a = Runner::new(test_config(cache.path()));
    let runner_b = Runner::new(test_config(cache.path()));

    let (a, b) = tokio::join!(
        runner_a.run_file(&source, &[], &RunLimits::new()),
        runner_b.run_file(&source, &[], &RunLimits::new()),
    );

    let a = a.expect("concurrent run A failed");
    let b = b.expect("concurrent run B failed");
    assert!(a.execution.is_success());
    assert!(b.execution.is_success());
    assert_eq!(a.execution.stdout, b"hello world\n");
    assert_eq!(b.execution.stdout, b"hello world\n");

    // A later invocation must find a valid entry
    let third = Runner::new(test_config(cache.path()));
    let outcome = third
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();
    assert!(outcome.cache_hit);
    assert!(outcome.execution.is_success());
}

#[tokio::test]
async fn caching_disabled_always_rebuilds() {
    let cache = tempfile::tempdir().unwrap();
    let source = fixture_path("hello.c");

    let mut config = test_config(cache.path());
    config.cache.enabled = false;

    let runner = Runner::new(config.clone());
    let outcome = runner
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();
    assert!(!outcome.cache_hit);

    let runner = Runner::new(config);
    let outcome = runner
        .run_file(&source, &[], &RunLimits::new())
        .await
        .unwrap();
    assert!(!outcome.cache_hit);
}
