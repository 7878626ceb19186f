//! Integration tests for lope
//!
//! These tests require a C compiler (`cc`) and `/bin/sh` on the host.
//! Run with: cargo test -p lope --features integration-tests

#![cfg(feature = "integration-tests")]

use std::path::{Path, PathBuf};

use lope::Config;

mod compile_and_run;
mod execution;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Path to a fixture source file
pub(crate) fn fixture_path(name: &str) -> PathBuf {
    let path = PathBuf::from(format!("{FIXTURES_PATH}/sources/{name}"));
    assert!(path.is_file(), "missing fixture {}", path.display());
    path
}

/// Default config with the cache confined to a private directory so tests
/// never share state with each other or the developer's machine.
pub(crate) fn test_config(cache_dir: &Path) -> Config {
    let mut config = Config::default();
    config.cache.dir = Some(cache_dir.to_path_buf());
    config
}

/// Parse a custom language table, confining the cache the same way.
pub(crate) fn test_config_toml(toml: &str, cache_dir: &Path) -> Config {
    let mut config = Config::parse_toml(toml).expect("test config should parse");
    config.cache.dir = Some(cache_dir.to_path_buf());
    config
}
