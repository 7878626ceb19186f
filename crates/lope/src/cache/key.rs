//! Cache key computation
//!
//! A key fingerprints one (source, compiler, flags) combination. Identical
//! inputs always produce the same key; changing any input changes the key.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex characters retained from the SHA-256 digest (160 bits)
const KEY_HEX_LEN: usize = 40;

/// Fingerprint identifying a unique (source, compiler, flags) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for a build.
    ///
    /// Inputs are the full source bytes, the resolved absolute path of the
    /// compiler executable (so a different installed version produces a
    /// different key), and the exact ordered flag list. Each input is
    /// length-prefixed before hashing so concatenation boundaries never
    /// alias.
    pub fn compute(source: &[u8], compiler: &Path, flags: &[String]) -> Self {
        let mut hasher = Sha256::new();

        hasher.update((source.len() as u64).to_le_bytes());
        hasher.update(source);

        let compiler_bytes = compiler.as_os_str().as_encoded_bytes();
        hasher.update((compiler_bytes.len() as u64).to_le_bytes());
        hasher.update(compiler_bytes);

        for flag in flags {
            hasher.update((flag.len() as u64).to_le_bytes());
            hasher.update(flag.as_bytes());
        }

        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(KEY_HEX_LEN);
        Self(hex)
    }

    /// The hex-encoded key, used as the cache entry file name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
