//! Source file discovery and shebang sniffing
//!
//! Supplies the runner with an already-resolved (path, language) pair. When
//! a shebang interpreter maps to a registered language, it wins over the
//! filename suffix.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use lope::{Config, ConfigError, Language};

/// Bytes of the file head inspected for a shebang line
const SHEBANG_PROBE_LEN: usize = 128;

/// Find the most recently modified runnable source file in a directory.
pub fn newest_source(dir: &Path, config: &Config) -> Result<PathBuf> {
    let mut best: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        if config.resolve_extension(extension).is_err() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if best.as_ref().is_none_or(|(time, _)| modified > *time) {
            best = Some((modified, path));
        }
    }

    best.map(|(_, path)| path).ok_or_else(|| {
        anyhow!(
            "no runnable source file found in {} (supported extensions: {})",
            dir.display(),
            config.supported_extensions().join(", ")
        )
    })
}

/// Resolve the language for a source file.
///
/// A shebang interpreter registered in the language table overrides the
/// filename suffix; otherwise the suffix decides.
pub fn resolve_language<'a>(
    config: &'a Config,
    source: &Path,
) -> Result<&'a Language, ConfigError> {
    if let Some(interpreter) = shebang_interpreter(source)
        && let Some(language) = config.resolve_interpreter(&interpreter)
    {
        return Ok(language);
    }

    let extension = source
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    config.resolve_extension(extension)
}

/// Extract the interpreter basename from a shebang line, if present.
///
/// `#!/usr/bin/env python3` resolves to `python3`; env options (`-S` etc.)
/// are skipped.
fn shebang_interpreter(source: &Path) -> Option<String> {
    let mut head = [0u8; SHEBANG_PROBE_LEN];
    let mut file = fs::File::open(source).ok()?;
    let len = file.read(&mut head).ok()?;
    let head = &head[..len];

    if !head.starts_with(b"#!") {
        return None;
    }

    let line_end = head.iter().position(|&b| b == b'\n').unwrap_or(head.len());
    let line = String::from_utf8_lossy(&head[2..line_end]);

    let mut tokens = line.split_whitespace();
    let program = tokens.next()?;
    let basename = Path::new(program).file_name()?.to_string_lossy();

    if basename == "env" {
        return tokens
            .find(|token| !token.starts_with('-'))
            .map(str::to_owned);
    }
    Some(basename.into_owned())
}
