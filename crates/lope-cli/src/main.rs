//! Lope CLI
//!
//! A zero-configuration command-line tool that detects a source file's
//! language, compiles it if needed (with artifact caching), and runs it
//! under resource controls.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lope::{
    CacheStore, CompileError, Config, ConfigError, RunError, RunLimits, Runner,
};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

mod discover;

#[derive(Parser)]
#[command(name = "lope")]
#[command(about = "Run any source file: detect the language, compile with caching, execute")]
#[command(version)]
struct Cli {
    /// Source file to run (default: newest source file in the current directory)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Arguments passed through to the program
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Wall clock timeout in seconds (0 = unbounded)
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=3600))]
    timeout: u64,

    /// Memory limit in MB, enforced through the sandbox tool (0 = unbounded)
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=4096))]
    memory: u64,

    /// Wrap execution in a sandbox tool if one is installed
    #[arg(short, long)]
    sandbox: bool,

    /// Disable the compilation cache for this run
    #[arg(long)]
    no_cache: bool,

    /// Remove all cached build artifacts and exit
    #[arg(long)]
    clear_cache: bool,

    /// Cache retention in days
    #[arg(long, value_name = "DAYS")]
    cache_max_age: Option<u64>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List supported languages and exit
    #[arg(long)]
    languages: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = if let Some(ref path) = cli.config {
        debug!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        Config::default()
    };

    if let Some(days) = cli.cache_max_age {
        config.cache.max_age_days = days;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    if cli.languages {
        list_languages(&config);
        return Ok(());
    }

    if cli.clear_cache {
        return clear_cache(&config);
    }

    // Resolve source file and language
    let source = match cli.file {
        Some(file) => file,
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            let found = discover::newest_source(&cwd, &config)?;
            info!(source = %found.display(), "auto-discovered source file");
            found
        }
    };

    let limits = RunLimits {
        timeout: nonzero(cli.timeout),
        memory_limit_mb: nonzero(cli.memory),
        sandbox: cli.sandbox,
    };

    let runner = Runner::new(config);
    let language = match discover::resolve_language(runner.config(), &source) {
        Ok(language) => language,
        Err(ConfigError::UnsupportedExtension(ext)) => {
            report_unsupported(&ext, runner.config());
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("failed to resolve language"),
    };

    match runner.run_language(language, &source, &cli.args, &limits).await {
        Ok(outcome) => present(outcome),
        Err(RunError::Config(ConfigError::UnsupportedExtension(ext))) => {
            report_unsupported(&ext, runner.config());
            std::process::exit(1);
        }
        Err(RunError::Compile(CompileError::Failed { output, .. })) => {
            eprintln!("Compilation failed:");
            eprintln!("{output}");
            std::process::exit(1);
        }
        Err(e) => Err(e).context("run failed"),
    }
}

fn nonzero(value: u64) -> Option<u64> {
    (value != 0).then_some(value)
}

fn report_unsupported(extension: &str, config: &Config) {
    eprintln!("Unsupported language extension '{extension}'.");
    eprintln!(
        "Supported extensions: {}",
        config.supported_extensions().join(", ")
    );
}

/// Stream the captured output and exit with the mapped code.
fn present(outcome: lope::RunOutcome) -> Result<()> {
    // Compiler warnings from a fresh build go to stderr
    if let Some(ref compiler_output) = outcome.compiler_output
        && !compiler_output.is_empty()
    {
        eprintln!("{compiler_output}");
    }

    let mut stdout = std::io::stdout();
    stdout.write_all(&outcome.execution.stdout)?;
    stdout.flush()?;
    std::io::stderr().write_all(&outcome.execution.stderr)?;

    info!(
        status = ?outcome.status,
        cache_hit = outcome.cache_hit,
        duration = format_args!("{:.3}s", outcome.execution.duration.as_secs_f64()),
        exit_code = outcome.execution.status.exit_code(),
        "run complete"
    );

    let code = outcome.execution.status.exit_code();
    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(id, _)| *id);

    for (id, lang) in languages {
        let kind = match lang.strategy {
            lope::Strategy::Direct => "interpreted",
            lope::Strategy::Compile => "compiled",
            lope::Strategy::CompileToRuntime => "compiled (runtime)",
        };
        let extension = format!(".{}", lang.extension);
        println!("  {id:<12} {extension:<6} {} ({kind})", lang.name);
    }
}

fn clear_cache(config: &Config) -> Result<()> {
    let store = CacheStore::open(&config.cache).context("failed to open cache")?;
    let removed = store.clear().context("failed to clear cache")?;
    println!(
        "Removed {removed} cached artifact(s) from {}",
        store.root().display()
    );
    Ok(())
}
