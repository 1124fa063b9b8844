//! shellcache - host runtime for the storefront's offline cache worker.
//!
//! # Usage
//!
//! ```bash
//! # Write a default config file
//! shellcache init
//!
//! # Install the configured cache version (pre-caches the app shell)
//! shellcache install
//!
//! # Hand control to the installed version, purging older caches
//! shellcache activate
//!
//! # Route requests through the worker
//! shellcache fetch --mode navigate /
//! shellcache fetch /assets/icons_new/cat_rumah.jpeg --output cat.jpeg
//! shellcache fetch --offline /
//!
//! # Inspect or wipe local state
//! shellcache status
//! shellcache clear
//! ```
//!
//! Use `RUST_LOG` to control log level (e.g., `RUST_LOG=shellcache_core=debug`).

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use shellcache_core::RequestMode;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Log file name inside `--log-dir`
const LOG_FILE: &str = "shellcache.log";

#[derive(Parser)]
#[command(name = "shellcache")]
#[command(author, version, about = "Offline cache worker for the storefront")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory (overrides the config file)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Also write logs to a file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Install the configured cache version and pre-cache the app shell
    Install,
    /// Activate the installed version and delete stale caches
    Activate,
    /// Route requests through the worker
    Fetch {
        /// URLs or paths relative to the configured origin
        #[arg(required = true)]
        urls: Vec<String>,

        /// Request mode
        #[arg(long, value_enum, default_value = "no-cors")]
        mode: ModeArg,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Run without network access
        #[arg(long)]
        offline: bool,

        /// Write the response body to a file (single URL only)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show registration and cache contents
    Status,
    /// Delete all caches and the registration
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Navigate,
    SameOrigin,
    Cors,
    NoCors,
}

impl From<ModeArg> for RequestMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Navigate => RequestMode::Navigate,
            ModeArg::SameOrigin => RequestMode::SameOrigin,
            ModeArg::Cors => RequestMode::Cors,
            ModeArg::NoCors => RequestMode::NoCors,
        }
    }
}

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the log file when dropped.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());
    info!("shellcache starting");

    if let Commands::Init { force } = cli.command {
        return commands::init(cli.config.as_deref(), force);
    }

    let mut ctx = commands::Context::load(cli.config.as_deref(), cli.cache_dir)?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Install => commands::lifecycle::install(&mut ctx).await?,
        Commands::Activate => commands::lifecycle::activate(&mut ctx).await?,
        Commands::Fetch {
            urls,
            mode,
            method,
            offline,
            output,
        } => {
            let args = commands::fetch::FetchArgs {
                urls,
                mode: mode.into(),
                method,
                output,
            };
            commands::fetch::run(&mut ctx, args, offline).await?;
        }
        Commands::Status => commands::status::show(&ctx).await?,
        Commands::Clear => commands::status::clear(&mut ctx).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_defaults() {
        let cli = Cli::try_parse_from(["shellcache", "fetch", "/"]).expect("parse");
        match cli.command {
            Commands::Fetch {
                urls,
                mode,
                method,
                offline,
                output,
            } => {
                assert_eq!(urls, vec!["/".to_string()]);
                assert_eq!(RequestMode::from(mode), RequestMode::NoCors);
                assert_eq!(method, "GET");
                assert!(!offline);
                assert!(output.is_none());
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_fetch_navigate_offline_with_global_flags() {
        let cli = Cli::try_parse_from([
            "shellcache",
            "fetch",
            "--mode",
            "navigate",
            "--offline",
            "/kue",
            "--cache-dir",
            "/tmp/shellcache",
        ])
        .expect("parse");
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/shellcache")));
        match cli.command {
            Commands::Fetch { mode, offline, .. } => {
                assert_eq!(RequestMode::from(mode), RequestMode::Navigate);
                assert!(offline);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_fetch_requires_url() {
        assert!(Cli::try_parse_from(["shellcache", "fetch"]).is_err());
    }
}
