//! stitchd — map-stitching CLI: merges a newly captured LiDAR session
//! onto a previously built prior map and writes the combined,
//! re-optimized trajectory.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use stitch::{StitchConfig, StitchRun};
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "stitchd", about = "Stitch a LiDAR session onto a prior map")]
struct Args {
    /// Prior session directory (read-only reference map).
    #[arg(long)]
    prior: PathBuf,

    /// Stitch session directory (newly captured trajectory).
    #[arg(long)]
    stitch: PathBuf,

    /// Output directory for the merged, re-optimized session.
    #[arg(long)]
    out: PathBuf,

    /// TOML file overlaying the default `StitchConfig`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the merged optimized poses as JSON to stdout after success.
    #[arg(long)]
    dump_poses: bool,

    /// Enable a daily-rotating file log in addition to stderr.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level for the `stitchd`/`stitch` targets.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Initialize stderr + optional rolling-file logging. Returns a guard
/// that must be held for the process lifetime so buffered file writes
/// are flushed on shutdown.
fn init_logging(args: &Args) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stitchd={},stitch={}", args.log_level, args.log_level)));
    let stderr_layer = tracing_subscriber::fmt::layer().with_target(true);

    match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "stitchd.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry().with(filter).with(stderr_layer).with(file_layer).init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr_layer).init();
            Ok(None)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<StitchConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        }
        None => Ok(StitchConfig::default()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args)?;

    let config = load_config(args.config.as_ref())?;
    info!(prior = %args.prior.display(), stitch = %args.stitch.display(), out = %args.out.display(), "starting stitching run");

    let run = StitchRun::new(config);
    match run.run(&args.prior, &args.stitch, &args.out) {
        Ok(outcome) => {
            info!(
                np = outcome.np,
                ns = outcome.ns,
                new_loops = outcome.records.newly_added.len(),
                "stitching run complete"
            );
            if args.dump_poses {
                let json = serde_json::to_string_pretty(&outcome.merged.poses)?;
                println!("{json}");
            }
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "stitching run failed");
            std::process::exit(1);
        }
    }
}
