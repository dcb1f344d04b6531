//! Configuration management
//!
//! Every option can come from the command line, the environment or a `.env`
//! file. Includes smart CPU detection for the default worker count.

use crate::dispatch::RangeSpec;
use crate::error::GenError;
use crate::monitor::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_STALL_INTERVALS};
use crate::paths::DEFAULT_SHARD_WIDTH;
use crate::pool::DEFAULT_QUEUE_SIZE;
use crate::template::Template;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Batch-generate numbered QR code images", long_about = None)]
pub struct Cli {
    /// QR text template with one %d-style placeholder for the 1-based number
    #[arg(short, long, env = "QRBATCH_TEXT", default_value = "No.%06d")]
    pub text: String,

    /// Logo image drawn at the center of each code (empty disables)
    #[arg(short, long, env = "QRBATCH_LOGO", default_value = "")]
    pub logo: String,

    /// Logo size as a percentage of the image size
    #[arg(short, long, env = "QRBATCH_LOGO_PERCENT", default_value_t = 15)]
    pub percent: u8,

    /// Output image size in pixels
    #[arg(short, long, env = "QRBATCH_SIZE", default_value_t = 256)]
    pub size: u32,

    /// First index to generate (inclusive)
    #[arg(long, env = "QRBATCH_START", default_value_t = 0)]
    pub start: u64,

    /// Index to stop at (exclusive)
    #[arg(long, env = "QRBATCH_END", default_value_t = 0)]
    pub end: u64,

    /// Number of workers (defaults to a value derived from the CPU count)
    #[arg(short, long = "worker", visible_alias = "workers", env = "QRBATCH_WORKERS")]
    pub worker: Option<usize>,

    /// Output root directory
    #[arg(short, long, env = "QRBATCH_OUT", default_value = "output")]
    pub out: String,

    /// Pending requests allowed per worker queue
    #[arg(long, env = "QRBATCH_QUEUE_SIZE", default_value_t = DEFAULT_QUEUE_SIZE)]
    pub queue_size: usize,

    /// JPEG quality (1-100)
    #[arg(long, env = "QRBATCH_QUALITY", default_value_t = 100)]
    pub quality: u8,

    /// Files per output subdirectory
    #[arg(long, env = "QRBATCH_SHARD_SIZE", default_value_t = DEFAULT_SHARD_WIDTH)]
    pub shard_size: u64,

    /// Seconds between progress reports
    #[arg(long, env = "QRBATCH_PROGRESS_INTERVAL", default_value_t = DEFAULT_PROGRESS_INTERVAL.as_secs())]
    pub progress_interval_secs: u64,

    /// Give up after this many progress intervals without a finished image (0 disables)
    #[arg(long, env = "QRBATCH_STALL_INTERVALS", default_value_t = DEFAULT_STALL_INTERVALS)]
    pub stall_intervals: u32,

    /// Write a JSON run report to this path
    #[arg(long, env = "QRBATCH_REPORT")]
    pub report: Option<PathBuf>,
}

/// Validated run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub template: Template,
    pub logo: Option<PathBuf>,
    /// Logo size in percent of `size`
    pub logo_percent: u8,
    /// Output image size in pixels
    pub size: u32,
    pub range: RangeSpec,
    pub worker_count: usize,
    /// Maximum pending requests per worker
    pub queue_size: usize,
    pub out_dir: PathBuf,
    pub quality: u8,
    pub shard_width: u64,
    pub progress_interval: Duration,
    pub stall_intervals: u32,
    pub report: Option<PathBuf>,
}

/// Smart CPU detection for optimal worker configuration
///
/// Strategy:
/// - Detects available parallelism (logical cores)
/// - QR rendering and JPEG encoding are CPU-bound, so most cores are used
/// - Reserves 1 core for the dispatcher and I/O if we have more than 4 cores
/// - Ensures minimum of 2 workers
pub fn detect_optimal_workers() -> usize {
    let logical_cores = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4);

    let workers = if logical_cores > 4 {
        logical_cores - 1
    } else {
        logical_cores
    };

    workers.max(2)
}

impl TryFrom<Cli> for Config {
    type Error = GenError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.text.is_empty() {
            return Err(GenError::ConfigError("text template is required".to_string()));
        }
        if cli.out.is_empty() {
            return Err(GenError::ConfigError("output directory is required".to_string()));
        }

        let template = Template::parse(&cli.text)?;
        let range = RangeSpec::new(cli.start, cli.end)?;

        let worker_count = cli.worker.unwrap_or_else(detect_optimal_workers);
        if worker_count == 0 {
            return Err(GenError::ConfigError(
                "worker count must be greater than 0".to_string(),
            ));
        }
        if cli.queue_size == 0 {
            return Err(GenError::ConfigError(
                "queue size must be greater than 0".to_string(),
            ));
        }
        if cli.size == 0 {
            return Err(GenError::ConfigError(
                "image size must be greater than 0".to_string(),
            ));
        }
        if !(1..=100).contains(&cli.percent) {
            return Err(GenError::ConfigError(format!(
                "logo percent must be between 1 and 100, got {}",
                cli.percent
            )));
        }
        if !(1..=100).contains(&cli.quality) {
            return Err(GenError::ConfigError(format!(
                "quality must be between 1 and 100, got {}",
                cli.quality
            )));
        }
        if cli.shard_size == 0 {
            return Err(GenError::ConfigError(
                "shard size must be greater than 0".to_string(),
            ));
        }
        if cli.progress_interval_secs == 0 {
            return Err(GenError::ConfigError(
                "progress interval must be at least 1 second".to_string(),
            ));
        }

        let logo = Some(cli.logo)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            template,
            logo,
            logo_percent: cli.percent,
            size: cli.size,
            range,
            worker_count,
            queue_size: cli.queue_size,
            out_dir: PathBuf::from(cli.out),
            quality: cli.quality,
            shard_width: cli.shard_size,
            progress_interval: Duration::from_secs(cli.progress_interval_secs),
            stall_intervals: cli.stall_intervals,
            report: cli.report,
        })
    }
}
