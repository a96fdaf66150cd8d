//! walk-mapper CLI - render walking trips from a GPS fix log
//!
//! Usage:
//!   walk-mapper <ACCESS_TOKEN> < fixes.txt
//!
//! Reads `timestamp;latitude;longitude` lines from stdin, splits them into
//! trips and prints one `{"file_name": "..."}` line per rendered map.
//! Diagnostics go to stderr; set `RUST_LOG` to change their verbosity.

use chrono::TimeDelta;
use clap::Parser;
use log::error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use walk_mapper::pipeline::{DEFAULT_CONCURRENCY, DEFAULT_DELIMITER};
use walk_mapper::request::{DEFAULT_ENDPOINT, DEFAULT_STYLE};
use walk_mapper::{
    run, Backoff, Error, PipelineConfig, RenderResult, ResultCallback, RetryPolicy,
    DEFAULT_TRIP_GAP_MINUTES,
};

#[derive(Parser)]
#[command(name = "walk-mapper")]
#[command(about = "Render walking trips from a GPS fix log as static maps", long_about = None)]
struct Cli {
    /// Access token for the static map service
    #[arg(env = "MAPBOX_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Field delimiter of the input
    #[arg(short, long, default_value_t = DEFAULT_DELIMITER as char)]
    delimiter: char,

    /// Maximum number of maps downloaded at once
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Largest gap between two fixes of the same trip, in minutes
    #[arg(long, default_value_t = DEFAULT_TRIP_GAP_MINUTES)]
    max_gap_minutes: i64,

    /// Retries after a failed map download
    #[arg(long, default_value_t = 4)]
    max_retries: u32,

    /// Wait before the first retry, in milliseconds
    #[arg(long, default_value_t = 1000)]
    retry_wait_min_ms: u64,

    /// Longest wait between retries, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    retry_wait_max_ms: u64,

    /// Base URL of the static images API
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Map style as owner/style_id
    #[arg(long, default_value = DEFAULT_STYLE)]
    style: String,

    /// Directory for rendered maps (defaults to the system temp directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig, Error> {
        if !self.delimiter.is_ascii() {
            return Err(Error::InvalidConfig(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            )));
        }
        if self.retry_wait_min_ms > self.retry_wait_max_ms {
            return Err(Error::InvalidConfig(
                "--retry-wait-min-ms must not exceed --retry-wait-max-ms".to_string(),
            ));
        }

        let mut config = PipelineConfig::new(self.access_token);
        config.delimiter = self.delimiter as u8;
        config.concurrency = self.concurrency;
        config.trip_gap = TimeDelta::try_minutes(self.max_gap_minutes).ok_or_else(|| {
            Error::InvalidConfig(format!("gap of {} minutes is out of range", self.max_gap_minutes))
        })?;
        config.retry = RetryPolicy::new(
            self.max_retries,
            Backoff::Exponential {
                min: Duration::from_millis(self.retry_wait_min_ms),
                max: Duration::from_millis(self.retry_wait_max_ms),
            },
        );
        config.render.endpoint = self.endpoint;
        config.render.style = self.style;
        config.output_dir = self.output_dir;
        Ok(config)
    }
}

/// Write one JSON line for a rendered map. A closed stdout is an error for
/// this result only.
fn write_result<W: Write>(out: &mut W, result: &RenderResult) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, result)?;
    out.write_all(b"\n")?;
    out.flush()
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let print_result: ResultCallback = Arc::new(|result: RenderResult| {
        if let Err(e) = write_result(&mut std::io::stdout().lock(), &result) {
            error!("could not report {}: {}", result.file_name.display(), e);
        }
    });

    match run(config, std::io::stdin(), print_result).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
