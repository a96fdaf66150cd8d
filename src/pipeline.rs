//! Wiring of the stages into a single run.
//!
//! Reading, decoding, segmentation, summarizing and request building form a
//! synchronous iterator chain that runs on a blocking thread and keeps input
//! order. Its output goes through a bounded channel to the render pool, which
//! supplies backpressure when the pool is saturated.

use chrono::TimeDelta;
use log::{debug, error};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::http::{render_all, MapRenderer, RenderStats, ResultCallback};
use crate::{
    decode_records, default_trip_gap, read_records, summarize_trips, RenderConfig, RenderRequest,
    RequestBuilder, RetryPolicy, TripSegmenter,
};

/// Field delimiter used when none is configured.
pub const DEFAULT_DELIMITER: u8 = b';';
/// Maximum number of renders in flight.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub delimiter: u8,
    pub access_token: String,
    pub render: RenderConfig,
    pub retry: RetryPolicy,
    pub concurrency: usize,
    pub trip_gap: TimeDelta,
    /// Directory for rendered maps; the system temp directory when `None`.
    pub output_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            access_token: access_token.into(),
            render: RenderConfig::default(),
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            trip_gap: default_trip_gap(),
            output_dir: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".to_string()));
        }
        if self.trip_gap < TimeDelta::zero() {
            return Err(Error::InvalidConfig(format!(
                "trip gap must not be negative, got {}s",
                self.trip_gap.num_seconds()
            )));
        }
        Ok(())
    }
}

/// Turn raw input into render requests, one per drawable trip, in input order.
pub fn render_requests<'a, R>(
    input: R,
    delimiter: u8,
    trip_gap: TimeDelta,
    builder: &'a RequestBuilder,
) -> impl Iterator<Item = RenderRequest> + 'a
where
    R: Read + 'a,
{
    let fixes = decode_records(read_records(input, delimiter));
    let trips = TripSegmenter::new(fixes, trip_gap);
    builder.build_all(summarize_trips(trips))
}

/// Run the whole pipeline over `input` until it is exhausted and every
/// render has finished.
///
/// Only configuration problems are returned as errors; failures of single
/// lines, trips or renders are logged and skipped.
pub async fn run<R>(config: PipelineConfig, input: R, on_result: ResultCallback) -> Result<RenderStats>
where
    R: Read + Send + 'static,
{
    config.validate()?;

    let builder = RequestBuilder::new(&config.render, &config.access_token)?;
    let renderer = Arc::new(MapRenderer::new(config.retry.clone(), config.output_dir.clone())?);

    let (tx, rx) = mpsc::channel(config.concurrency);
    let delimiter = config.delimiter;
    let trip_gap = config.trip_gap;

    let producer = tokio::task::spawn_blocking(move || {
        let mut sent = 0usize;
        for request in render_requests(input, delimiter, trip_gap, &builder) {
            if tx.blocking_send(request).is_err() {
                break;
            }
            sent += 1;
        }
        sent
    });

    let stats = render_all(renderer, rx, config.concurrency, on_result).await;

    match producer.await {
        Ok(sent) => debug!("[Pipeline] {} render requests built", sent),
        Err(e) => error!("[Pipeline] input stage failed: {}", e),
    }

    Ok(stats)
}
