//! HTTP rendering of trip maps.
//!
//! This module downloads the static map for each [`RenderRequest`] with:
//! - A pluggable [`RetryPolicy`] for transient failures
//! - Streaming of the response body straight into a temporary `.png` file
//! - A bounded pool of in-flight requests fed from a channel

use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::{RenderRequest, RetryPolicy};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAP_FILE_SUFFIX: &str = ".png";

/// A map image that was written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderResult {
    pub file_name: PathBuf,
}

/// Outcome counts for one call to [`render_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rendered: u32,
    pub failed: u32,
}

/// Called once per successfully rendered map.
pub type ResultCallback = Arc<dyn Fn(RenderResult) + Send + Sync>;

/// Downloads static maps and stores them as temporary files.
pub struct MapRenderer {
    client: Client,
    retry: RetryPolicy,
    output_dir: Option<PathBuf>,
}

impl MapRenderer {
    /// Create a renderer writing into `output_dir`, or the system temp
    /// directory when `None`.
    pub fn new(retry: RetryPolicy, output_dir: Option<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let output_dir = output_dir.map(std::fs::canonicalize).transpose()?;

        Ok(Self {
            client,
            retry,
            output_dir,
        })
    }

    /// Render one trip map.
    ///
    /// The file only survives if the whole body was written.
    pub async fn render(&self, request: &RenderRequest) -> Result<RenderResult> {
        let start = Instant::now();
        let response = self.send_with_retry(request).await?;
        let file_name = self.persist(response).await?;

        info!(
            "[Render {}] saved {} in {:?}",
            request.trip_index,
            file_name.display(),
            start.elapsed()
        );

        Ok(RenderResult { file_name })
    }

    async fn send_with_retry(&self, request: &RenderRequest) -> Result<Response> {
        let mut retries = 0;

        loop {
            let (last_error, retry_after) = match self.client.get(request.url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if !self.retry.should_retry_status(status) {
                        return Err(Error::HttpStatus {
                            status: status.as_u16(),
                        });
                    }
                    (format!("HTTP {}", status), retry_after_hint(&resp))
                }
                Err(e) => {
                    // The URL carries the access token.
                    let e = e.without_url();
                    if !self.retry.should_retry_error(&e) {
                        return Err(Error::Http(e));
                    }
                    (e.to_string(), None)
                }
            };

            if retries >= self.retry.max_retries {
                return Err(Error::RetriesExhausted {
                    attempts: retries + 1,
                    last_error,
                });
            }

            let wait = self.retry.delay(retries, retry_after);
            retries += 1;
            debug!(
                "[Render {}] {}, retry {} after {:?}",
                request.trip_index, last_error, retries, wait
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn persist(&self, mut response: Response) -> Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.suffix(MAP_FILE_SUFFIX);
        let temp = match &self.output_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        // `temp` deletes the file on drop until it is kept.
        let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Http(e.without_url()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        let (_, path) = temp.keep().map_err(|e| Error::Io(e.error))?;
        Ok(path)
    }
}

/// `Retry-After` in seconds, only honoured on 429 and 503.
fn retry_after_hint(response: &Response) -> Option<Duration> {
    if !matches!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    ) {
        return None;
    }
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Render every request received on `requests` with at most `concurrency`
/// requests in flight.
///
/// Results are handed to `on_result` in completion order. Failures are
/// logged and counted; they never affect other requests.
pub async fn render_all(
    renderer: Arc<MapRenderer>,
    requests: mpsc::Receiver<RenderRequest>,
    concurrency: usize,
    on_result: ResultCallback,
) -> RenderStats {
    let rendered = AtomicU32::new(0);
    let failed = AtomicU32::new(0);
    let start = Instant::now();

    let incoming = stream::unfold(requests, |mut rx| async move {
        rx.recv().await.map(|request| (request, rx))
    });

    incoming
        .for_each_concurrent(concurrency.max(1), |request| {
            let renderer = &renderer;
            let on_result = &on_result;
            let rendered = &rendered;
            let failed = &failed;

            async move {
                match renderer.render(&request).await {
                    Ok(result) => {
                        rendered.fetch_add(1, Ordering::Relaxed);
                        on_result(result);
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        error!("[Render {}] {}", request.trip_index, e);
                    }
                }
            }
        })
        .await;

    let stats = RenderStats {
        rendered: rendered.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
    };

    info!(
        "[MapRenderer] DONE: {} rendered, {} failed in {:.2}s (max concurrent: {})",
        stats.rendered,
        stats.failed,
        start.elapsed().as_secs_f64(),
        concurrency.max(1)
    );

    stats
}
