//! Session activity heartbeat.
//!
//! One `Heartbeat` task exists per open session. Ticks while the reading
//! view is hidden are skipped outright; there is no catch-up when it becomes
//! visible again. Each POST runs detached from the ticker so a slow or
//! failing sink never delays the next tick or the reading loop.

use crate::cancellation::CancellationToken;
use crate::chapter::ReadingMode;
use crate::error::TelemetryError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Position details attached to each pulse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressHints {
    pub chapter_number: Option<u32>,
    pub mode: ReadingMode,
    pub loaded_chapters: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    pub novel_id: String,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
    pub progress_hints: ProgressHints,
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, beat: &HeartbeatPayload) -> Result<(), TelemetryError>;
}

/// Posts heartbeats as JSON to the telemetry collaborator.
#[derive(Clone, Debug)]
pub struct HttpTelemetrySink {
    http: reqwest::Client,
    url: Url,
}

impl HttpTelemetrySink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid telemetry url {url}"))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn send(&self, beat: &HeartbeatPayload) -> Result<(), TelemetryError> {
        let resp = self
            .http
            .post(self.url.clone())
            .json(beat)
            .send()
            .await
            .map_err(|err| TelemetryError::Transport(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TelemetryError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Handle to the running heartbeat task. Dropping it stops the task.
pub struct Heartbeat {
    novel_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Heartbeat {
    pub fn start(
        sink: Arc<dyn TelemetrySink>,
        interval: Duration,
        novel_id: String,
        progress: watch::Receiver<ProgressHints>,
        visible: watch::Receiver<bool>,
    ) -> Self {
        let cancel = CancellationToken::new();
        info!(
            novel_id = %novel_id,
            interval_secs = interval.as_secs_f32(),
            "Starting session heartbeat"
        );
        let task = tokio::spawn(run_heartbeat(
            sink,
            interval,
            novel_id.clone(),
            progress,
            visible,
            cancel.clone(),
        ));
        Self {
            novel_id,
            cancel,
            task,
        }
    }

    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
        debug!(novel_id = %self.novel_id, "Stopped session heartbeat");
    }
}

async fn run_heartbeat(
    sink: Arc<dyn TelemetrySink>,
    interval: Duration,
    novel_id: String,
    progress: watch::Receiver<ProgressHints>,
    visible: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !*visible.borrow() {
            trace!(novel_id = %novel_id, "Reading view hidden; skipping heartbeat");
            continue;
        }
        let beat = HeartbeatPayload {
            novel_id: novel_id.clone(),
            timestamp: unix_millis(),
            progress_hints: progress.borrow().clone(),
        };
        let sink = Arc::clone(&sink);
        tokio::spawn(async move {
            if let Err(err) = sink.send(&beat).await {
                warn!(novel_id = %beat.novel_id, "Heartbeat failed: {err}");
            }
        });
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
