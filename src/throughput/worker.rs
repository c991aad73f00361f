//! One concurrent transfer stream of a throughput phase

use crate::client::HttpClient;
use crate::error::{AppError, Result};
use crate::logging::NetworkLogger;
use crate::types::Direction;
use bytes::Bytes;
use futures::StreamExt;
use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Byte total shared by every worker of one phase
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Random upload body, generated once per phase and shared by every worker
pub fn generate_payload(size: usize) -> Bytes {
    let mut buffer = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut buffer);
    Bytes::from(buffer)
}

/// What a worker moves on each attempt
#[derive(Debug, Clone)]
pub enum Transfer {
    Download,
    Upload(Bytes),
}

impl Transfer {
    pub fn direction(&self) -> Direction {
        match self {
            Transfer::Download => Direction::Download,
            Transfer::Upload(_) => Direction::Upload,
        }
    }
}

/// Totals of one worker over a phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub attempts: u64,
    pub failures: u64,
    pub bytes: u64,
}

pub struct ThroughputWorker {
    id: usize,
    transfer: Transfer,
    url: String,
    client: Arc<dyn HttpClient>,
    logger: NetworkLogger,
}

impl ThroughputWorker {
    pub fn new(
        id: usize,
        transfer: Transfer,
        url: impl Into<String>,
        client: Arc<dyn HttpClient>,
        logger: NetworkLogger,
    ) -> Self {
        Self {
            id,
            transfer,
            url: url.into(),
            client,
            logger,
        }
    }

    pub fn direction(&self) -> Direction {
        self.transfer.direction()
    }

    /// Transfer repeatedly until `deadline` passes or `cancel` fires
    ///
    /// A failed attempt is restarted after a short pause. The attempt in
    /// flight when the phase ends is dropped, which aborts its request.
    pub async fn run(self, deadline: Instant, counter: ByteCounter, cancel: CancellationToken) -> WorkerReport {
        let mut report = WorkerReport {
            worker: self.id,
            ..WorkerReport::default()
        };
        let mut bytes = 0u64;

        while !cancel.is_cancelled() && Instant::now() < deadline {
            report.attempts += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep_until(deadline) => break,
                outcome = self.attempt(&counter, &mut bytes) => outcome,
            };

            if let Err(error) = outcome {
                report.failures += 1;
                self.logger
                    .log_request_failure(self.direction(), self.id, &error)
                    .await;

                // Brief pause so a hard-down endpoint cannot spin a core
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = sleep_until(deadline) => break,
                    _ = sleep(crate::defaults::WORKER_RESTART_DELAY) => {}
                }
            }
        }

        report.bytes = bytes;
        report
    }

    async fn attempt(&self, counter: &ByteCounter, bytes: &mut u64) -> Result<()> {
        match &self.transfer {
            Transfer::Download => {
                let mut body = self.client.open_download(&self.url).await?;
                let mut received = 0u64;

                while let Some(chunk) = body.next().await {
                    let len = chunk? as u64;
                    counter.add(len);
                    *bytes += len;
                    received += len;
                }

                if received == 0 {
                    return Err(AppError::http_request("Download ended without a body"));
                }
                Ok(())
            }
            Transfer::Upload(payload) => {
                let len = payload.len() as u64;
                self.client.upload(&self.url, payload.clone()).await?;
                counter.add(len);
                *bytes += len;
                Ok(())
            }
        }
    }
}
