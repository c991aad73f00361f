//! Scripted in-process client for engine tests
//!
//! All delays go through `tokio::time`, so tests running on a paused clock
//! advance instantly and deterministically.

use super::{ByteStream, HttpClient};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome of one scripted probe
#[derive(Debug, Clone, Copy)]
pub enum ProbeStep {
    /// Answer after the given round trip
    Reply(Duration),
    /// Fail immediately with a transport error
    Fail,
    /// Never answer
    Hang,
}

#[derive(Debug, Clone, Copy)]
pub enum DownloadMode {
    /// Stream `chunk_bytes` every `interval`, optionally ending after `chunks` chunks
    Stream {
        chunk_bytes: usize,
        interval: Duration,
        chunks: Option<usize>,
    },
    Fail,
    Panic,
}

#[derive(Debug, Clone, Copy)]
pub enum UploadMode {
    /// Accept each body after `delay`
    Accept(Duration),
    Fail,
}

#[derive(Debug, Default)]
pub struct MockCounters {
    pub probes: AtomicUsize,
    pub downloads: AtomicUsize,
    pub uploads: AtomicUsize,
    pub active_streams: AtomicUsize,
    pub max_active_streams: AtomicUsize,
}

/// Decrements the live stream count when a download body is dropped
struct StreamGuard {
    counters: Arc<MockCounters>,
}

impl StreamGuard {
    fn new(counters: Arc<MockCounters>) -> Self {
        let active = counters.active_streams.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_active_streams.fetch_max(active, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.counters.active_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockClient {
    probes: Mutex<VecDeque<ProbeStep>>,
    fallback_probe: ProbeStep,
    download: DownloadMode,
    upload: UploadMode,
    pub counters: Arc<MockCounters>,
    seen_urls: Mutex<Vec<String>>,
}

impl MockClient {
    /// 20 ms probes, 1 KB chunks every 10 ms, uploads accepted after 10 ms
    pub fn new() -> Self {
        Self {
            probes: Mutex::new(VecDeque::new()),
            fallback_probe: ProbeStep::Reply(Duration::from_millis(20)),
            download: DownloadMode::Stream {
                chunk_bytes: 1_000,
                interval: Duration::from_millis(10),
                chunks: None,
            },
            upload: UploadMode::Accept(Duration::from_millis(10)),
            counters: Arc::new(MockCounters::default()),
            seen_urls: Mutex::new(Vec::new()),
        }
    }

    /// Script the next probes in order; once exhausted the fallback applies
    pub fn with_probes(self, steps: impl IntoIterator<Item = ProbeStep>) -> Self {
        self.probes.lock().unwrap().extend(steps);
        self
    }

    pub fn with_fallback_probe(mut self, step: ProbeStep) -> Self {
        self.fallback_probe = step;
        self
    }

    pub fn with_download(mut self, mode: DownloadMode) -> Self {
        self.download = mode;
        self
    }

    pub fn with_upload(mut self, mode: UploadMode) -> Self {
        self.upload = mode;
        self
    }

    pub fn seen_urls(&self) -> Vec<String> {
        self.seen_urls.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> usize {
        self.counters.downloads.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.counters.uploads.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.counters.probes.load(Ordering::SeqCst)
    }

    pub fn max_active_streams(&self) -> usize {
        self.counters.max_active_streams.load(Ordering::SeqCst)
    }

    pub fn active_streams(&self) -> usize {
        self.counters.active_streams.load(Ordering::SeqCst)
    }

    fn record(&self, url: &str) {
        self.seen_urls.lock().unwrap().push(url.to_string());
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn probe(&self, url: &str) -> Result<u16> {
        self.record(url);
        self.counters.probes.fetch_add(1, Ordering::SeqCst);

        let step = self
            .probes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback_probe);

        match step {
            ProbeStep::Reply(rtt) => {
                tokio::time::sleep(rtt).await;
                Ok(204)
            }
            ProbeStep::Fail => Err(AppError::network("connection refused")),
            ProbeStep::Hang => std::future::pending::<Result<u16>>().await,
        }
    }

    async fn open_download(&self, url: &str) -> Result<ByteStream> {
        self.record(url);
        self.counters.downloads.fetch_add(1, Ordering::SeqCst);

        match self.download {
            DownloadMode::Stream { chunk_bytes, interval, chunks } => {
                let guard = StreamGuard::new(self.counters.clone());
                let body = stream::unfold((0usize, guard), move |(sent, guard)| async move {
                    if chunks.is_some_and(|limit| sent >= limit) {
                        return None;
                    }
                    tokio::time::sleep(interval).await;
                    Some((Ok(chunk_bytes), (sent + 1, guard)))
                });
                Ok(body.boxed())
            }
            DownloadMode::Fail => Err(AppError::network("connection reset by peer")),
            DownloadMode::Panic => panic!("download stream exploded"),
        }
    }

    async fn upload(&self, url: &str, payload: Bytes) -> Result<u16> {
        self.record(url);
        self.counters.uploads.fetch_add(1, Ordering::SeqCst);

        match self.upload {
            UploadMode::Accept(delay) => {
                let _guard = StreamGuard::new(self.counters.clone());
                tokio::time::sleep(delay).await;
                drop(payload);
                Ok(200)
            }
            UploadMode::Fail => Err(AppError::http_request("upload rejected")),
        }
    }
}
