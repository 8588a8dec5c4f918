//! Rate-paced upload of binary audio.
//!
//! The service ingests audio at a fixed budget (e.g. 3200 bytes every 100 ms
//! at 16 kHz). [`ChunkedUploader`] slices a payload into chunks of at most
//! `chunk_size` bytes and sends one per tick of a fixed interval timer.
//!
//! # Transmitters
//!
//! How a chunk is materialized before the socket send is pluggable through
//! [`ChunkTransmitter`]:
//!
//! - [`BlobTransmitter`]: slices the payload directly (zero-copy)
//! - [`BufferTransmitter`]: reads the chunk into an owned byte array through
//!   an async read step
//!
//! Both produce identical chunk sequences and share the same timing loop.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::base::{NlsError, NlsResult, TransportMode};
use super::config::PacingConfig;
use super::link::SocketLink;

// =============================================================================
// Chunk Transmitters
// =============================================================================

/// Turns a byte range of the payload into a frame ready to send.
#[async_trait]
pub trait ChunkTransmitter: Send + Sync {
    async fn materialize(&mut self, payload: &Bytes, range: Range<usize>) -> NlsResult<Bytes>;

    fn name(&self) -> &'static str;
}

/// Sends slices of the original payload without copying.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlobTransmitter;

#[async_trait]
impl ChunkTransmitter for BlobTransmitter {
    async fn materialize(&mut self, payload: &Bytes, range: Range<usize>) -> NlsResult<Bytes> {
        Ok(payload.slice(range))
    }

    fn name(&self) -> &'static str {
        "blob"
    }
}

/// Copies each chunk into a fresh byte array before sending.
#[derive(Debug, Default)]
pub struct BufferTransmitter {
    scratch: Vec<u8>,
}

#[async_trait]
impl ChunkTransmitter for BufferTransmitter {
    async fn materialize(&mut self, payload: &Bytes, range: Range<usize>) -> NlsResult<Bytes> {
        self.scratch.clear();
        let mut reader = &payload[range];
        reader
            .read_to_end(&mut self.scratch)
            .await
            .map_err(|e| NlsError::NetworkError(format!("Failed to read audio chunk: {e}")))?;
        Ok(Bytes::copy_from_slice(&self.scratch))
    }

    fn name(&self) -> &'static str {
        "arraybuffer"
    }
}

/// Transmitter matching a transport mode.
pub fn transmitter_for(mode: TransportMode) -> Box<dyn ChunkTransmitter> {
    match mode {
        TransportMode::Blob => Box::new(BlobTransmitter),
        TransportMode::ArrayBuffer => Box::new(BufferTransmitter::default()),
    }
}

// =============================================================================
// Upload Report
// =============================================================================

/// Outcome of one paced upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub chunks_sent: usize,
    pub bytes_sent: usize,
    pub total_bytes: usize,
    pub elapsed: Duration,
}

impl UploadReport {
    /// True when every byte of the payload was sent.
    #[inline]
    pub fn completed(&self) -> bool {
        self.bytes_sent == self.total_bytes
    }

    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_sent as f64 / secs
        } else {
            0.0
        }
    }
}

// =============================================================================
// Chunked Uploader
// =============================================================================

/// Paces a payload over an open link.
pub struct ChunkedUploader {
    pacing: PacingConfig,
    transmitter: Box<dyn ChunkTransmitter>,
}

impl ChunkedUploader {
    pub fn new(pacing: PacingConfig, transmitter: Box<dyn ChunkTransmitter>) -> NlsResult<Self> {
        if pacing.chunk_size == 0 {
            return Err(NlsError::ConfigurationError(
                "Chunk size must be greater than zero".to_string(),
            ));
        }
        if pacing.interval.is_zero() {
            return Err(NlsError::ConfigurationError(
                "Chunk interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            pacing,
            transmitter,
        })
    }

    #[inline]
    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    /// Send `payload` one chunk per tick, in order.
    ///
    /// The first chunk goes out one interval after the call. The loop ends
    /// early, without sending, on the first tick that finds the link closed or
    /// as soon as the link's cancellation token fires.
    pub async fn upload(&mut self, link: &SocketLink, payload: Bytes) -> UploadReport {
        let total_bytes = payload.len();
        let cancel = link.cancellation();
        let started = Instant::now();

        let mut ticker = interval_at(started + self.pacing.interval, self.pacing.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut offset = 0;
        let mut chunks_sent = 0;

        while offset < total_bytes {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Upload cancelled at offset {}/{}", offset, total_bytes);
                    break;
                }
                _ = ticker.tick() => {}
            }

            if !link.is_open() {
                debug!("Connection closed, stopping upload at offset {}", offset);
                break;
            }

            let end = (offset + self.pacing.chunk_size).min(total_bytes);
            let chunk = match self.transmitter.materialize(&payload, offset..end).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Failed to prepare audio chunk: {}", e);
                    break;
                }
            };

            if !link.send_binary(chunk).await {
                debug!("Connection closed mid-upload at offset {}", offset);
                break;
            }

            debug!(
                "Sent {} chunk {} ({}..{})",
                self.transmitter.name(),
                chunks_sent,
                offset,
                end
            );
            offset = end;
            chunks_sent += 1;
        }

        let report = UploadReport {
            chunks_sent,
            bytes_sent: offset,
            total_bytes,
            elapsed: started.elapsed(),
        };

        info!(
            "sent {} bytes in {} ms ({:.0} bytes/second)",
            report.bytes_sent,
            report.elapsed.as_millis(),
            report.bytes_per_second()
        );

        report
    }

    /// Wait out the guard delay before the stop command.
    ///
    /// Returns `false` if the link closed during the wait.
    pub async fn settle(&self, link: &SocketLink) -> bool {
        let cancel = link.cancellation();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.pacing.stop_delay) => link.is_open(),
        }
    }
}
