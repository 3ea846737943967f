use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::TransferConfig,
    error::{DriveError, Result, SendError},
    types::{ChunkMessage, FetchedFile, FileMetadata},
};

/// Receiver of chunk messages, typically the host runtime forwarding bytes to storage
///
/// A failed `send` is retried with the same message; an `Ok` means the chunk
/// was accepted and will not be sent again.
#[async_trait]
pub trait ChunkSink: Send {
    async fn send(&mut self, chunk: &ChunkMessage) -> std::result::Result<(), SendError>;
}

#[async_trait]
impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    async fn send(&mut self, chunk: &ChunkMessage) -> std::result::Result<(), SendError> {
        (**self).send(chunk).await
    }
}

/// Collects every accepted chunk in memory
#[async_trait]
impl ChunkSink for Vec<ChunkMessage> {
    async fn send(&mut self, chunk: &ChunkMessage) -> std::result::Result<(), SendError> {
        self.push(chunk.clone());
        Ok(())
    }
}

/// Retry budget and backoff schedule for one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry `retry` (1-indexed): `base_delay * 2^(retry - 1)`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Longest a single chunk can stall before it is declared failed
    pub fn worst_case_stall(&self) -> Duration {
        (1..=self.max_retries).map(|k| self.delay_for(k)).sum()
    }
}

impl From<&TransferConfig> for RetryPolicy {
    fn from(config: &TransferConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
        }
    }
}

/// Delivery state of a single chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Sending { attempt: u32 },
    BackingOff { retry: u32, delay: Duration },
    Succeeded { attempts: u32 },
    Failed { attempts: u32, message: String },
}

impl DeliveryState {
    /// Transition after send attempt `attempt` finished with `outcome`
    pub fn after_send(
        attempt: u32,
        outcome: std::result::Result<(), SendError>,
        policy: &RetryPolicy,
    ) -> Self {
        match outcome {
            Ok(()) => DeliveryState::Succeeded { attempts: attempt },
            Err(e) if attempt > policy.max_retries => DeliveryState::Failed {
                attempts: attempt,
                message: e.message,
            },
            Err(_) => DeliveryState::BackingOff {
                retry: attempt,
                delay: policy.delay_for(attempt),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Succeeded { .. } | DeliveryState::Failed { .. }
        )
    }
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub transfer_id: Uuid,
    pub total_length: u64,
    pub chunks: u64,
    /// Failed attempts that were later recovered
    pub retries: u64,
}

/// A single-pass chunked transfer of one file
///
/// Chunks are produced lazily in ascending sequence. Consume it as an
/// [`Iterator`] (no transmission step), chunk by chunk with
/// [`send_next`](Self::send_next), or as a [`Stream`] via
/// [`into_stream`](Self::into_stream). Once a chunk exhausts its retries the
/// transfer halts and yields nothing further.
#[derive(Debug)]
pub struct ChunkedTransfer {
    transfer_id: Uuid,
    data: Bytes,
    metadata: FileMetadata,
    chunk_size: usize,
    total_chunks: u64,
    next_sequence: u64,
    policy: RetryPolicy,
    retries: u64,
    halted: bool,
}

impl ChunkedTransfer {
    /// Prepare a transfer, rejecting files over `max_total_size` before any chunk exists
    pub fn new(file: FetchedFile, config: &TransferConfig) -> Result<Self> {
        config.validate()?;

        let size = file.bytes.len() as u64;
        if size > config.max_total_size {
            return Err(DriveError::SizeLimitExceeded {
                size,
                limit: config.max_total_size,
            });
        }

        // An empty file still gets one (empty) terminal chunk to carry its metadata
        let total_chunks = (file.bytes.len().div_ceil(config.chunk_size) as u64).max(1);
        let transfer_id = Uuid::new_v4();

        info!(
            transfer = %transfer_id,
            name = %file.name,
            bytes = size,
            chunks = total_chunks,
            chunk_size = config.chunk_size,
            "starting chunked transfer"
        );

        Ok(Self {
            transfer_id,
            data: file.bytes,
            metadata: FileMetadata {
                file_name: file.name,
                mime_type: file.mime_type,
            },
            chunk_size: config.chunk_size,
            total_chunks,
            next_sequence: 0,
            policy: RetryPolicy::from(config),
            retries: 0,
            halted: false,
        })
    }

    pub fn transfer_id(&self) -> Uuid {
        self.transfer_id
    }

    pub fn total_length(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Chunks not yet produced, or not yet accepted when driven by `send_next`
    pub fn remaining(&self) -> u64 {
        if self.halted {
            0
        } else {
            self.total_chunks - self.next_sequence
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn build_chunk(&self, sequence: u64) -> ChunkMessage {
        let start = (sequence as usize) * self.chunk_size;
        let end = (start + self.chunk_size).min(self.data.len());
        let is_final = sequence + 1 == self.total_chunks;

        ChunkMessage {
            transfer_id: self.transfer_id,
            sequence,
            total_length: self.total_length(),
            payload: self.data.slice(start..end),
            is_final,
            metadata: is_final.then(|| self.metadata.clone()),
        }
    }

    /// The chunk at `next_sequence`, without moving past it
    fn pending_chunk(&self) -> Option<ChunkMessage> {
        if self.halted || self.next_sequence >= self.total_chunks {
            return None;
        }
        Some(self.build_chunk(self.next_sequence))
    }

    fn produce_next(&mut self) -> Option<ChunkMessage> {
        let chunk = self.pending_chunk()?;
        self.next_sequence += 1;
        Some(chunk)
    }

    /// Produce the next chunk and deliver it to `sink`, retrying with backoff
    ///
    /// Returns the delivered chunk, or `None` once the transfer is complete.
    ///
    /// Cancel safe: the transfer only moves past a chunk once `sink` has
    /// accepted it, so dropping this future mid-send or mid-backoff leaves the
    /// same chunk to be sent again by the next call.
    pub async fn send_next<S: ChunkSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> Result<Option<ChunkMessage>> {
        let Some(chunk) = self.pending_chunk() else {
            return Ok(None);
        };

        match self.deliver(&chunk, sink).await {
            Ok(attempts) => {
                self.next_sequence += 1;
                self.retries += u64::from(attempts - 1);
                debug!(
                    transfer = %self.transfer_id,
                    chunk = chunk.sequence + 1,
                    of = self.total_chunks,
                    "chunk delivered"
                );
                if chunk.is_final {
                    info!(
                        transfer = %self.transfer_id,
                        chunks = self.total_chunks,
                        retries = self.retries,
                        "chunked transfer complete"
                    );
                }
                Ok(Some(chunk))
            }
            Err(e) => {
                self.halted = true;
                Err(e)
            }
        }
    }

    /// Run one chunk through `Pending → Sending → {Succeeded | BackingOff → Sending | Failed}`
    async fn deliver<S: ChunkSink + ?Sized>(
        &self,
        chunk: &ChunkMessage,
        sink: &mut S,
    ) -> Result<u32> {
        let mut state = DeliveryState::Pending;
        loop {
            state = match state {
                DeliveryState::Pending => DeliveryState::Sending { attempt: 1 },
                DeliveryState::Sending { attempt } => {
                    let outcome = sink.send(chunk).await;
                    DeliveryState::after_send(attempt, outcome, &self.policy)
                }
                DeliveryState::BackingOff { retry, delay } => {
                    warn!(
                        transfer = %self.transfer_id,
                        chunk = chunk.sequence,
                        retry,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "chunk send failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    DeliveryState::Sending { attempt: retry + 1 }
                }
                DeliveryState::Succeeded { attempts } => return Ok(attempts),
                DeliveryState::Failed { attempts, message } => {
                    error!(
                        transfer = %self.transfer_id,
                        chunk = chunk.sequence,
                        attempts,
                        error = %message,
                        "chunk transfer failed"
                    );
                    return Err(DriveError::ChunkTransferFailed {
                        sequence: chunk.sequence,
                        attempts,
                        message,
                    });
                }
            };
        }
    }

    /// Deliver every remaining chunk to `sink`
    pub async fn deliver_all<S: ChunkSink + ?Sized>(
        mut self,
        sink: &mut S,
    ) -> Result<TransferSummary> {
        while self.send_next(sink).await?.is_some() {}
        Ok(TransferSummary {
            transfer_id: self.transfer_id,
            total_length: self.total_length(),
            chunks: self.next_sequence,
            retries: self.retries,
        })
    }

    /// Lazily deliver chunks to `sink` as they are pulled
    ///
    /// Each item is a chunk `sink` accepted. The stream ends after the
    /// terminal chunk, or right after yielding the first error. Dropping the
    /// stream stops the transfer.
    pub fn into_stream<S: ChunkSink>(self, sink: S) -> impl Stream<Item = Result<ChunkMessage>> {
        stream::unfold((self, sink), |(mut transfer, mut sink)| async move {
            match transfer.send_next(&mut sink).await {
                Ok(Some(chunk)) => Some((Ok(chunk), (transfer, sink))),
                Ok(None) => None,
                Err(e) => Some((Err(e), (transfer, sink))),
            }
        })
    }
}

impl Iterator for ChunkedTransfer {
    type Item = ChunkMessage;

    fn next(&mut self) -> Option<ChunkMessage> {
        self.produce_next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}
