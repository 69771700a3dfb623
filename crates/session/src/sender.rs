//! Sender half of the stop-and-wait exchange.

use std::io::{Read, Seek};
use std::time::Duration;

use tracing::{debug, info, warn};

use capybeam_protocol::{Envelope, FileMeta, Kind, MetaError};
use capybeam_transfer::{ChunkSource, ProducedChunk};

use crate::channel::VisualChannel;
use crate::progress::TransferProgress;
use crate::SessionError;

/// How long the terminal frame stays on display before teardown.
///
/// The receiver needs several observation opportunities to catch the
/// `Completed` frame. If it still misses the window it keeps every committed
/// chunk and the host can offer a manual finish.
pub const COMPLETED_HOLD: Duration = Duration::from_secs(2);

/// Sender lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// No transfer in progress; the chunk size may still be changed.
    Idle,
    /// Metadata frame on display, awaiting the receiver's acknowledgment.
    Advertising,
    /// Chunk `n` (1-based) on display, awaiting its digest report.
    Transmitting(u64),
    /// Terminal frame on display, draining briefly before teardown.
    Finalizing,
    Done,
}

/// Owns the sender side of one transfer: the file metadata, the chunk
/// source, and the displayed envelope.
pub struct SenderSession<R: Read + Seek, C: VisualChannel> {
    meta: FileMeta,
    source: ChunkSource<R>,
    channel: C,
    state: SenderState,
    /// Nonce of the next emission; strictly monotonic.
    next_nonce: u64,
    /// Nonce of the last observation acted on.
    last_seen: Option<u64>,
    /// The last produced chunk, cached so a rejected digest is answered with
    /// a byte-identical retransmit instead of a fresh read.
    current: Option<ProducedChunk>,
}

impl<R: Read + Seek, C: VisualChannel> SenderSession<R, C> {
    pub fn new(reader: R, meta: FileMeta, channel: C) -> Self {
        let source = ChunkSource::new(reader, &meta);
        Self {
            meta,
            source,
            channel,
            state: SenderState::Idle,
            next_nonce: 1,
            last_seen: None,
            current: None,
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    /// Rewrites the chunk size and re-derives the chunk count.
    ///
    /// Only meaningful before the transfer starts; once the first frame is on
    /// display the geometry is frozen.
    pub fn set_chunk_size(&mut self, chunk_size: u64) -> Result<(), SessionError> {
        if self.state != SenderState::Idle {
            return Err(SessionError::ChunkSizeFrozen);
        }
        self.meta = FileMeta::new(
            self.meta.file_name.clone(),
            Some(self.meta.file_type.clone()),
            self.meta.file_size,
            chunk_size,
        )?;
        self.source.reconfigure(&self.meta);
        self.current = None;
        Ok(())
    }

    /// Puts the metadata frame on display and starts waiting for the
    /// receiver's acknowledgment.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SenderState::Idle {
            return Err(SessionError::NotIdle);
        }
        let body = self.meta.to_json().map_err(MetaError::Json)?;
        self.emit(Kind::MetaInfo, body)?;
        self.state = SenderState::Advertising;
        info!(
            file = %self.meta.file_name,
            size = self.meta.file_size,
            chunks = self.meta.chunk_count,
            "advertising file"
        );
        Ok(())
    }

    /// Feeds one observed envelope into the state machine.
    ///
    /// Frames that are undecodable, repeats of an already-processed nonce, or
    /// out of place for the current state are ignored; the peer keeps
    /// redisplaying until it sees the expected response.
    pub fn observe(&mut self, observation: &Envelope) -> Result<(), SessionError> {
        if observation.kind == Kind::Unknown {
            debug!("ignoring undecodable frame");
            return Ok(());
        }
        if self.is_duplicate(observation.nonce) {
            debug!(nonce = observation.nonce, "ignoring repeat sighting");
            return Ok(());
        }

        match (self.state, observation.kind) {
            (SenderState::Advertising, Kind::MetaInfoReceived) => {
                self.mark_seen(observation);
                if self.meta.chunk_count == 0 {
                    self.complete()
                } else {
                    self.send_chunk(1)
                }
            }
            (SenderState::Transmitting(index), Kind::EvalSha256) => {
                self.mark_seen(observation);
                // Transmitting always has a produced chunk behind it.
                let Some(current) = self.current.as_ref() else {
                    return Ok(());
                };
                if observation.body == current.digest {
                    if index == self.meta.chunk_count {
                        info!(chunk = index, "final chunk acknowledged");
                        self.complete()
                    } else {
                        debug!(chunk = index, "chunk acknowledged");
                        self.send_chunk(index + 1)
                    }
                } else {
                    warn!(
                        chunk = index,
                        reported = %observation.body,
                        "digest mismatch, retransmitting"
                    );
                    let wire_form = current.wire_form.clone();
                    self.emit(Kind::InvalidSha256, wire_form)
                }
            }
            (state, kind) => {
                debug!(?state, ?kind, "frame has no transition, ignoring");
                Ok(())
            }
        }
    }

    /// Tears the visual session down after the terminal frame has had its
    /// hold window. A no-op outside `Finalizing`.
    pub fn finish(&mut self) {
        if self.state == SenderState::Finalizing {
            self.channel.close();
            self.state = SenderState::Done;
            info!(file = %self.meta.file_name, "transfer complete");
        }
    }

    /// User cancel: releases the channel and returns to idle. Nothing the
    /// receiver observed so far is affected.
    pub fn stop(&mut self) {
        if self.state != SenderState::Idle {
            info!("transfer cancelled");
        }
        self.teardown();
    }

    pub fn progress(&self) -> TransferProgress {
        let done_chunks = match self.state {
            SenderState::Idle | SenderState::Advertising => 0,
            SenderState::Transmitting(index) => index - 1,
            SenderState::Finalizing | SenderState::Done => self.meta.chunk_count,
        };
        let done_bytes = if done_chunks == self.meta.chunk_count {
            self.meta.file_size
        } else {
            done_chunks * self.meta.chunk_size
        };
        TransferProgress {
            total_chunks: self.meta.chunk_count,
            done_chunks,
            total_bytes: self.meta.file_size,
            done_bytes,
        }
    }

    fn send_chunk(&mut self, index: u64) -> Result<(), SessionError> {
        let chunk = match self.source.produce(index) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.teardown();
                return Err(e.into());
            }
        };
        let wire_form = chunk.wire_form.clone();
        self.current = Some(chunk);
        self.emit(Kind::OkNext, wire_form)?;
        self.state = SenderState::Transmitting(index);
        Ok(())
    }

    fn complete(&mut self) -> Result<(), SessionError> {
        self.emit(Kind::Completed, String::new())?;
        self.state = SenderState::Finalizing;
        Ok(())
    }

    fn emit(&mut self, kind: Kind, body: String) -> Result<(), SessionError> {
        let envelope = Envelope::new(kind, body, self.next_nonce);
        self.next_nonce += 1;
        if let Err(e) = self.channel.display(&envelope) {
            self.teardown();
            return Err(e.into());
        }
        Ok(())
    }

    fn is_duplicate(&self, nonce: u64) -> bool {
        self.last_seen.is_some_and(|last| nonce <= last)
    }

    fn mark_seen(&mut self, observation: &Envelope) {
        self.last_seen = Some(observation.nonce);
    }

    fn teardown(&mut self) {
        self.channel.close();
        self.current = None;
        self.last_seen = None;
        self.state = SenderState::Idle;
    }
}
