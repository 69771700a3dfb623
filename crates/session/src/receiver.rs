//! Receiver half of the stop-and-wait exchange.

use tracing::{debug, info, warn};

use capybeam_protocol::{Envelope, FileMeta, Kind};
use capybeam_transfer::{Reassembler, TransferError};

use crate::channel::{FileSink, VisualChannel};
use crate::progress::TransferProgress;
use crate::SessionError;

/// Receiver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    /// Capture running, no valid metadata seen yet.
    AwaitingMeta,
    /// Metadata accepted; chunks are being collected.
    Collecting,
    /// File delivered; the session is over.
    Finalized,
}

/// Owns the receiver side of one transfer: the reassembly buffer, the
/// displayed envelope, and the delivery sink.
pub struct ReceiverSession<C: VisualChannel, S: FileSink> {
    channel: C,
    sink: S,
    state: ReceiverState,
    assembler: Option<Reassembler>,
    /// Nonce of the next emission; strictly monotonic.
    next_nonce: u64,
    /// Nonce of the last observation acted on.
    last_seen: Option<u64>,
}

impl<C: VisualChannel, S: FileSink> ReceiverSession<C, S> {
    pub fn new(channel: C, sink: S) -> Self {
        Self {
            channel,
            sink,
            state: ReceiverState::Idle,
            assembler: None,
            next_nonce: 1,
            last_seen: None,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Begins watching the channel for the sender's metadata frame.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != ReceiverState::Idle {
            return Err(SessionError::NotIdle);
        }
        self.state = ReceiverState::AwaitingMeta;
        Ok(())
    }

    /// Feeds one observed envelope into the state machine.
    ///
    /// Undecodable frames, repeats of an already-processed nonce, frames
    /// whose body fails validation, and frames with no transition from the
    /// current state are all ignored; the sender keeps redisplaying its
    /// envelope until it sees a response.
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
            (ReceiverState::AwaitingMeta, Kind::MetaInfo) => self.accept_meta(observation),
            (ReceiverState::Collecting, Kind::MetaInfo) => {
                debug!("metadata already set, ignoring re-advertisement");
                Ok(())
            }
            (ReceiverState::Collecting, Kind::OkNext) => self.accept_chunk(observation),
            (ReceiverState::Collecting, Kind::InvalidSha256) => self.retry_chunk(observation),
            (ReceiverState::Collecting, Kind::Completed) => self.complete(observation),
            (state, kind) => {
                debug!(?state, ?kind, "frame has no transition, ignoring");
                Ok(())
            }
        }
    }

    /// User cancel: releases the channel and discards everything collected.
    /// No partial file is delivered.
    pub fn cancel(&mut self) {
        if self.state != ReceiverState::Idle {
            info!("transfer cancelled");
        }
        self.abort();
    }

    pub fn progress(&self) -> TransferProgress {
        match &self.assembler {
            Some(assembler) => TransferProgress {
                total_chunks: assembler.meta().chunk_count,
                done_chunks: assembler.committed_chunks(),
                total_bytes: assembler.meta().file_size,
                done_bytes: assembler.committed_bytes(),
            },
            None => TransferProgress::default(),
        }
    }

    fn accept_meta(&mut self, observation: &Envelope) -> Result<(), SessionError> {
        let meta = match FileMeta::from_json(&observation.body) {
            Ok(meta) => meta,
            Err(e) => {
                // An invalid record never creates a session; the nonce is not
                // recorded so a cleaner sighting can still be parsed.
                warn!(error = %e, "rejecting metadata frame");
                return Ok(());
            }
        };
        self.mark_seen(observation);
        info!(
            file = %meta.file_name,
            size = meta.file_size,
            chunks = meta.chunk_count,
            "metadata accepted"
        );
        self.assembler = Some(Reassembler::new(meta));
        self.emit(Kind::MetaInfoReceived, String::new())?;
        self.state = ReceiverState::Collecting;
        Ok(())
    }

    fn accept_chunk(&mut self, observation: &Envelope) -> Result<(), SessionError> {
        let Some(assembler) = self.assembler.as_mut() else {
            return Ok(());
        };
        // A fresh chunk is the sender's confirmation that the previous digest
        // matched; the pending chunk is committed before the new one is
        // staged.
        if assembler.has_pending() {
            if let Err(e) = assembler.commit_pending() {
                self.abort();
                return Err(e.into());
            }
        }
        let digest = match assembler.set_pending(&observation.body) {
            Ok(digest) => digest,
            Err(TransferError::InvalidWireForm(e)) => {
                warn!(error = %e, "rejecting chunk frame");
                return Ok(());
            }
            Err(e) => {
                self.abort();
                return Err(e.into());
            }
        };
        let staged = assembler.committed_chunks() + 1;
        self.mark_seen(observation);
        debug!(chunk = staged, digest = %digest, "chunk staged");
        self.emit(Kind::EvalSha256, digest)
    }

    fn retry_chunk(&mut self, observation: &Envelope) -> Result<(), SessionError> {
        let Some(assembler) = self.assembler.as_mut() else {
            return Ok(());
        };
        if !assembler.has_pending() {
            debug!("rejection frame with nothing pending, ignoring");
            return Ok(());
        }
        // The sender rejected the reported digest: the staged chunk is
        // discarded and the carried wire form becomes the fresh attempt.
        if let Err(e) = assembler.drop_pending() {
            self.abort();
            return Err(e.into());
        }
        let digest = match assembler.set_pending(&observation.body) {
            Ok(digest) => digest,
            Err(TransferError::InvalidWireForm(e)) => {
                warn!(error = %e, "rejecting retransmitted chunk frame");
                return Ok(());
            }
            Err(e) => {
                self.abort();
                return Err(e.into());
            }
        };
        self.mark_seen(observation);
        debug!(digest = %digest, "retry staged");
        self.emit(Kind::EvalSha256, digest)
    }

    fn complete(&mut self, observation: &Envelope) -> Result<(), SessionError> {
        self.mark_seen(observation);
        let Some(assembler) = self.assembler.as_mut() else {
            return Ok(());
        };
        if assembler.has_pending() {
            if let Err(e) = assembler.commit_pending() {
                self.abort();
                return Err(e.into());
            }
        }
        let file = match assembler.finalize() {
            Ok(file) => file,
            Err(e) => {
                self.abort();
                return Err(e.into());
            }
        };
        info!(
            file = %file.file_name,
            bytes = file.bytes.len(),
            "transfer finalized"
        );
        if let Err(e) = self.sink.deliver(file) {
            self.abort();
            return Err(e.into());
        }
        self.channel.close();
        self.state = ReceiverState::Finalized;
        Ok(())
    }

    fn emit(&mut self, kind: Kind, body: String) -> Result<(), SessionError> {
        let envelope = Envelope::new(kind, body, self.next_nonce);
        self.next_nonce += 1;
        if let Err(e) = self.channel.display(&envelope) {
            self.abort();
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

    /// Teardown shared by cancel and every fatal path: release the channel
    /// and drop partial state.
    fn abort(&mut self) {
        self.channel.close();
        self.assembler = None;
        self.last_seen = None;
        self.state = ReceiverState::Idle;
    }
}
