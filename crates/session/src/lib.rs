//! Peer state machines driving the visual stop-and-wait transfer.
//!
//! Each peer displays exactly one envelope at a time and updates it only in
//! response to a fresh observation from the other side. The sender advances
//! its cursor when the receiver's digest report matches; the receiver commits
//! a staged chunk when the sender moves on to the next one. A lost or garbled
//! frame costs nothing: the peer keeps redisplaying its current envelope
//! until the expected response appears.
//!
//! The QR encoder, camera capture, rendering surface and file persistence are
//! external collaborators injected through the [`VisualChannel`] and
//! [`FileSink`] seams.

mod channel;
mod driver;
mod progress;
mod receiver;
mod sender;

pub use channel::{ChannelError, FileSink, VisualChannel};
pub use driver::{ObservationSender, drive_receiver, drive_sender, observation_mailbox};
pub use progress::TransferProgress;
pub use receiver::{ReceiverSession, ReceiverState};
pub use sender::{COMPLETED_HOLD, SenderSession, SenderState};

use capybeam_protocol::MetaError;
use capybeam_transfer::TransferError;

/// Errors that tear a session down.
///
/// Recoverable situations — malformed frames, digest mismatches, frames that
/// have no transition from the current state — never surface here; they are
/// handled by retransmission or ignored. Anything that does surface has
/// already reset the session and released its channel.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("visual channel failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("invalid file metadata: {0}")]
    Meta(#[from] MetaError),

    #[error("file delivery failed: {0}")]
    Delivery(#[from] std::io::Error),

    #[error("chunk size is frozen once the transfer has started")]
    ChunkSizeFrozen,

    #[error("session already started")]
    NotIdle,
}
