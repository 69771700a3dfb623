//! Cooperative driving of a session from a stream of observations.
//!
//! All transitions run on one task: an observation is drained to completion
//! before the next one is taken, and a one-slot mailbox with overwrite
//! semantics absorbs frames decoded while the session is busy. Losing an
//! observation costs nothing — the peer keeps redisplaying its envelope
//! until it sees the expected response.

use std::io::{Read, Seek};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use capybeam_protocol::Envelope;

use crate::channel::{FileSink, VisualChannel};
use crate::receiver::{ReceiverSession, ReceiverState};
use crate::sender::{SenderSession, SenderState, COMPLETED_HOLD};
use crate::SessionError;

/// Producer half of the observation mailbox. Handed to the capture
/// collaborator, which publishes every envelope it decodes — repeat
/// sightings included.
#[derive(Clone)]
pub struct ObservationSender {
    tx: watch::Sender<Option<Envelope>>,
}

impl ObservationSender {
    /// Publishes a freshly decoded envelope, replacing any unprocessed one.
    pub fn publish(&self, envelope: Envelope) {
        let _ = self.tx.send(Some(envelope));
    }
}

/// Creates the one-slot observation mailbox connecting the capture
/// collaborator to a drive loop.
pub fn observation_mailbox() -> (ObservationSender, watch::Receiver<Option<Envelope>>) {
    let (tx, rx) = watch::channel(None);
    (ObservationSender { tx }, rx)
}

/// Drives a sender session until the transfer completes or is cancelled.
///
/// After the terminal frame goes up, the loop keeps it on display for
/// [`COMPLETED_HOLD`] before releasing the channel. Cancellation stops the
/// session immediately; results of any in-flight observation are discarded
/// with it.
pub async fn drive_sender<R, C>(
    session: &mut SenderSession<R, C>,
    mut observations: watch::Receiver<Option<Envelope>>,
    cancel: CancellationToken,
) -> Result<(), SessionError>
where
    R: Read + Seek,
    C: VisualChannel,
{
    session.start()?;
    loop {
        if session.state() == SenderState::Finalizing {
            tokio::select! {
                _ = cancel.cancelled() => {
                    session.stop();
                }
                _ = tokio::time::sleep(COMPLETED_HOLD) => {
                    session.finish();
                }
            }
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                session.stop();
                return Ok(());
            }
            changed = observations.changed() => {
                if changed.is_err() {
                    debug!("capture side dropped, stopping");
                    session.stop();
                    return Ok(());
                }
                let observation = observations.borrow_and_update().clone();
                if let Some(observation) = observation {
                    session.observe(&observation)?;
                }
            }
        }
    }
}

/// Drives a receiver session until the file is delivered or the transfer is
/// cancelled.
pub async fn drive_receiver<C, S>(
    session: &mut ReceiverSession<C, S>,
    mut observations: watch::Receiver<Option<Envelope>>,
    cancel: CancellationToken,
) -> Result<(), SessionError>
where
    C: VisualChannel,
    S: FileSink,
{
    session.start()?;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                session.cancel();
                return Ok(());
            }
            changed = observations.changed() => {
                if changed.is_err() {
                    debug!("capture side dropped, cancelling");
                    session.cancel();
                    return Ok(());
                }
                let observation = observations.borrow_and_update().clone();
                if let Some(observation) = observation {
                    session.observe(&observation)?;
                }
                if session.state() == ReceiverState::Finalized {
                    return Ok(());
                }
            }
        }
    }
}
