//! Seams to the external display, capture and file-delivery collaborators.

use capybeam_protocol::Envelope;
use capybeam_transfer::DeliveredFile;

/// Errors surfaced by the visual channel collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The display or capture device cannot be used. Fatal: the session
    /// tears down and returns to idle.
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

/// The display half of the visual channel.
///
/// Rendering an envelope as a QR image, camera cadence and error-correction
/// levels are all the collaborator's concern. The session shows one envelope
/// at a time; repeated `display` calls with identical contents must render
/// the same image.
pub trait VisualChannel {
    /// Renders `envelope` as the currently displayed frame.
    fn display(&mut self, envelope: &Envelope) -> Result<(), ChannelError>;

    /// Releases display and capture resources.
    ///
    /// Invoked on every exit path — completion, cancel and fatal errors —
    /// and may therefore be called more than once.
    fn close(&mut self);
}

/// Destination for the reconstructed file. Persistence layout is the
/// collaborator's concern.
pub trait FileSink {
    fn deliver(&mut self, file: DeliveredFile) -> std::io::Result<()>;
}
