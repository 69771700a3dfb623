//! Chunk production and reassembly for the visual transfer channel.
//!
//! A file crosses the channel one chunk at a time. Each chunk travels as the
//! Base64 text of its raw bytes (its *wire form*) and is verified by the
//! lowercase-hex SHA-256 of that text. Hashing the encoded text rather than
//! the raw bytes is a wire contract shared with peers on other platforms;
//! both sides must hash the same material or every chunk would be rejected.

mod assembler;
mod chunker;

pub use assembler::{DeliveredFile, Reassembler};
pub use chunker::{ChunkSource, ProducedChunk, checksum_text, decode_wire_form, encode_wire_form};

/// Default chunk size: 256 bytes.
///
/// A frame has to stay comfortably inside QR capacity at moderate
/// error-correction levels, and Base64 expands the raw bytes by a third
/// before the envelope adds its own overhead.
pub const DEFAULT_CHUNK_SIZE: u64 = 256;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk {index} out of range (file has {count} chunks)")]
    ChunkOutOfRange { index: u64, count: u64 },

    #[error("invalid wire form: {0}")]
    InvalidWireForm(#[from] base64::DecodeError),

    #[error("reassembly would exceed the advertised file size of {file_size} bytes")]
    Overflow { file_size: u64 },

    #[error("reassembled file is incomplete: expected {expected} bytes, got {got}")]
    Incomplete { expected: u64, got: u64 },

    #[error("session is closed")]
    SessionClosed,
}
