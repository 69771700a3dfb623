use std::io::{Read, Seek, SeekFrom};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use capybeam_protocol::FileMeta;

use crate::TransferError;

// ---------------------------------------------------------------------------
// Digest and wire-form helpers
// ---------------------------------------------------------------------------

/// Computes the lowercase-hex SHA-256 of `text`.
///
/// The digest a peer reports for a chunk is taken over the Base64 wire form,
/// never the raw bytes. Comparison is exact string equality.
pub fn checksum_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Encodes raw chunk bytes into their wire form: standard-alphabet Base64,
/// padded, no line breaks.
pub fn encode_wire_form(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

/// Decodes a wire form back into raw chunk bytes.
pub fn decode_wire_form(text: &str) -> Result<Vec<u8>, TransferError> {
    Ok(STANDARD.decode(text.as_bytes())?)
}

// ---------------------------------------------------------------------------
// ChunkSource
// ---------------------------------------------------------------------------

/// One produced chunk, ready to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedChunk {
    /// 1-based chunk index.
    pub index: u64,
    /// Base64 text of the chunk's raw bytes.
    pub wire_form: String,
    /// Lowercase-hex SHA-256 of `wire_form`.
    pub digest: String,
}

/// Reads a source stream in fixed-size chunks addressed by 1-based index.
///
/// Stateless modulo the stream: producing the same index twice returns
/// byte-identical results, which is what makes retransmits safe.
pub struct ChunkSource<R: Read + Seek> {
    reader: R,
    file_size: u64,
    chunk_size: u64,
    chunk_count: u64,
}

impl<R: Read + Seek> ChunkSource<R> {
    pub fn new(reader: R, meta: &FileMeta) -> Self {
        Self {
            reader,
            file_size: meta.file_size,
            chunk_size: meta.chunk_size,
            chunk_count: meta.chunk_count,
        }
    }

    /// Adopts a rewritten chunk geometry. Only meaningful before the first
    /// chunk is produced; the session layer freezes it once a transfer starts.
    pub fn reconfigure(&mut self, meta: &FileMeta) {
        self.file_size = meta.file_size;
        self.chunk_size = meta.chunk_size;
        self.chunk_count = meta.chunk_count;
    }

    /// Produces the `index`-th chunk (1-based).
    ///
    /// The final chunk may be short; every other chunk is exactly the
    /// configured chunk size.
    pub fn produce(&mut self, index: u64) -> Result<ProducedChunk, TransferError> {
        if index == 0 || index > self.chunk_count {
            return Err(TransferError::ChunkOutOfRange {
                index,
                count: self.chunk_count,
            });
        }
        let start = (index - 1) * self.chunk_size;
        let len = self.chunk_size.min(self.file_size - start) as usize;

        let mut raw = vec![0u8; len];
        self.reader.seek(SeekFrom::Start(start))?;
        self.reader.read_exact(&mut raw)?;

        let wire_form = encode_wire_form(&raw);
        let digest = checksum_text(&wire_form);
        Ok(ProducedChunk {
            index,
            wire_form,
            digest,
        })
    }
}
