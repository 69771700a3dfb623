use capybeam_protocol::FileMeta;

use crate::chunker::{checksum_text, decode_wire_form};
use crate::TransferError;

/// The reconstructed file, ready to hand to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredFile {
    pub file_name: String,
    pub file_type: String,
    pub bytes: Vec<u8>,
}

/// The single staged chunk awaiting the sender's verdict on its digest.
#[derive(Debug)]
struct PendingChunk {
    wire_form: String,
    raw: Vec<u8>,
}

/// Collects committed chunks in order and stages the most recent observation
/// in a single pending slot until the sender confirms its digest.
///
/// The committed buffer is always a gapless prefix of the file: a chunk moves
/// from pending to committed only when the sender positively acknowledges its
/// digest by advancing to the next chunk or to the terminal frame.
pub struct Reassembler {
    meta: FileMeta,
    committed: Vec<Vec<u8>>,
    committed_count: u64,
    committed_bytes: u64,
    pending: Option<PendingChunk>,
    closed: bool,
}

impl Reassembler {
    pub fn new(meta: FileMeta) -> Self {
        Self {
            meta,
            committed: Vec::new(),
            committed_count: 0,
            committed_bytes: 0,
            pending: None,
            closed: false,
        }
    }

    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    /// Stages a newly observed wire form, replacing any previous pending
    /// chunk, and returns the digest to report back to the sender.
    pub fn set_pending(&mut self, wire_form: &str) -> Result<String, TransferError> {
        self.ensure_open()?;
        let raw = decode_wire_form(wire_form)?;
        self.pending = Some(PendingChunk {
            wire_form: wire_form.to_owned(),
            raw,
        });
        Ok(checksum_text(wire_form))
    }

    /// Discards the pending chunk. The sender rejected its digest and is
    /// retransmitting.
    pub fn drop_pending(&mut self) -> Result<(), TransferError> {
        self.ensure_open()?;
        self.pending = None;
        Ok(())
    }

    /// Appends the pending chunk to the committed buffer. A no-op when
    /// nothing is pending.
    pub fn commit_pending(&mut self) -> Result<(), TransferError> {
        self.ensure_open()?;
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        if self.committed_count >= self.meta.chunk_count
            || self.committed_bytes + pending.raw.len() as u64 > self.meta.file_size
        {
            return Err(TransferError::Overflow {
                file_size: self.meta.file_size,
            });
        }
        self.committed_count += 1;
        self.committed_bytes += pending.raw.len() as u64;
        self.committed.push(pending.raw);
        Ok(())
    }

    /// Concatenates the committed chunks into the finished file.
    ///
    /// The reassembler is closed afterwards; every further operation fails
    /// with [`TransferError::SessionClosed`].
    pub fn finalize(&mut self) -> Result<DeliveredFile, TransferError> {
        self.ensure_open()?;
        if self.committed_bytes != self.meta.file_size {
            return Err(TransferError::Incomplete {
                expected: self.meta.file_size,
                got: self.committed_bytes,
            });
        }
        self.closed = true;
        self.pending = None;

        let mut bytes = Vec::with_capacity(self.meta.file_size as usize);
        for chunk in self.committed.drain(..) {
            bytes.extend_from_slice(&chunk);
        }
        Ok(DeliveredFile {
            file_name: self.meta.file_name.clone(),
            file_type: self.meta.file_type.clone(),
            bytes,
        })
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Wire form of the staged chunk, if any.
    pub fn pending_wire_form(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.wire_form.as_str())
    }

    pub fn committed_chunks(&self) -> u64 {
        self.committed_count
    }

    pub fn committed_bytes(&self) -> u64 {
        self.committed_bytes
    }

    fn ensure_open(&self) -> Result<(), TransferError> {
        if self.closed {
            Err(TransferError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::encode_wire_form;

    fn assembler(file_size: u64, chunk_size: u64) -> Reassembler {
        Reassembler::new(FileMeta::new("test.bin", None, file_size, chunk_size).unwrap())
    }

    #[test]
    fn stage_then_commit() {
        let mut asm = assembler(8, 4);
        let digest = asm.set_pending("AAECAw==").unwrap();
        assert_eq!(digest, checksum_text("AAECAw=="));
        assert!(asm.has_pending());
        assert_eq!(asm.pending_wire_form(), Some("AAECAw=="));

        asm.commit_pending().unwrap();
        assert!(!asm.has_pending());
        assert_eq!(asm.committed_chunks(), 1);
        assert_eq!(asm.committed_bytes(), 4);
    }

    #[test]
    fn pending_slot_is_overwritten_not_queued() {
        let mut asm = assembler(8, 4);
        asm.set_pending("AAECAw==").unwrap();
        asm.set_pending("BAUGBw==").unwrap();
        assert_eq!(asm.pending_wire_form(), Some("BAUGBw=="));

        asm.commit_pending().unwrap();
        assert_eq!(asm.committed_chunks(), 1);
    }

    #[test]
    fn drop_pending_clears_the_slot() {
        let mut asm = assembler(8, 4);
        asm.set_pending("AAECAw==").unwrap();
        asm.drop_pending().unwrap();
        assert!(!asm.has_pending());

        asm.commit_pending().unwrap();
        assert_eq!(asm.committed_chunks(), 0);
    }

    #[test]
    fn set_pending_rejects_invalid_base64() {
        let mut asm = assembler(8, 4);
        assert!(matches!(
            asm.set_pending("!!!"),
            Err(TransferError::InvalidWireForm(_))
        ));
        assert!(!asm.has_pending());
    }

    #[test]
    fn finalize_rebuilds_the_file() {
        let mut asm = assembler(8, 4);
        asm.set_pending("AAECAw==").unwrap();
        asm.commit_pending().unwrap();
        asm.set_pending("BAUGBw==").unwrap();
        asm.commit_pending().unwrap();

        let file = asm.finalize().unwrap();
        assert_eq!(file.file_name, "test.bin");
        assert_eq!(file.bytes, (0u8..8).collect::<Vec<_>>());
    }

    #[test]
    fn finalize_empty_file() {
        let mut asm = assembler(0, 256);
        let file = asm.finalize().unwrap();
        assert!(file.bytes.is_empty());
    }

    #[test]
    fn finalize_rejects_missing_bytes() {
        let mut asm = assembler(8, 4);
        asm.set_pending("AAECAw==").unwrap();
        asm.commit_pending().unwrap();
        assert!(matches!(
            asm.finalize(),
            Err(TransferError::Incomplete {
                expected: 8,
                got: 4
            })
        ));
    }

    #[test]
    fn commit_beyond_chunk_count_overflows() {
        let mut asm = assembler(4, 4);
        asm.set_pending("AAECAw==").unwrap();
        asm.commit_pending().unwrap();
        asm.set_pending("AAECAw==").unwrap();
        assert!(matches!(
            asm.commit_pending(),
            Err(TransferError::Overflow { file_size: 4 })
        ));
    }

    #[test]
    fn commit_beyond_file_size_overflows() {
        let mut asm = assembler(6, 4);
        let oversized = encode_wire_form(&[0u8; 4]);
        asm.set_pending(&oversized).unwrap();
        asm.commit_pending().unwrap();
        asm.set_pending(&oversized).unwrap();
        assert!(matches!(
            asm.commit_pending(),
            Err(TransferError::Overflow { file_size: 6 })
        ));
    }

    #[test]
    fn operations_fail_after_finalize() {
        let mut asm = assembler(0, 256);
        asm.finalize().unwrap();

        assert!(matches!(
            asm.set_pending("AAECAw=="),
            Err(TransferError::SessionClosed)
        ));
        assert!(matches!(
            asm.commit_pending(),
            Err(TransferError::SessionClosed)
        ));
        assert!(matches!(
            asm.drop_pending(),
            Err(TransferError::SessionClosed)
        ));
        assert!(matches!(asm.finalize(), Err(TransferError::SessionClosed)));
    }

    #[test]
    fn counters_survive_finalize() {
        let mut asm = assembler(4, 4);
        asm.set_pending("AAECAw==").unwrap();
        asm.commit_pending().unwrap();
        asm.finalize().unwrap();
        assert_eq!(asm.committed_chunks(), 1);
        assert_eq!(asm.committed_bytes(), 4);
    }
}
