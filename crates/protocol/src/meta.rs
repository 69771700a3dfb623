use serde::{Deserialize, Serialize};

/// MIME type advertised when the host cannot determine one.
pub const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// Immutable description of the file crossing the channel.
///
/// Created by the sender when a file is selected and transmitted once as the
/// body of the `MetaInfo` frame. The JSON key names are the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub file_name: String,
    pub file_type: String,
    /// Total file size in bytes.
    pub file_size: u64,
    /// Number of chunks: `file_size / chunk_size`, rounded up.
    #[serde(rename = "fileChunks")]
    pub chunk_count: u64,
    /// Chunk size in bytes, at least 1.
    pub chunk_size: u64,
}

impl FileMeta {
    /// Builds a metadata record, deriving `chunk_count` by ceiling division.
    ///
    /// A missing `file_type` falls back to [`DEFAULT_FILE_TYPE`].
    pub fn new(
        file_name: impl Into<String>,
        file_type: Option<String>,
        file_size: u64,
        chunk_size: u64,
    ) -> Result<Self, MetaError> {
        let meta = Self {
            file_name: file_name.into(),
            file_type: file_type.unwrap_or_else(|| DEFAULT_FILE_TYPE.to_owned()),
            file_size,
            chunk_count: if chunk_size == 0 {
                0
            } else {
                file_size.div_ceil(chunk_size)
            },
            chunk_size,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Checks an advertised record before a session is created around it.
    pub fn validate(&self) -> Result<(), MetaError> {
        if self.file_name.is_empty() {
            return Err(MetaError::EmptyFileName);
        }
        if self.chunk_size == 0 {
            return Err(MetaError::ZeroChunkSize);
        }
        let expected = self.file_size.div_ceil(self.chunk_size);
        if self.chunk_count != expected {
            return Err(MetaError::ChunkCountMismatch {
                expected,
                got: self.chunk_count,
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses and validates a record received from the channel.
    pub fn from_json(payload: &str) -> Result<Self, MetaError> {
        let meta: FileMeta = serde_json::from_str(payload)?;
        meta.validate()?;
        Ok(meta)
    }
}

/// Reasons a metadata record is rejected.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("file name must not be empty")]
    EmptyFileName,

    #[error("chunk size must be at least 1 byte")]
    ZeroChunkSize,

    #[error("chunk count mismatch: expected {expected}, got {got}")]
    ChunkCountMismatch { expected: u64, got: u64 },

    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),
}
