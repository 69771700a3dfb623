use serde::{Deserialize, Serialize};

/// Frame kind, one tag per protocol message.
///
/// The numeric ids are the wire contract; peers on other platforms hard-code
/// them, so they never change and there is no version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Sender advertises the file metadata record.
    MetaInfo,
    /// Receiver acknowledges the metadata; the sender may start transmitting.
    MetaInfoReceived,
    /// Sender puts the next chunk's wire form on display.
    OkNext,
    /// Receiver reports the digest of the chunk it just staged.
    EvalSha256,
    /// Sender rejects the reported digest and retransmits the same wire form.
    InvalidSha256,
    /// Sender signals that every chunk has been acknowledged.
    Completed,
    /// Decode fallback for malformed or unrecognized frames. Never emitted.
    Unknown,
}

impl Kind {
    /// Numeric tag used on the wire.
    pub const fn id(self) -> u32 {
        match self {
            Kind::MetaInfo => 0,
            Kind::MetaInfoReceived => 1,
            Kind::OkNext => 2,
            Kind::EvalSha256 => 3,
            Kind::InvalidSha256 => 4,
            Kind::Completed => 50,
            Kind::Unknown => 100,
        }
    }

    /// Maps a wire tag back to a kind. Anything unrecognized is [`Kind::Unknown`].
    pub const fn from_id(id: u32) -> Self {
        match id {
            0 => Kind::MetaInfo,
            1 => Kind::MetaInfoReceived,
            2 => Kind::OkNext,
            3 => Kind::EvalSha256,
            4 => Kind::InvalidSha256,
            50 => Kind::Completed,
            _ => Kind::Unknown,
        }
    }
}

/// One protocol message: the full content of one displayed QR frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: Kind,
    /// Per-kind payload; empty for acknowledgment and terminal frames.
    pub body: String,
    /// Strictly monotonic per emitter. The observer remembers the last nonce
    /// it acted on and drops repeat sightings of an unchanged image.
    pub nonce: u64,
}

/// Wire shape of an envelope. Kept separate so [`Envelope`] can hold a typed
/// [`Kind`] while the JSON carries the raw tag.
#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    kind_id: u32,
    body: String,
    nonce: u64,
}

impl Envelope {
    /// Creates an envelope, trimming surrounding whitespace off `body`.
    pub fn new(kind: Kind, body: impl Into<String>, nonce: u64) -> Self {
        let body = body.into();
        let trimmed = body.trim();
        let body = if trimmed.len() == body.len() {
            body
        } else {
            trimmed.to_owned()
        };
        Self { kind, body, nonce }
    }

    /// The frame every undecodable payload collapses to.
    pub fn unknown() -> Self {
        Self {
            kind: Kind::Unknown,
            body: String::new(),
            nonce: 0,
        }
    }

    /// Serializes the envelope to the compact JSON string the QR layer turns
    /// into an image.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&WireEnvelope {
            kind_id: self.kind.id(),
            body: self.body.trim().to_owned(),
            nonce: self.nonce,
        })
    }

    /// Parses a scanned payload.
    ///
    /// Decoding is total: unparseable text, a missing field, or an unknown
    /// `kind_id` all produce a [`Kind::Unknown`] envelope, which both state
    /// machines silently ignore.
    pub fn decode(payload: &str) -> Envelope {
        match serde_json::from_str::<WireEnvelope>(payload) {
            Ok(wire) => Envelope::new(Kind::from_id(wire.kind_id), wire.body, wire.nonce),
            Err(_) => Envelope::unknown(),
        }
    }
}
