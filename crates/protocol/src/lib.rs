//! Wire protocol for the capybeam visual file transfer.
//!
//! Two devices that share no network link exchange protocol frames by
//! rendering them as QR images and scanning each other's screens. Every
//! displayed image carries exactly one [`Envelope`]; the first frame of a
//! session carries a [`FileMeta`] record describing the file about to cross
//! the channel.
//!
//! The QR encoder/decoder, camera capture and rendering all live outside this
//! workspace — this crate only defines what the text inside the image looks
//! like.

pub mod envelope;
pub mod meta;

pub use envelope::{Envelope, Kind};
pub use meta::{DEFAULT_FILE_TYPE, FileMeta, MetaError};
