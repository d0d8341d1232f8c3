//! Handles the creation and verification of Ed25519 signatures.
//!
//! Everything signed in a channel is prefixed with the [ChannelTag], so a
//! signature produced for one channel never verifies in another one.

use crate::types::ChannelTag;

mod ed25519;
pub use self::ed25519::{verify, Signer};


/// Build the bytes covered by a channel signature: `tag || payload`.
pub(crate) fn tagged(tag: &ChannelTag, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(ChannelTag::LEN + payload.len());
    data.extend_from_slice(&tag.0);
    data.extend_from_slice(payload);
    data
}
