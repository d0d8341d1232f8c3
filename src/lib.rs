//! Accounting core of a Konduit payment channel.
//!
//! A consumer pays an adaptor with signed [channel::Cheque]s and periodically
//! folds every settled cheque into a single signed [channel::Squash], the
//! running total the adaptor can redeem on-chain. [channel::L1Channel] tracks
//! the on-chain transactions funding the channel.

pub mod cbor {
    mod de;
    mod error;
    mod ser;

    pub mod as_hex;

    pub use de::{from_slice, Deserializer};
    pub use error::{Error, Result};
    pub use ser::{to_vec, to_writer, Serializer, Writer};

    #[cfg(test)]
    pub(crate) mod tests;
}
pub mod sig;
pub mod types;

pub mod channel;
mod client;
pub mod wire;

pub use client::{Consumer, ConsumerError};
