//! Error type and Return values used by the CBOR codec.

use core::fmt::Display;

use serde::{de, ser};
use thiserror::Error;

/// Represents all possible errors that can happen during encoding or
/// decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The value contains a type that has no representation in the CBOR
    /// subset used for signing.
    ///
    /// For example floating point numbers, maps and enums. Signed payloads
    /// must have exactly one encoding, so we refuse anything the on-chain
    /// validator cannot reproduce instead of picking a representation for it.
    #[error("type is not representable in cbor encoding: {0}")]
    TypeNotRepresentable(&'static str),
    /// A sequence did not report its length up front.
    #[error("sequence length must be known before encoding")]
    UnknownLength,
    /// The input ended in the middle of an item.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// An array holds more elements than the type being decoded.
    #[error("array has more elements than expected")]
    TrailingElements,
    /// The input contains more bytes after the top-level item.
    #[error("{0} trailing bytes after the encoded value")]
    TrailingBytes(usize),
    /// The initial byte of an item is outside the supported subset.
    #[error("unsupported cbor header byte 0x{0:02x}")]
    UnsupportedHeader(u8),
    /// A length or bignum does not fit the platform integer types.
    #[error("integer out of range")]
    IntegerOverflow,
    /// A text string is not valid UTF-8.
    #[error("text string is not valid utf-8")]
    InvalidUtf8,
    /// Raised by `Serialize`/`Deserialize` implementations, e.g. when a
    /// decoded value violates a type invariant.
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Custom(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Custom(msg.to_string())
    }
}

/// Alias for `Result` using the [Error] returned by the codec.
pub type Result<T> = core::result::Result<T, Error>;
