//! The contract with the adaptor service.
//!
//! The HTTP client lives outside this crate. It only has to move bytes
//! ([BytesTransport]); [CborJsonLayer] turns that into the typed
//! [AdaptorTransport] the consumer works with.

mod info;

use core::fmt::Debug;

pub use info::{AdaptorInfo, InfoError};

use crate::{
    cbor,
    channel::{Squash, SquashResponse},
    types::{KeyTag, KEY_TAG_HEADER},
};
use thiserror::Error;

pub const INFO_PATH: &str = "/info";
pub const SQUASH_PATH: &str = "/ch/squash";

#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failure or non-success status, reported by the HTTP client.
    #[error("request to {path} failed: {reason}")]
    Request { path: &'static str, reason: String },
    #[error("could not encode request: {0}")]
    Encoding(#[from] cbor::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Raw access to the adaptor's HTTP endpoints.
pub trait BytesTransport: Debug {
    fn get(&self, path: &'static str) -> Result<Vec<u8>, TransportError>;

    /// POST `body` with the header `header.0: header.1`.
    fn post(
        &self,
        path: &'static str,
        header: (&str, &str),
        body: &[u8],
    ) -> Result<Vec<u8>, TransportError>;
}

/// Typed access to the adaptor.
pub trait AdaptorTransport: Debug {
    fn info(&self) -> Result<AdaptorInfo, TransportError>;
    fn post_squash(
        &self,
        key_tag: &KeyTag,
        squash: &Squash,
    ) -> Result<SquashResponse, TransportError>;
}

/// Requests are sent as CBOR, responses arrive as JSON.
#[derive(Debug)]
pub struct CborJsonLayer<T: BytesTransport> {
    pub transport: T,
}

impl<T: BytesTransport> AdaptorTransport for CborJsonLayer<T> {
    fn info(&self) -> Result<AdaptorInfo, TransportError> {
        let bytes = self.transport.get(INFO_PATH)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn post_squash(
        &self,
        key_tag: &KeyTag,
        squash: &Squash,
    ) -> Result<SquashResponse, TransportError> {
        let body = cbor::to_vec(squash)?;
        let header = key_tag.to_header_value();
        log::trace!("wire: posting {} byte squash", body.len());
        let bytes = self
            .transport
            .post(SQUASH_PATH, (KEY_TAG_HEADER, header.as_str()), &body)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
