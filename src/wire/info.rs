//! Adaptor parameters published at `GET /info`.

use crate::{
    channel::l1::OpenTx,
    types::{ChannelTag, Lovelace, PosixMillis, ScriptHash, VerificationKey},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdaptorInfo {
    pub adaptor_key: VerificationKey,
    /// Minimum close period the adaptor accepts for new channels.
    pub close_period: PosixMillis,
    /// Flat fee charged per payment.
    pub fee: Lovelace,
    /// Longest channel tag (in bytes) the validator accepts.
    pub max_tag_length: usize,
    pub deployer_vkey: VerificationKey,
    pub script_hash: ScriptHash,
}

#[derive(Error, Debug)]
pub enum InfoError {
    #[error("channel tag of {len} bytes exceeds the adaptor limit of {max}")]
    TagTooLong { len: usize, max: usize },
    #[error("channel was opened with a different adaptor key")]
    AdaptorKeyMismatch,
    #[error("close period {actual:?} is shorter than the required {required:?}")]
    ClosePeriodTooShort {
        required: PosixMillis,
        actual: PosixMillis,
    },
    #[error("invalid adaptor info: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdaptorInfo {
    pub fn from_json(json: &str) -> Result<Self, InfoError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn check_tag(&self, tag: &ChannelTag) -> Result<(), InfoError> {
        let len = tag.as_bytes().len();
        if len > self.max_tag_length {
            return Err(InfoError::TagTooLong {
                len,
                max: self.max_tag_length,
            });
        }
        Ok(())
    }

    /// Whether the adaptor will serve a channel opened with `open`.
    pub fn check_open(&self, open: &OpenTx) -> Result<(), InfoError> {
        self.check_tag(&open.tag)?;
        if open.adaptor_key != self.adaptor_key {
            return Err(InfoError::AdaptorKeyMismatch);
        }
        if open.close_period < self.close_period {
            return Err(InfoError::ClosePeriodTooShort {
                required: self.close_period,
                actual: open.close_period,
            });
        }
        Ok(())
    }
}
