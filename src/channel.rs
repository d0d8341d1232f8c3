//! Channel accounting: cheques, the squash that accumulates them, the
//! adaptor's counter-proposals and the on-chain ledger.
//!
//! Squashing and the ledger are independent. The ledger bounds how much may be
//! squashed ([L1Channel::total_channel_funds]) but is never changed by it.

mod cheque;
pub mod l1;
mod proposal;
mod squash;

pub use cheque::*;
pub use l1::L1Channel;
pub use proposal::*;
pub use squash::*;
