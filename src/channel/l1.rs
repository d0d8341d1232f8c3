//! Local ledger of the on-chain transactions of one channel.
//!
//! The ledger is append-only: intermediate transactions are pushed and the
//! close transaction is set once. Only the submission state of an entry
//! (hash, block) and the adaptor approval of an add can change afterwards.

use crate::types::{ChannelTag, Lovelace, PosixMillis, TxHash, VerificationKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Block depth after which a transaction is considered safe from rollbacks.
pub const DEFAULT_VOLATILITY_THRESHOLD: u64 = 2160;

/// Submission state shared by every ledger entry.
///
/// `tx_hash` is set once the transaction was submitted, `tx_block_no` once it
/// has been seen in a block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TxInfo {
    pub tx_hash: Option<TxHash>,
    #[serde(default, with = "opt_hex")]
    pub tx_cbor: Option<Vec<u8>>,
    pub tx_block_no: Option<u64>,
}

impl TxInfo {
    pub fn is_submitted(&self) -> bool {
        self.tx_hash.is_some()
    }

    pub fn is_indexed(&self) -> bool {
        self.tx_block_no.is_some()
    }
}

mod opt_hex {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| hex::decode(s).map_err(de::Error::custom))
            .transpose()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenTx {
    pub tag: ChannelTag,
    pub consumer_key: VerificationKey,
    pub adaptor_key: VerificationKey,
    pub close_period: PosixMillis,
    pub amount: Lovelace,
    #[serde(flatten)]
    pub tx: TxInfo,
}

/// Funds added by the consumer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AddTx {
    pub amount: Lovelace,
    /// Whether the adaptor has acknowledged the deposit. Unapproved funds are
    /// on-chain but may not be spent yet.
    pub adaptor_approved: bool,
    pub submitted_at: Option<PosixMillis>,
    #[serde(flatten)]
    pub tx: TxInfo,
}

/// Funds leaving the channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubTx {
    pub amount: Lovelace,
    pub block_slot_time: PosixMillis,
    #[serde(flatten)]
    pub tx: TxInfo,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseTx {
    #[serde(flatten)]
    pub tx: TxInfo,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IntermediateTx {
    Add(AddTx),
    Sub(SubTx),
}

impl IntermediateTx {
    fn info_mut(&mut self) -> &mut TxInfo {
        match self {
            IntermediateTx::Add(tx) => &mut tx.tx,
            IntermediateTx::Sub(tx) => &mut tx.tx,
        }
    }
}

/// Position of an entry in the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TxSlot {
    Open,
    Intermediate(usize),
    Close,
}

/// Borrowed view of any ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum L1Tx<'a> {
    Open(&'a OpenTx),
    Add(&'a AddTx),
    Sub(&'a SubTx),
    Close(&'a CloseTx),
}

impl<'a> L1Tx<'a> {
    pub fn info(&self) -> &'a TxInfo {
        match *self {
            L1Tx::Open(tx) => &tx.tx,
            L1Tx::Add(tx) => &tx.tx,
            L1Tx::Sub(tx) => &tx.tx,
            L1Tx::Close(tx) => &tx.tx,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum L1Error {
    #[error("channel is closed")]
    ChannelClosed,
    #[error("channel has already been closed")]
    AlreadyClosed,
    #[error("no transaction at {0:?}")]
    NoSuchTx(TxSlot),
    #[error("intermediate transaction {0} is not an add")]
    NotAnAddTx(usize),
    #[error("transaction at {0:?} has already been submitted")]
    AlreadySubmitted(TxSlot),
    #[error("transaction at {0:?} has not been submitted")]
    NotSubmitted(TxSlot),
}

fn default_volatility_threshold() -> u64 {
    DEFAULT_VOLATILITY_THRESHOLD
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct L1Channel {
    open_tx: OpenTx,
    intermediate_txs: Vec<IntermediateTx>,
    close_tx: Option<CloseTx>,
    // Persisted key keeps the historical spelling.
    #[serde(rename = "volatility_treshold", default = "default_volatility_threshold")]
    volatility_threshold: u64,
}

impl L1Channel {
    pub fn new(open_tx: OpenTx) -> Self {
        log::debug!("l1: new channel {:?} with {}", open_tx.tag, open_tx.amount);
        L1Channel {
            open_tx,
            intermediate_txs: Vec::new(),
            close_tx: None,
            volatility_threshold: DEFAULT_VOLATILITY_THRESHOLD,
        }
    }

    pub fn with_volatility_threshold(mut self, blocks: u64) -> Self {
        self.volatility_threshold = blocks;
        self
    }

    pub fn volatility_threshold(&self) -> u64 {
        self.volatility_threshold
    }

    pub fn tag(&self) -> &ChannelTag {
        &self.open_tx.tag
    }

    pub fn open_tx(&self) -> &OpenTx {
        &self.open_tx
    }

    /// Snapshot of the intermediate transactions.
    pub fn intermediate_txs(&self) -> Vec<IntermediateTx> {
        self.intermediate_txs.clone()
    }

    pub fn close_tx(&self) -> Option<&CloseTx> {
        self.close_tx.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.close_tx.is_some()
    }

    pub fn push_add(&mut self, tx: AddTx) -> Result<usize, L1Error> {
        self.push(IntermediateTx::Add(tx))
    }

    pub fn push_sub(&mut self, tx: SubTx) -> Result<usize, L1Error> {
        self.push(IntermediateTx::Sub(tx))
    }

    fn push(&mut self, tx: IntermediateTx) -> Result<usize, L1Error> {
        if self.is_closed() {
            return Err(L1Error::ChannelClosed);
        }
        log::debug!("l1: {:?} appended {:?}", self.open_tx.tag, tx);
        self.intermediate_txs.push(tx);
        Ok(self.intermediate_txs.len() - 1)
    }

    pub fn close(&mut self, tx: CloseTx) -> Result<(), L1Error> {
        if self.is_closed() {
            return Err(L1Error::AlreadyClosed);
        }
        log::debug!("l1: {:?} closed", self.open_tx.tag);
        self.close_tx = Some(tx);
        Ok(())
    }

    /// Record that the adaptor acknowledged the add at `position`.
    pub fn approve_add(&mut self, position: usize) -> Result<(), L1Error> {
        match self.intermediate_txs.get_mut(position) {
            Some(IntermediateTx::Add(tx)) => {
                tx.adaptor_approved = true;
                Ok(())
            }
            Some(IntermediateTx::Sub(_)) => Err(L1Error::NotAnAddTx(position)),
            None => Err(L1Error::NoSuchTx(TxSlot::Intermediate(position))),
        }
    }

    fn info_mut(&mut self, slot: TxSlot) -> Result<&mut TxInfo, L1Error> {
        let info = match slot {
            TxSlot::Open => Some(&mut self.open_tx.tx),
            TxSlot::Intermediate(i) => self.intermediate_txs.get_mut(i).map(|tx| tx.info_mut()),
            TxSlot::Close => self.close_tx.as_mut().map(|tx| &mut tx.tx),
        };
        info.ok_or(L1Error::NoSuchTx(slot))
    }

    pub fn mark_submitted(&mut self, slot: TxSlot, hash: TxHash) -> Result<(), L1Error> {
        let info = self.info_mut(slot)?;
        if info.is_submitted() {
            return Err(L1Error::AlreadySubmitted(slot));
        }
        info.tx_hash = Some(hash);
        log::debug!("l1: {:?} submitted as {:?}", slot, hash);
        Ok(())
    }

    /// Record the block the transaction was seen in. Called again with a new
    /// block number after a rollback.
    pub fn mark_indexed(&mut self, slot: TxSlot, block_no: u64) -> Result<(), L1Error> {
        let info = self.info_mut(slot)?;
        if !info.is_submitted() {
            return Err(L1Error::NotSubmitted(slot));
        }
        info.tx_block_no = Some(block_no);
        log::debug!("l1: {:?} indexed in block {}", slot, block_no);
        Ok(())
    }

    /// All entries in creation order: open, intermediates, close.
    pub fn txs(&self) -> Vec<(TxSlot, L1Tx<'_>)> {
        let intermediates = self
            .intermediate_txs
            .iter()
            .enumerate()
            .map(|(i, tx)| {
                let view = match tx {
                    IntermediateTx::Add(tx) => L1Tx::Add(tx),
                    IntermediateTx::Sub(tx) => L1Tx::Sub(tx),
                };
                (TxSlot::Intermediate(i), view)
            });

        core::iter::once((TxSlot::Open, L1Tx::Open(&self.open_tx)))
            .chain(intermediates)
            .chain(self.close_tx.iter().map(|tx| (TxSlot::Close, L1Tx::Close(tx))))
            .collect()
    }

    pub fn unsubmitted_txs(&self) -> Vec<(TxSlot, L1Tx<'_>)> {
        self.txs()
            .into_iter()
            .filter(|(_, tx)| !tx.info().is_submitted())
            .collect()
    }

    pub fn submitted_but_unindexed(&self) -> Vec<(TxSlot, L1Tx<'_>)> {
        self.txs()
            .into_iter()
            .filter(|(_, tx)| tx.info().is_submitted() && !tx.info().is_indexed())
            .collect()
    }

    /// Funds deposited into the channel: the open amount plus every add
    /// (only adaptor approved ones if `adaptor_approved_only`).
    ///
    /// Subs are not deducted.
    ///
    /// # Panics
    ///
    /// If the total exceeds the lovelace supply, which means the ledger is
    /// corrupted.
    pub fn total_channel_funds(&self, adaptor_approved_only: bool) -> Lovelace {
        self.intermediate_txs
            .iter()
            .fold(self.open_tx.amount, |total, tx| match tx {
                IntermediateTx::Add(add) if add.adaptor_approved || !adaptor_approved_only => total
                    .checked_add(add.amount)
                    .expect("ledger corrupted: channel funds exceed the lovelace supply"),
                // TODO: deduct subs once redemptions are reported back to the ledger.
                _ => total,
            })
    }
}
