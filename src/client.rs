use crate::channel::{
    squash_cheque, Cheque, ChequeBody, L1Channel, ProposalError, Squash, SquashBody, SquashError,
    SquashResponse, UnlockError, UnlockedCheque,
};
use crate::sig::Signer;
use crate::types::{ChannelTag, Index, KeyTag, Lock, Lovelace, PosixMillis, VerificationKey};
use crate::wire::{AdaptorTransport, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("signer does not match the consumer key of the channel")]
    KeyMismatch,
    #[error("channel is closed")]
    ChannelClosed,
    #[error("cannot pay {requested}, only {available} available")]
    InsufficientFunds {
        requested: Lovelace,
        available: Lovelace,
    },
    #[error("saved squash does not carry a valid consumer signature")]
    InvalidSquashSignature,
    #[error("no cheque index left after {0}")]
    IndexExhausted(Index),
    #[error("proposal would drop cheques already covered by our squash")]
    StaleProposal,
    #[error(transparent)]
    Unlock(#[from] UnlockError),
    #[error(transparent)]
    Squash(#[from] SquashError),
    #[error(transparent)]
    Proposal(#[from] ProposalError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The consumer side of one channel.
///
/// Issues cheques against the channel funds and keeps a signed squash of
/// every cheque the adaptor has unlocked. All state changes go through
/// `&mut self`, so cheque emission is serialized per channel.
#[derive(Debug)]
pub struct Consumer {
    signer: Signer,
    l1: L1Channel,
    squash: Squash,
    /// Issued cheques the squash does not cover yet.
    pending: Vec<ChequeBody>,
    last_index: Index,
}

impl Consumer {
    /// Start a consumer on a freshly opened channel.
    pub fn new(signer: Signer, l1: L1Channel) -> Result<Self, ConsumerError> {
        let squash = Squash::from_body_signing(&signer, l1.tag(), SquashBody::empty());
        Self::resume(signer, l1, squash, Vec::new())
    }

    /// Rebuild a consumer from saved state: the last squash we signed and the
    /// cheques issued since.
    ///
    /// Numbering continues after the highest index in either, so an index is
    /// never signed twice.
    pub fn resume(
        signer: Signer,
        l1: L1Channel,
        squash: Squash,
        mut pending: Vec<ChequeBody>,
    ) -> Result<Self, ConsumerError> {
        let key = signer.verification_key();
        if key != l1.open_tx().consumer_key {
            return Err(ConsumerError::KeyMismatch);
        }
        if !squash.verify(l1.tag(), &key) {
            return Err(ConsumerError::InvalidSquashSignature);
        }

        pending.retain(|c| !squash.body.covers(c.index));
        let last_index = pending
            .iter()
            .map(|c| c.index)
            .fold(squash.body.index(), Ord::max);
        log::debug!(
            "consumer: resuming {:?} at cheque {} with {} pending",
            l1.tag(),
            last_index,
            pending.len()
        );
        Ok(Consumer {
            signer,
            l1,
            squash,
            pending,
            last_index,
        })
    }

    pub fn tag(&self) -> &ChannelTag {
        self.l1.tag()
    }

    pub fn adaptor_key(&self) -> &VerificationKey {
        &self.l1.open_tx().adaptor_key
    }

    /// Authentication header value for requests to the adaptor.
    pub fn key_tag(&self) -> KeyTag {
        KeyTag::new(&self.signer.verification_key(), self.tag())
    }

    pub fn squash(&self) -> &Squash {
        &self.squash
    }

    pub fn pending(&self) -> &[ChequeBody] {
        &self.pending
    }

    pub fn l1(&self) -> &L1Channel {
        &self.l1
    }

    /// The ledger, e.g. to record adds or mark transactions submitted.
    pub fn l1_mut(&mut self) -> &mut L1Channel {
        &mut self.l1
    }

    /// Squashed plus pending amounts. `None` if the sum exceeds the supply.
    fn committed(&self) -> Option<Lovelace> {
        self.pending
            .iter()
            .try_fold(self.squash.body.amount(), |acc, c| acc.checked_add(c.amount))
    }

    /// Approved channel funds not yet promised to the adaptor.
    pub fn available_funds(&self) -> Lovelace {
        let total = self.l1.total_channel_funds(true);
        self.committed()
            .and_then(|committed| total.checked_sub(committed))
            .unwrap_or(Lovelace::ZERO)
    }

    pub fn issue_cheque(
        &mut self,
        amount: Lovelace,
        timeout: PosixMillis,
        lock: Lock,
    ) -> Result<Cheque, ConsumerError> {
        if self.l1.is_closed() {
            return Err(ConsumerError::ChannelClosed);
        }
        let available = self.available_funds();
        if amount > available {
            return Err(ConsumerError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let index = self
            .last_index
            .successor()
            .ok_or(ConsumerError::IndexExhausted(self.last_index))?;
        let body = ChequeBody::new(index, amount, timeout, lock);
        let cheque = Cheque::from_body_signing(&self.signer, self.tag(), body);
        self.pending.push(body);
        self.last_index = index;
        log::debug!("consumer: issued cheque {} for {}", index, amount);
        Ok(cheque)
    }

    fn adopt(&mut self, body: SquashBody) {
        self.pending.retain(|c| !body.covers(c.index));
        if body.index() > self.last_index {
            self.last_index = body.index();
        }
        self.squash = Squash::from_body_signing(&self.signer, self.l1.tag(), body);
        log::debug!(
            "consumer: squash now at {} for {} ({} excluded)",
            self.squash.body.index(),
            self.squash.body.amount(),
            self.squash.body.excluded().len()
        );
    }

    /// Fold a cheque the adaptor has unlocked into the squash.
    ///
    /// Returns `false` if the cheque was already squashed.
    pub fn apply_unlocked(&mut self, unlocked: &UnlockedCheque) -> Result<bool, ConsumerError> {
        let verified = unlocked.verify(self.tag(), &self.signer.verification_key())?;
        match squash_cheque(&self.squash.body, verified.body()) {
            Ok(body) => {
                self.adopt(body);
                Ok(true)
            }
            Err(SquashError::DuplicateIndex(index)) => {
                log::debug!("consumer: cheque {} already squashed", index);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn handle_squash_response(
        &mut self,
        response: SquashResponse,
    ) -> Result<(), ConsumerError> {
        let proposal = match response {
            SquashResponse::Complete => return Ok(()),
            SquashResponse::Incomplete(proposal) => proposal,
        };
        let body = proposal.verify(self.tag(), &self.signer.verification_key())?;

        let current = &self.squash.body;
        if body.index() < current.index() || body.excluded().iter().any(|&i| current.covers(i)) {
            log::warn!(
                "consumer: rejecting proposal {:?}, behind our squash {:?}",
                body,
                current
            );
            return Err(ConsumerError::StaleProposal);
        }
        self.adopt(body);
        Ok(())
    }

    /// Send the current squash to the adaptor and adopt its counter-proposal,
    /// if any.
    pub fn sync<T: AdaptorTransport>(&mut self, transport: &T) -> Result<(), ConsumerError> {
        let response = transport.post_squash(&self.key_tag(), &self.squash)?;
        self.handle_squash_response(response)
    }
}
