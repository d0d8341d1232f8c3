//! The cumulative, signed payment state and the algorithm folding cheques
//! into it.
//!
//! Consumer and adaptor run [squash_cheque] independently and must end up
//! with byte-identical bodies for the same cheque history, so the merge rules
//! below are part of the protocol.

use super::ChequeBody;
use crate::{
    cbor,
    sig::{self, Signer},
    types::{ChannelTag, Index, Lovelace, Signature, TypeError, VerificationKey},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquashError {
    #[error("amount must not be negative")]
    InvalidAmount,
    #[error("excluded indices must be strictly increasing")]
    UnorderedExclusions,
    #[error("excluded index {excluded} is not below the squash index {index}")]
    ExclusionNotBelowIndex { excluded: Index, index: Index },
    /// The cheque is already part of the squash. Expected when a cheque is
    /// re-applied after a retry; callers treat it as "already applied".
    #[error("cheque {0} has already been squashed")]
    DuplicateIndex(Index),
    #[error("squashed amount exceeds the total lovelace supply")]
    AmountOverflow,
}

impl From<TypeError> for SquashError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::InvalidAmount => Self::InvalidAmount,
            TypeError::ExceedsSupply => Self::AmountOverflow,
        }
    }
}

/// "The consumer owes `amount` in total for all cheques up to `index`,
/// except those listed in `excluded`."
///
/// Invariants (checked by every constructor, including decoding):
/// - `excluded` is strictly increasing,
/// - every excluded index is below `index`.
///
/// Encoded as the tuple `[index, amount, [excluded...]]`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(try_from = "RawSquashBody")]
pub struct SquashBody {
    index: Index,
    amount: Lovelace,
    excluded: Vec<Index>,
}

/// Unchecked wire form of [SquashBody].
#[derive(Deserialize)]
struct RawSquashBody {
    index: Index,
    amount: Lovelace,
    excluded: Vec<Index>,
}

impl TryFrom<RawSquashBody> for SquashBody {
    type Error = SquashError;

    fn try_from(raw: RawSquashBody) -> Result<Self, Self::Error> {
        SquashBody::new(raw.index, raw.amount, raw.excluded)
    }
}

impl SquashBody {
    pub fn new(index: Index, amount: Lovelace, excluded: Vec<Index>) -> Result<Self, SquashError> {
        if excluded.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SquashError::UnorderedExclusions);
        }
        if let Some(&last) = excluded.last() {
            if last >= index {
                return Err(SquashError::ExclusionNotBelowIndex {
                    excluded: last,
                    index,
                });
            }
        }
        Ok(SquashBody {
            index,
            amount,
            excluded,
        })
    }

    /// Like [SquashBody::new], for amounts that have not been validated yet.
    pub fn create(index: Index, amount: i128, excluded: Vec<Index>) -> Result<Self, SquashError> {
        Self::new(index, Lovelace::try_from(amount)?, excluded)
    }

    /// `{ index: 0, amount: 0, excluded: [] }`, the state of a fresh channel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn amount(&self) -> Lovelace {
        self.amount
    }

    pub fn excluded(&self) -> &[Index] {
        &self.excluded
    }

    pub fn is_excluded(&self, index: Index) -> bool {
        self.excluded.binary_search(&index).is_ok()
    }

    /// Whether the cheque with this index is accounted for in `amount`.
    pub fn covers(&self, index: Index) -> bool {
        index <= self.index && !self.is_excluded(index)
    }

    fn debug_assert_valid(&self) {
        debug_assert!(self.excluded.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(self.excluded.last().map_or(true, |&e| e < self.index));
    }
}

/// Fold one cheque into the running squash.
///
/// 1. A previously skipped cheque (its index is excluded) is removed from the
///    exclusions and its amount added; the index stays.
/// 2. A cheque beyond the current index moves the index forward; every index
///    strictly in between is appended to the exclusions.
/// 3. Anything else has been squashed already and fails with
///    [SquashError::DuplicateIndex].
pub fn squash_cheque(prev: &SquashBody, cheque: &ChequeBody) -> Result<SquashBody, SquashError> {
    let amount = prev
        .amount
        .checked_add(cheque.amount)
        .ok_or(SquashError::AmountOverflow);

    let next = if let Ok(pos) = prev.excluded.binary_search(&cheque.index) {
        let mut excluded = prev.excluded.clone();
        excluded.remove(pos);
        log::debug!("squash: filled in excluded cheque {}", cheque.index);
        SquashBody {
            index: prev.index,
            amount: amount?,
            excluded,
        }
    } else if prev.index < cheque.index {
        let mut excluded = prev.excluded.clone();
        excluded.extend((prev.index.0 + 1..cheque.index.0).map(Index));
        log::debug!(
            "squash: advanced from {} to {} ({} skipped)",
            prev.index,
            cheque.index,
            cheque.index.0 - prev.index.0 - 1
        );
        SquashBody {
            index: cheque.index,
            amount: amount?,
            excluded,
        }
    } else {
        return Err(SquashError::DuplicateIndex(cheque.index));
    };

    next.debug_assert_valid();
    Ok(next)
}

/// Fold a cheque stream into `seed`, stopping at the first error.
pub fn squash_from_cheques<'a, I>(seed: SquashBody, cheques: I) -> Result<SquashBody, SquashError>
where
    I: IntoIterator<Item = &'a ChequeBody>,
{
    cheques
        .into_iter()
        .try_fold(seed, |acc, cheque| squash_cheque(&acc, cheque))
}

/// A [SquashBody] with the consumer's signature over `tag || cbor(body)`.
///
/// Encoded as `[body, signature]`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Squash {
    pub body: SquashBody,
    pub signature: Signature,
}

impl Squash {
    /// The bytes covered by the signature. Prefixing the tag keeps a squash
    /// from being replayed in another channel with an identical body.
    pub fn signing_data(tag: &ChannelTag, body: &SquashBody) -> Vec<u8> {
        let encoded = cbor::to_vec(body)
            .expect("should be impossible to get an encoding-error for a SquashBody");
        sig::tagged(tag, &encoded)
    }

    pub fn from_body_signing(signer: &Signer, tag: &ChannelTag, body: SquashBody) -> Self {
        let signature = signer.sign(&Self::signing_data(tag, &body));
        Squash { body, signature }
    }

    pub fn verify(&self, tag: &ChannelTag, key: &VerificationKey) -> bool {
        sig::verify(key, &Self::signing_data(tag, &self.body), &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cbor::tests::serialize_and_compare,
        types::{Lock, PosixMillis},
    };
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    fn lovelace(v: u64) -> Lovelace {
        Lovelace::new(v).unwrap()
    }

    fn body(index: u64, amount: u64, excluded: &[u64]) -> SquashBody {
        SquashBody::new(
            Index(index),
            lovelace(amount),
            excluded.iter().copied().map(Index).collect(),
        )
        .unwrap()
    }

    fn cheque(index: u64, amount: u64) -> ChequeBody {
        ChequeBody::new(Index(index), lovelace(amount), PosixMillis(0), Lock([0; 32]))
    }

    #[test]
    fn new_checks_invariants() {
        assert_eq!(
            SquashBody::new(Index(5), lovelace(0), vec![Index(3), Index(3)]),
            Err(SquashError::UnorderedExclusions)
        );
        assert_eq!(
            SquashBody::new(Index(5), lovelace(0), vec![Index(4), Index(3)]),
            Err(SquashError::UnorderedExclusions)
        );
        assert_eq!(
            SquashBody::new(Index(5), lovelace(0), vec![Index(5)]),
            Err(SquashError::ExclusionNotBelowIndex {
                excluded: Index(5),
                index: Index(5)
            })
        );
        assert_eq!(
            SquashBody::create(Index(5), -3, vec![]),
            Err(SquashError::InvalidAmount)
        );
        assert!(SquashBody::new(Index(5), lovelace(0), vec![Index(1), Index(4)]).is_ok());
        assert_eq!(SquashBody::empty(), body(0, 0, &[]));
    }

    #[test]
    fn excluded_cheque_is_filled_in() {
        let prev = body(5, 100, &[3]);
        let next = squash_cheque(&prev, &cheque(3, 20)).unwrap();
        assert_eq!(next, body(5, 120, &[]));
    }

    #[test]
    fn fill_in_keeps_order_of_remaining_exclusions() {
        let prev = body(9, 0, &[2, 4, 7]);
        let next = squash_cheque(&prev, &cheque(4, 1)).unwrap();
        assert_eq!(next, body(9, 1, &[2, 7]));
    }

    #[test]
    fn forward_gap_is_excluded() {
        let prev = body(2, 100, &[]);
        let next = squash_cheque(&prev, &cheque(5, 20)).unwrap();
        assert_eq!(next, body(5, 120, &[3, 4]));
    }

    #[test]
    fn forward_gap_appends_after_prior_exclusions() {
        let prev = body(4, 10, &[1]);
        let next = squash_cheque(&prev, &cheque(7, 5)).unwrap();
        assert_eq!(next, body(7, 15, &[1, 5, 6]));
    }

    #[test]
    fn next_index_adds_no_exclusion() {
        let next = squash_cheque(&SquashBody::empty(), &cheque(1, 5)).unwrap();
        assert_eq!(next, body(1, 5, &[]));
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let prev = body(5, 100, &[3]);
        for i in [0, 1, 2, 4, 5] {
            assert_eq!(
                squash_cheque(&prev, &cheque(i, 1)),
                Err(SquashError::DuplicateIndex(Index(i)))
            );
        }
        // Applying the same cheque twice.
        let once = squash_cheque(&prev, &cheque(3, 1)).unwrap();
        assert_eq!(
            squash_cheque(&once, &cheque(3, 1)),
            Err(SquashError::DuplicateIndex(Index(3)))
        );
    }

    #[test]
    fn amount_overflow_is_rejected() {
        let prev = body(1, Lovelace::MAX_SUPPLY, &[]);
        assert_eq!(
            squash_cheque(&prev, &cheque(2, 1)),
            Err(SquashError::AmountOverflow)
        );
        // Duplicates are reported as such, even when the sum would overflow.
        assert_eq!(
            squash_cheque(&prev, &cheque(1, 1)),
            Err(SquashError::DuplicateIndex(Index(1)))
        );
    }

    #[test]
    fn fold_is_order_independent_once_reconciled() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..50 {
            let n = rng.gen_range(1..20u64);
            let mut cheques: Vec<ChequeBody> = (1..=n)
                .map(|i| cheque(i, rng.gen_range(0..1_000_000)))
                .collect();
            let total: u64 = cheques.iter().map(|c| c.amount.get()).sum();
            cheques.shuffle(&mut rng);

            let mut acc = SquashBody::empty();
            for c in &cheques {
                acc = squash_cheque(&acc, c).unwrap();
                // Invariants hold after every step.
                assert!(acc.excluded().windows(2).all(|w| w[0] < w[1]));
                assert!(acc.excluded().iter().all(|&e| e < acc.index()));
            }

            assert_eq!(acc, body(n, total, &[]));
            assert_eq!(squash_from_cheques(SquashBody::empty(), &cheques), Ok(acc));
        }
    }

    #[test]
    fn fold_stops_at_first_error() {
        let cheques = [cheque(1, 1), cheque(2, 1), cheque(1, 1), cheque(3, 1)];
        assert_eq!(
            squash_from_cheques(SquashBody::empty(), &cheques),
            Err(SquashError::DuplicateIndex(Index(1)))
        );
    }

    #[test]
    fn squash_body_encode() {
        let expected = "
            9f          // indefinite array
            05          // index
            19 03e8     // amount (1000)
            9f 03 04 ff // excluded
            ff          // break
        ";
        serialize_and_compare(&body(5, 1000, &[3, 4]), expected);
    }

    #[test]
    fn squash_body_encode_empty_exclusions() {
        let expected = "
            9f    // indefinite array
            00    // index
            00    // amount
            80    // excluded (empty, definite)
            ff    // break
        ";
        serialize_and_compare(&SquashBody::empty(), expected);
    }

    #[test]
    fn squash_body_decode_checks_invariants() {
        // [5, 0, [5]]
        let bytes = hex::decode("9f05009f05ffff").unwrap();
        assert!(cbor::from_slice::<SquashBody>(&bytes).is_err());
        // [5, 0, [4, 3]]
        let bytes = hex::decode("9f05009f0403ffff").unwrap();
        assert!(cbor::from_slice::<SquashBody>(&bytes).is_err());
        // [5, 0, [3, 4]]
        let bytes = hex::decode("9f05009f0304ffff").unwrap();
        assert_eq!(
            cbor::from_slice::<SquashBody>(&bytes).unwrap(),
            body(5, 0, &[3, 4])
        );
    }

    #[test]
    fn squash_round_trip() {
        let signer = Signer::from_bytes(&[1; 32]);
        let squash = Squash::from_body_signing(&signer, &ChannelTag([9; 16]), body(9, 77, &[2, 8]));
        let bytes = cbor::to_vec(&squash).unwrap();
        assert_eq!(cbor::from_slice::<Squash>(&bytes).unwrap(), squash);
    }

    #[test]
    fn squash_encode() {
        let squash = Squash {
            body: body(1, 2, &[]),
            signature: Signature([0xee; 64]),
        };
        let expected = format!(
            "9f              // indefinite array
             9f 01 02 80 ff  // body
             5840 {}         // signature
             ff              // break",
            "ee".repeat(64)
        );
        serialize_and_compare(&squash, &expected);
    }

    #[test]
    fn signing_data_vector() {
        let data = Squash::signing_data(&ChannelTag([0xab; 16]), &body(5, 1000, &[3, 4]));
        assert_eq!(
            hex::encode(data),
            format!("{}9f051903e89f0304ffff", "ab".repeat(16))
        );
    }

    #[test]
    fn signature_round_trip() {
        let mut rng = StdRng::seed_from_u64(0);
        let signer = Signer::new(&mut rng);
        let tag = ChannelTag::generate(&mut rng);
        let squash = Squash::from_body_signing(&signer, &tag, body(5, 1000, &[3, 4]));
        let key = signer.verification_key();

        assert!(squash.verify(&tag, &key));
        assert!(!squash.verify(&ChannelTag::generate(&mut rng), &key));

        let mut flipped = squash.clone();
        flipped.signature.0[10] ^= 0x04;
        assert!(!flipped.verify(&tag, &key));

        let mut altered = squash.clone();
        altered.body = body(5, 1001, &[3, 4]);
        assert!(!altered.verify(&tag, &key));
    }
}
