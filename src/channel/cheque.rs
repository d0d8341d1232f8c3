//! Single incremental payments and their unlocked (settled) form.

use crate::{
    cbor,
    sig::{self, Signer},
    types::{
        ChannelTag, Index, Lock, Lovelace, PosixMillis, Secret, Signature, TypeError,
        VerificationKey,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// "Pay `amount` more, as cheque `index`, redeemable until `timeout`
/// against `lock`."
///
/// Encoded as the tuple `[index, amount, timeout, lock]`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChequeBody {
    pub index: Index,
    pub amount: Lovelace,
    pub timeout: PosixMillis,
    pub lock: Lock,
}

impl ChequeBody {
    pub fn new(index: Index, amount: Lovelace, timeout: PosixMillis, lock: Lock) -> Self {
        ChequeBody {
            index,
            amount,
            timeout,
            lock,
        }
    }

    /// Like [ChequeBody::new], for amounts that have not been validated yet.
    pub fn create(
        index: Index,
        amount: i128,
        timeout: PosixMillis,
        lock: Lock,
    ) -> Result<Self, TypeError> {
        Ok(Self::new(index, Lovelace::try_from(amount)?, timeout, lock))
    }
}

/// A cheque body together with the consumer's signature over
/// `tag || cbor(body)`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Cheque {
    pub body: ChequeBody,
    pub signature: Signature,
}

impl Cheque {
    pub fn signing_data(tag: &ChannelTag, body: &ChequeBody) -> Vec<u8> {
        let encoded = cbor::to_vec(body)
            .expect("should be impossible to get an encoding-error for a ChequeBody");
        sig::tagged(tag, &encoded)
    }

    pub fn from_body_signing(signer: &Signer, tag: &ChannelTag, body: ChequeBody) -> Self {
        Cheque {
            body,
            signature: signer.sign(&Self::signing_data(tag, &body)),
        }
    }

    pub fn verify(&self, tag: &ChannelTag, key: &VerificationKey) -> bool {
        sig::verify(key, &Self::signing_data(tag, &self.body), &self.signature)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockError {
    #[error("cheque {0} does not carry a valid consumer signature")]
    InvalidSignature(Index),
    #[error("secret does not open the lock of cheque {0}")]
    WrongSecret(Index),
}

/// A cheque whose HTLC secret has been revealed, as returned by the adaptor.
///
/// Encoded as `[body, signature, secret]`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnlockedCheque {
    pub body: ChequeBody,
    pub signature: Signature,
    pub secret: Secret,
}

impl UnlockedCheque {
    pub fn new(cheque: Cheque, secret: Secret) -> Self {
        UnlockedCheque {
            body: cheque.body,
            signature: cheque.signature,
            secret,
        }
    }

    pub fn cheque(&self) -> Cheque {
        Cheque {
            body: self.body,
            signature: self.signature,
        }
    }

    pub fn verify(
        self,
        tag: &ChannelTag,
        key: &VerificationKey,
    ) -> Result<VerifiedUnlockedCheque, UnlockError> {
        if !self.cheque().verify(tag, key) {
            return Err(UnlockError::InvalidSignature(self.body.index));
        }
        if !self.secret.unlocks(&self.body.lock) {
            return Err(UnlockError::WrongSecret(self.body.index));
        }
        Ok(VerifiedUnlockedCheque(self))
    }
}

/// An [UnlockedCheque] that passed [UnlockedCheque::verify]. Can only be
/// obtained through verification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VerifiedUnlockedCheque(UnlockedCheque);

impl VerifiedUnlockedCheque {
    pub fn body(&self) -> &ChequeBody {
        &self.0.body
    }

    pub fn secret(&self) -> &Secret {
        &self.0.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::tests::serialize_and_compare;

    fn build_test_body() -> ChequeBody {
        ChequeBody::new(
            Index(7),
            Lovelace::new(1_000_000).unwrap(),
            PosixMillis(1_700_000_000_000),
            Lock([0x22; 32]),
        )
    }

    #[test]
    fn create_rejects_negative_amount() {
        assert_eq!(
            ChequeBody::create(Index(1), -1, PosixMillis(0), Lock([0; 32])),
            Err(TypeError::InvalidAmount)
        );
        assert!(ChequeBody::create(Index(1), 0, PosixMillis(0), Lock([0; 32])).is_ok());
    }

    #[test]
    fn cheque_body_encode() {
        let expected = "
            9f                                   // indefinite array
            07                                   // index
            1a 000f4240                          // amount (1_000_000)
            1b 0000018bcfe56800                  // timeout
            5820 2222222222222222222222222222222222222222222222222222222222222222 // lock
            ff                                   // break
        ";
        serialize_and_compare(&build_test_body(), expected);
    }

    #[test]
    fn cheque_body_round_trip() {
        let body = build_test_body();
        let bytes = cbor::to_vec(&body).unwrap();
        assert_eq!(cbor::from_slice::<ChequeBody>(&bytes).unwrap(), body);
    }

    #[test]
    fn cheque_signing_data_is_tag_then_body() {
        let tag = ChannelTag([0x01; 16]);
        let body = build_test_body();
        let data = Cheque::signing_data(&tag, &body);
        assert_eq!(&data[..16], &tag.0);
        assert_eq!(&data[16..], cbor::to_vec(&body).unwrap().as_slice());
    }

    #[test]
    fn cheque_verify() {
        let signer = Signer::from_bytes(&[5; 32]);
        let tag = ChannelTag([0x01; 16]);
        let cheque = Cheque::from_body_signing(&signer, &tag, build_test_body());

        assert!(cheque.verify(&tag, &signer.verification_key()));
        assert!(!cheque.verify(&ChannelTag([0x02; 16]), &signer.verification_key()));
    }

    #[test]
    fn unlocked_cheque_verify() {
        let signer = Signer::from_bytes(&[5; 32]);
        let tag = ChannelTag([0x01; 16]);
        let secret = Secret([0x33; 32]);
        let mut body = build_test_body();
        body.lock = Lock::from_secret(&secret);
        let cheque = Cheque::from_body_signing(&signer, &tag, body);

        let unlocked = UnlockedCheque::new(cheque, secret);
        let verified = unlocked.verify(&tag, &signer.verification_key()).unwrap();
        assert_eq!(verified.body(), &body);
        assert_eq!(verified.secret(), &secret);

        let wrong = UnlockedCheque::new(cheque, Secret([0x34; 32]));
        assert_eq!(
            wrong.verify(&tag, &signer.verification_key()),
            Err(UnlockError::WrongSecret(Index(7)))
        );

        let other = Signer::from_bytes(&[6; 32]);
        assert_eq!(
            unlocked.verify(&tag, &other.verification_key()),
            Err(UnlockError::InvalidSignature(Index(7)))
        );
    }

    #[test]
    fn unlocked_cheque_round_trip() {
        let unlocked = UnlockedCheque {
            body: build_test_body(),
            signature: Signature([0x44; 64]),
            secret: Secret([0x55; 32]),
        };
        let bytes = cbor::to_vec(&unlocked).unwrap();
        assert_eq!(bytes[0], 0x9f);
        assert_eq!(cbor::from_slice::<UnlockedCheque>(&bytes).unwrap(), unlocked);
    }
}
