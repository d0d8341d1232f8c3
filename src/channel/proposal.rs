//! Counter-proposals returned by the adaptor when it does not accept a squash
//! as-is.
//!
//! The adaptor answers a squash with the last squash it holds from us
//! (`current`), the cheques it has unlocked since (with their secrets), and the
//! body it expects us to sign next. All three are checked before the consumer
//! signs anything.

use super::{squash_from_cheques, Squash, SquashBody, SquashError, UnlockError, UnlockedCheque};
use crate::{
    cbor::as_hex,
    types::{ChannelTag, VerificationKey},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Answer of the adaptor to a squash.
///
/// JSON: the string `"Complete"` or `{"Incomplete": {...}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum SquashResponse {
    /// The adaptor agrees with the squash we sent.
    Complete,
    /// The adaptor holds unlocked cheques our squash does not cover yet.
    Incomplete(SquashProposal),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SquashProposal {
    #[serde(with = "as_hex")]
    pub proposal: SquashBody,
    #[serde(with = "as_hex")]
    pub current: Squash,
    #[serde(with = "as_hex::seq")]
    pub unlockeds: Vec<UnlockedCheque>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProposalError {
    #[error("current squash does not carry a valid consumer signature")]
    InvalidCurrentSignature,
    #[error("invalid unlocked cheque: {0}")]
    InvalidUnlocked(#[from] UnlockError),
    #[error("could not fold unlocked cheques into the current squash: {0}")]
    Squash(#[from] SquashError),
    #[error("proposed squash does not match the unlocked cheques")]
    ProposalMismatch,
}

impl SquashProposal {
    /// Check the proposal against our own key and return the body that is
    /// safe to sign.
    pub fn verify(
        &self,
        tag: &ChannelTag,
        consumer_key: &VerificationKey,
    ) -> Result<SquashBody, ProposalError> {
        if !self.current.verify(tag, consumer_key) {
            log::warn!("proposal: current squash signature is invalid");
            return Err(ProposalError::InvalidCurrentSignature);
        }

        let bodies = self
            .unlockeds
            .iter()
            .map(|u| u.verify(tag, consumer_key).map(|v| *v.body()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                log::warn!("proposal: {}", e);
                e
            })?;

        let expected = squash_from_cheques(self.current.body.clone(), &bodies)?;
        if expected != self.proposal {
            log::warn!(
                "proposal: expected {:?} from {} unlocked cheques, adaptor proposed {:?}",
                expected,
                bodies.len(),
                self.proposal
            );
            return Err(ProposalError::ProposalMismatch);
        }
        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cbor,
        channel::{Cheque, ChequeBody},
        sig::Signer,
        types::{Index, Lock, Lovelace, PosixMillis, Secret},
    };
    use rand::{rngs::StdRng, SeedableRng};

    struct Setup {
        signer: Signer,
        tag: ChannelTag,
    }

    impl Setup {
        fn new() -> Self {
            let mut rng = StdRng::seed_from_u64(7);
            Setup {
                signer: Signer::new(&mut rng),
                tag: ChannelTag::generate(&mut rng),
            }
        }

        fn unlocked(&self, index: u64, amount: u64) -> UnlockedCheque {
            let secret = Secret([index as u8; 32]);
            let body = ChequeBody::new(
                Index(index),
                Lovelace::new(amount).unwrap(),
                PosixMillis(1_000),
                Lock::from_secret(&secret),
            );
            UnlockedCheque::new(Cheque::from_body_signing(&self.signer, &self.tag, body), secret)
        }

        fn squash(&self, body: SquashBody) -> Squash {
            Squash::from_body_signing(&self.signer, &self.tag, body)
        }

        fn proposal(&self) -> SquashProposal {
            let current = self.squash(
                SquashBody::new(Index(2), Lovelace::new(30).unwrap(), vec![Index(1)]).unwrap(),
            );
            SquashProposal {
                proposal: SquashBody::new(Index(4), Lovelace::new(65).unwrap(), vec![Index(3)])
                    .unwrap(),
                current,
                unlockeds: vec![self.unlocked(4, 25), self.unlocked(1, 10)],
            }
        }
    }

    #[test]
    fn valid_proposal() {
        let s = Setup::new();
        let p = s.proposal();
        let body = p.verify(&s.tag, &s.signer.verification_key()).unwrap();
        assert_eq!(body, p.proposal);
    }

    #[test]
    fn no_unlocked_cheques() {
        let s = Setup::new();
        let mut p = s.proposal();
        p.unlockeds.clear();
        p.proposal = p.current.body.clone();
        assert!(p.verify(&s.tag, &s.signer.verification_key()).is_ok());
    }

    #[test]
    fn current_signed_by_someone_else() {
        let s = Setup::new();
        let mut p = s.proposal();
        let other = Signer::from_bytes(&[3; 32]);
        p.current = Squash::from_body_signing(&other, &s.tag, p.current.body.clone());
        assert_eq!(
            p.verify(&s.tag, &s.signer.verification_key()),
            Err(ProposalError::InvalidCurrentSignature)
        );
    }

    #[test]
    fn unlocked_with_wrong_secret() {
        let s = Setup::new();
        let mut p = s.proposal();
        p.unlockeds[1].secret = Secret([0xff; 32]);
        assert_eq!(
            p.verify(&s.tag, &s.signer.verification_key()),
            Err(ProposalError::InvalidUnlocked(UnlockError::WrongSecret(Index(1))))
        );
    }

    #[test]
    fn inflated_proposal() {
        let s = Setup::new();
        let mut p = s.proposal();
        p.proposal = SquashBody::new(Index(4), Lovelace::new(66).unwrap(), vec![Index(3)]).unwrap();
        assert_eq!(
            p.verify(&s.tag, &s.signer.verification_key()),
            Err(ProposalError::ProposalMismatch)
        );
    }

    #[test]
    fn replayed_unlocked_cheque() {
        let s = Setup::new();
        let mut p = s.proposal();
        p.unlockeds.push(s.unlocked(4, 25));
        assert_eq!(
            p.verify(&s.tag, &s.signer.verification_key()),
            Err(ProposalError::Squash(SquashError::DuplicateIndex(Index(4))))
        );
    }

    #[test]
    fn complete_json() {
        let json = serde_json::to_string(&SquashResponse::Complete).unwrap();
        assert_eq!(json, "\"Complete\"");
        assert_eq!(
            serde_json::from_str::<SquashResponse>("\"Complete\"").unwrap(),
            SquashResponse::Complete
        );
    }

    #[test]
    fn incomplete_json() {
        let s = Setup::new();
        let p = s.proposal();
        let response = SquashResponse::Incomplete(p.clone());

        let value = serde_json::to_value(&response).unwrap();
        let inner = &value["Incomplete"];
        assert_eq!(
            inner["proposal"].as_str().unwrap(),
            hex::encode(cbor::to_vec(&p.proposal).unwrap())
        );
        assert_eq!(inner["unlockeds"].as_array().unwrap().len(), 2);

        let back: SquashResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn json_with_invalid_body_is_rejected() {
        // [5, 0, [5]]: the exclusion is not below the index
        let current = hex::encode(cbor::to_vec(&Setup::new().proposal().current).unwrap());
        let json = format!(
            r#"{{"Incomplete": {{"proposal": "{}", "current": "{}", "unlockeds": []}}}}"#,
            "9f05009f05ffff", current
        );
        assert!(serde_json::from_str::<SquashResponse>(&json).is_err());
    }
}
