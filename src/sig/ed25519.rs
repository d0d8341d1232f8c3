//! Signer using the ed25519-dalek crate.

use crate::types::{Signature, VerificationKey};
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};

pub struct Signer {
    key: SigningKey,
}

// Never print the secret key.
impl core::fmt::Debug for Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signer")
            .field("verification_key", &self.verification_key())
            .finish()
    }
}

impl Signer {
    pub fn new<R: rand::RngCore + rand::CryptoRng>(rng: &mut R) -> Self {
        Self {
            key: SigningKey::generate(rng),
        }
    }

    /// Signer from a raw 32-byte secret key (e.g. the output of the external
    /// key derivation).
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    pub fn verification_key(&self) -> VerificationKey {
        VerificationKey(self.key.verifying_key().to_bytes())
    }

    pub fn sign(&self, msg: &[u8]) -> Signature {
        Signature(self.key.sign(msg).to_bytes())
    }
}

/// Check a detached signature.
///
/// Uses strict verification (rejects small-order keys and non-canonical
/// signatures). A key that is not a valid curve point verifies as `false`.
pub fn verify(key: &VerificationKey, msg: &[u8], sig: &Signature) -> bool {
    let key = match VerifyingKey::from_bytes(&key.0) {
        Ok(key) => key,
        Err(_) => {
            log::warn!("rejecting signature for malformed verification key {:?}", key);
            return false;
        }
    };
    let sig = ed25519_dalek::Signature::from_bytes(&sig.0);
    key.verify_strict(msg, &sig).is_ok()
}
