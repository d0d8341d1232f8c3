//! Constrained primitive values shared by the cheque, squash and ledger
//! types.
//!
//! Every wrapper validates on construction, so a value of one of these types
//! is always in range.

use core::fmt::{self, Debug, Display};

use rand::{distributions::Standard, prelude::Distribution};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeError {
    #[error("amount must not be negative")]
    InvalidAmount,
    #[error("amount exceeds the total lovelace supply")]
    ExceedsSupply,
}

macro_rules! impl_hex_debug {
    ($T:ident) => {
        impl Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("0x")?;
                for b in self.0 {
                    f.write_fmt(format_args!("{:02x}", b))?;
                }
                Ok(())
            }
        }
    };
}

/// Fixed-size byte string. Encoded as a byte string in binary formats and as
/// a hex string in human readable ones (JSON).
macro_rules! bytes_n {
    ( $(#[$meta:meta])* $T:ident, $N:literal ) => {
        $(#[$meta])*
        #[derive(PartialEq, Eq, Hash, Copy, Clone)]
        pub struct $T(pub [u8; $N]);

        impl $T {
            pub const LEN: usize = $N;

            pub fn as_bytes(&self) -> &[u8; $N] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl From<[u8; $N]> for $T {
            fn from(bytes: [u8; $N]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $T {
            type Error = core::array::TryFromSliceError;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                Ok(Self(bytes.try_into()?))
            }
        }

        impl Serialize for $T {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    serializer.serialize_bytes(&self.0)
                }
            }
        }

        impl<'de> Deserialize<'de> for $T {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                struct BytesVisitor;
                struct HexVisitor;

                impl<'de> de::Visitor<'de> for BytesVisitor {
                    type Value = $T;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(f, "a byte string of length {}", $N)
                    }

                    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<$T, E> {
                        $T::try_from(v).or(Err(E::invalid_length(v.len(), &self)))
                    }
                }

                impl<'de> de::Visitor<'de> for HexVisitor {
                    type Value = $T;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(f, "{} hex characters", 2 * $N)
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<$T, E> {
                        let mut bytes = [0u8; $N];
                        hex::decode_to_slice(v, &mut bytes).map_err(E::custom)?;
                        Ok($T(bytes))
                    }
                }

                if deserializer.is_human_readable() {
                    deserializer.deserialize_str(HexVisitor)
                } else {
                    deserializer.deserialize_bytes(BytesVisitor)
                }
            }
        }

        impl Distribution<$T> for Standard {
            fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> $T {
                let mut bytes = [0u8; $N];
                rng.fill_bytes(&mut bytes);
                $T(bytes)
            }
        }

        impl_hex_debug!($T);
    };
}

bytes_n!(
    /// Identifies a channel on-chain and in every request to the adaptor.
    ChannelTag,
    16
);

impl ChannelTag {
    /// Fresh random tag, drawn once when the channel is opened.
    pub fn generate<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        rng.gen()
    }
}

bytes_n!(
    /// HTLC lock: the SHA-256 hash of a [Secret].
    Lock,
    32
);

impl Lock {
    pub fn from_secret(secret: &Secret) -> Self {
        Lock(Sha256::digest(secret.0).into())
    }
}

bytes_n!(
    /// HTLC preimage revealed by the adaptor when a payment settles.
    Secret,
    32
);

impl Secret {
    pub fn unlocks(&self, lock: &Lock) -> bool {
        Lock::from_secret(self) == *lock
    }
}

bytes_n!(
    /// Raw Ed25519 public key.
    VerificationKey,
    32
);

bytes_n!(
    /// Detached Ed25519 signature.
    Signature,
    64
);

bytes_n!(
    /// Blake2b-256 hash identifying an L1 transaction.
    TxHash,
    32
);

bytes_n!(
    /// Blake2b-224 hash of the channel validator script.
    ScriptHash,
    28
);

/// Name of the header carrying the hex encoded [KeyTag].
pub const KEY_TAG_HEADER: &str = "KONDUIT";

bytes_n!(
    /// Consumer key followed by the channel tag. Sent as authentication
    /// header value to the adaptor, never stored.
    KeyTag,
    48
);

impl KeyTag {
    pub fn new(key: &VerificationKey, tag: &ChannelTag) -> Self {
        let mut bytes = [0u8; 48];
        bytes[..32].copy_from_slice(&key.0);
        bytes[32..].copy_from_slice(&tag.0);
        KeyTag(bytes)
    }

    pub fn to_header_value(&self) -> String {
        self.to_hex()
    }
}

/// Position of a cheque in the per-channel sequence.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Index(pub u64);

impl Index {
    pub const ZERO: Index = Index(0);

    /// The next index, or `None` once the `u64` range is used up.
    pub fn successor(self) -> Option<Index> {
        self.0.checked_add(1).map(Index)
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Milliseconds since the UNIX epoch, or a duration in milliseconds.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PosixMillis(pub u64);

/// An amount of lovelace, bounded by the total supply.
#[derive(Serialize, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Lovelace(u64);

impl Lovelace {
    /// 45 billion ADA.
    pub const MAX_SUPPLY: u64 = 45_000_000_000_000_000;
    pub const ZERO: Lovelace = Lovelace(0);

    pub fn new(amount: u64) -> Result<Self, TypeError> {
        if amount > Self::MAX_SUPPLY {
            Err(TypeError::ExceedsSupply)
        } else {
            Ok(Lovelace(amount))
        }
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Lovelace) -> Option<Lovelace> {
        self.0
            .checked_add(other.0)
            .and_then(|sum| Lovelace::new(sum).ok())
    }

    pub fn checked_sub(self, other: Lovelace) -> Option<Lovelace> {
        self.0.checked_sub(other.0).map(Lovelace)
    }
}

impl TryFrom<u64> for Lovelace {
    type Error = TypeError;

    fn try_from(amount: u64) -> Result<Self, Self::Error> {
        Lovelace::new(amount)
    }
}

impl TryFrom<i64> for Lovelace {
    type Error = TypeError;

    fn try_from(amount: i64) -> Result<Self, Self::Error> {
        let amount = u64::try_from(amount).or(Err(TypeError::InvalidAmount))?;
        Lovelace::new(amount)
    }
}

impl TryFrom<i128> for Lovelace {
    type Error = TypeError;

    fn try_from(amount: i128) -> Result<Self, Self::Error> {
        if amount < 0 {
            return Err(TypeError::InvalidAmount);
        }
        let amount = u64::try_from(amount).or(Err(TypeError::ExceedsSupply))?;
        Lovelace::new(amount)
    }
}

impl<'de> Deserialize<'de> for Lovelace {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Lovelace::new(u64::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

impl Display for Lovelace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lovelace", self.0)
    }
}
