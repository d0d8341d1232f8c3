//! Embed a CBOR-encoded value as a hex string, for JSON documents exchanged
//! with the adaptor.
//!
//! # Example usage
//! ```
//! # use serde::{Deserialize, Serialize};
//! # use konduit::cbor::as_hex;
//! # use konduit::channel::SquashBody;
//! #[derive(Serialize, Deserialize)]
//! pub struct Envelope {
//!     #[serde(with = "as_hex")]
//!     pub body: SquashBody,
//! }
//! ```

use super::{from_slice, to_vec};
use serde::{de, de::DeserializeOwned, ser, Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let bytes = to_vec(value).map_err(ser::Error::custom)?;
    serializer.serialize_str(&hex::encode(bytes))
}

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let s = String::deserialize(deserializer)?;
    decode(&s).map_err(de::Error::custom)
}

fn decode<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    let bytes = hex::decode(s).map_err(|e| e.to_string())?;
    from_slice(&bytes).map_err(|e| e.to_string())
}

/// Same as the parent module, for a list of values (one hex string each).
pub mod seq {
    use super::*;

    pub fn serialize<S, T>(values: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let encoded = values
            .iter()
            .map(|v| to_vec(v).map(hex::encode))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ser::Error::custom)?;
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| decode(s))
            .collect::<Result<_, _>>()
            .map_err(de::Error::custom)
    }
}
