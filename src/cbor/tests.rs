mod decode;

use super::*;
use serde::Serialize;

use core::fmt::Debug;

/*
Add the following before a `serialize_and_compare` call to print the entire
serialized output, then paste it into https://cbor.me for an annotated view.
```
    println!("{}", hex::encode(to_vec(&d).unwrap()));
```
*/

struct Hex<'a>(&'a [u8]);

impl<'a> Debug for Hex<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for b in self.0 {
            f.write_fmt(format_args!("{:02x}", b))?;
        }
        Ok(())
    }
}

impl<'a> PartialEq for Hex<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Strip everything after `//` on each line, then all whitespace. What is left
/// must be the hex encoding of the whole item.
fn parse_expected(expected: &str) -> Vec<u8> {
    let digits: String = expected
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .flat_map(|line| line.chars().filter(|c| !c.is_whitespace()))
        .collect();
    hex::decode(&digits).expect("expected value must be valid hex")
}

pub fn serialize_and_compare<T>(value: &T, expected: &str)
where
    T: Serialize + ?Sized,
{
    let expected = parse_expected(expected);
    let actual = to_vec(value).unwrap();

    // Wrapping both in Hex makes assert_eq! format them as a hex string.
    assert_eq!(
        Hex(&actual),
        Hex(&expected),
        "encoding did not match the expected value"
    );
}

/// Check the encoding and that decoding it gives back `value`.
pub fn round_trip<T>(value: &T, expected: &str)
where
    T: Serialize + serde::de::DeserializeOwned + PartialEq + Debug,
{
    serialize_and_compare(value, expected);
    let bytes = parse_expected(expected);
    assert_eq!(&from_slice::<T>(&bytes).unwrap(), value);
}

#[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
struct Point {
    x: u64,
    y: i64,
}

#[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
#[serde(transparent)]
struct Wrapper(u64);

#[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
struct Pair(u8, bool);
