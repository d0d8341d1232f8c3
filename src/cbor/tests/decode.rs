use super::*;

fn decode<T: serde::de::DeserializeOwned>(hex_str: &str) -> Result<T> {
    from_slice(&parse_expected(hex_str))
}

#[test]
fn unexpected_eof() {
    assert_eq!(decode::<u64>(""), Err(Error::UnexpectedEof));
    assert_eq!(decode::<u64>("19 01"), Err(Error::UnexpectedEof));
    assert_eq!(decode::<Vec<u64>>("9f 01 02"), Err(Error::UnexpectedEof));
    assert_eq!(decode::<String>("63 6162"), Err(Error::UnexpectedEof));
}

#[test]
fn trailing_bytes() {
    assert_eq!(decode::<u64>("01 02"), Err(Error::TrailingBytes(1)));
    assert_eq!(decode::<Vec<u64>>("80 00 00"), Err(Error::TrailingBytes(2)));
}

#[test]
fn trailing_elements() {
    assert_eq!(
        decode::<Point>("9f 01 02 03 ff"),
        Err(Error::TrailingElements)
    );
    assert_eq!(decode::<Point>("83 01 02 03"), Err(Error::TrailingElements));
}

#[test]
fn missing_elements() {
    assert!(decode::<Point>("9f 01 ff").is_err());
    assert!(decode::<Point>("80").is_err());
}

#[test]
fn definite_arrays_are_accepted() {
    assert_eq!(decode::<Vec<u64>>("83 01 02 03").unwrap(), vec![1, 2, 3]);
    assert_eq!(decode::<Point>("82 01 20").unwrap(), Point { x: 1, y: -1 });
    assert_eq!(decode::<Vec<u64>>("9f ff").unwrap(), Vec::<u64>::new());
}

#[test]
fn non_shortest_ints_are_accepted() {
    assert_eq!(decode::<u64>("18 05").unwrap(), 5);
    assert_eq!(decode::<u64>("1b 0000000000000005").unwrap(), 5);
}

#[test]
fn unsupported_headers() {
    // map
    assert_eq!(decode::<u64>("a0"), Err(Error::UnsupportedHeader(0xa0)));
    // half float
    assert_eq!(
        decode::<u64>("f9 3c00"),
        Err(Error::UnsupportedHeader(0xf9))
    );
    // null
    assert_eq!(decode::<bool>("f6"), Err(Error::UnsupportedHeader(0xf6)));
    // reserved additional information
    assert_eq!(decode::<u64>("1c"), Err(Error::UnsupportedHeader(0x1c)));
    // indefinite byte string
    assert_eq!(decode::<String>("7f"), Err(Error::UnsupportedHeader(0x7f)));
    // tag other than 2
    assert_eq!(
        decode::<u128>("c3 41 01"),
        Err(Error::UnsupportedHeader(0xc3))
    );
}

#[test]
fn type_mismatch_is_custom_error() {
    assert!(matches!(decode::<bool>("01"), Err(Error::Custom(_))));
    assert!(matches!(decode::<u8>("19 0100"), Err(Error::Custom(_))));
    assert!(matches!(decode::<u64>("20"), Err(Error::Custom(_))));
}

#[test]
fn borrowed_str() {
    let bytes = parse_expected("62 6869");
    let s: &str = from_slice(&bytes).unwrap();
    assert_eq!(s, "hi");
}

#[test]
fn byte_newtype_from_text_string_is_rejected() {
    use crate::channel::Squash;

    let as_bytes = format!("9f 9f 00 00 80 ff 5840 {} ff", "ab".repeat(64));
    assert!(decode::<Squash>(&as_bytes).is_ok());

    // Same signature, hex encoded into a 128 character text string.
    let as_text = format!(
        "9f 9f 00 00 80 ff 7880 {} ff",
        hex::encode("ab".repeat(64))
    );
    assert!(matches!(decode::<Squash>(&as_text), Err(Error::Custom(_))));
}
