use super::error::{Error, Result};
use serde::{
    ser::{
        self, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant, SerializeTuple,
        SerializeTupleStruct, SerializeTupleVariant,
    },
    Serialize,
};

pub(super) const MAJOR_UNSIGNED: u8 = 0;
pub(super) const MAJOR_NEGATIVE: u8 = 1;
pub(super) const MAJOR_BYTES: u8 = 2;
pub(super) const MAJOR_TEXT: u8 = 3;
pub(super) const MAJOR_ARRAY: u8 = 4;
pub(super) const MAJOR_TAG: u8 = 6;
pub(super) const MAJOR_SIMPLE: u8 = 7;

/// Additional information value announcing an indefinite-length item.
pub(super) const INDEFINITE: u8 = 31;
pub(super) const BREAK: u8 = 0xff;
pub(super) const FALSE: u8 = 0xf4;
pub(super) const TRUE: u8 = 0xf5;

/// Tag number for unsigned bignums (RFC 8949, section 3.4.3).
pub(super) const TAG_POSITIVE_BIGNUM: u64 = 2;

const EMPTY_ARRAY: u8 = MAJOR_ARRAY << 5;
const INDEFINITE_ARRAY: u8 = (MAJOR_ARRAY << 5) | INDEFINITE;

/// Sink for encoded bytes.
///
/// Encoding is streamed so signing data can be assembled without an
/// intermediate copy of the payload.
pub trait Writer {
    fn write(&mut self, bytes: &[u8]);
}

impl Writer for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

pub struct Serializer<'a, W>
where
    W: Writer,
{
    writer: &'a mut W,
}

pub fn to_writer<T, W>(value: &T, writer: &mut W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Writer,
{
    let mut serializer = Serializer { writer };
    value.serialize(&mut serializer)
}

pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::new();
    to_writer(value, &mut buf)?;
    log::trace!("cbor: encoded {} bytes", buf.len());
    Ok(buf)
}

impl<'a, W> Serializer<'a, W>
where
    W: Writer,
{
    /// Write the initial byte(s) of an item using the shortest form for the
    /// argument, as required for canonical encoding.
    fn write_header(&mut self, major: u8, value: u64) {
        let major = major << 5;
        if value < 24 {
            self.writer.write(&[major | value as u8]);
        } else if value <= u8::MAX as u64 {
            self.writer.write(&[major | 24, value as u8]);
        } else if value <= u16::MAX as u64 {
            self.writer.write(&[major | 25]);
            self.writer.write(&(value as u16).to_be_bytes());
        } else if value <= u32::MAX as u64 {
            self.writer.write(&[major | 26]);
            self.writer.write(&(value as u32).to_be_bytes());
        } else {
            self.writer.write(&[major | 27]);
            self.writer.write(&value.to_be_bytes());
        }
    }

    fn write_bignum(&mut self, v: u128) {
        let bytes = v.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        self.write_header(MAJOR_TAG, TAG_POSITIVE_BIGNUM);
        self.write_header(MAJOR_BYTES, (bytes.len() - first) as u64);
        self.writer.write(&bytes[first..]);
    }

    // Plutus data convention: empty lists are definite, everything else is
    // indefinite and closed with a break.
    fn begin_array<'s>(&'s mut self, len: usize) -> Compound<'s, 'a, W> {
        let empty = len == 0;
        self.writer.write(&[if empty { EMPTY_ARRAY } else { INDEFINITE_ARRAY }]);
        Compound { ser: self, empty }
    }
}

/// State of an array that is currently being written.
pub struct Compound<'s, 'a, W>
where
    W: Writer,
{
    ser: &'s mut Serializer<'a, W>,
    empty: bool,
}

impl<'s, 'a, W> Compound<'s, 'a, W>
where
    W: Writer,
{
    fn element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut *self.ser)
    }

    fn finish(self) -> Result<()> {
        if !self.empty {
            self.ser.writer.write(&[BREAK]);
        }
        Ok(())
    }
}

impl<'s, 'a, W> ser::Serializer for &'s mut Serializer<'a, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Compound<'s, 'a, W>;
    type SerializeTuple = Compound<'s, 'a, W>;
    type SerializeTupleStruct = Compound<'s, 'a, W>;
    type SerializeTupleVariant = Compound<'s, 'a, W>;
    type SerializeMap = Compound<'s, 'a, W>;
    type SerializeStruct = Compound<'s, 'a, W>;
    type SerializeStructVariant = Compound<'s, 'a, W>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.writer.write(&[if v { TRUE } else { FALSE }]);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v.into())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v.into())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v.into())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        if v < 0 {
            // -1 - v cannot overflow for any negative i64.
            self.write_header(MAJOR_NEGATIVE, (-(v + 1)) as u64);
        } else {
            self.write_header(MAJOR_UNSIGNED, v as u64);
        }
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        if v >= 0 {
            self.serialize_u128(v as u128)
        } else if let Ok(n) = u64::try_from(-(v + 1)) {
            self.write_header(MAJOR_NEGATIVE, n);
            Ok(())
        } else {
            Err(Error::TypeNotRepresentable("negative bignum"))
        }
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v.into())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v.into())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v.into())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.write_header(MAJOR_UNSIGNED, v);
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        match u64::try_from(v) {
            Ok(v) => self.serialize_u64(v),
            Err(_) => {
                self.write_bignum(v);
                Ok(())
            }
        }
    }

    fn serialize_f32(self, _: f32) -> Result<()> {
        Err(Error::TypeNotRepresentable("f32"))
    }

    fn serialize_f64(self, _: f64) -> Result<()> {
        Err(Error::TypeNotRepresentable("f64"))
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.serialize_str(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.write_header(MAJOR_TEXT, v.len() as u64);
        self.writer.write(v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.write_header(MAJOR_BYTES, v.len() as u64);
        self.writer.write(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        Err(Error::TypeNotRepresentable("none"))
    }

    fn serialize_some<T: ?Sized>(self, _: &T) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("some"))
    }

    fn serialize_unit(self) -> Result<()> {
        Err(Error::TypeNotRepresentable("unit"))
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<()> {
        Err(Error::TypeNotRepresentable("unit struct"))
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<()> {
        Err(Error::TypeNotRepresentable("unit variant (enum)"))
    }

    fn serialize_newtype_struct<T: ?Sized>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("newtype variant (enum)"))
    }

    fn serialize_seq(self, size: Option<usize>) -> Result<Self::SerializeSeq> {
        // Whether the empty or the indefinite form is used depends on the
        // length, so it has to be known before the first element.
        let len = size.ok_or(Error::UnknownLength)?;
        Ok(self.begin_array(len))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        Ok(self.begin_array(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(self.begin_array(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::TypeNotRepresentable("tuple variant (enum)"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::TypeNotRepresentable("map"))
    }

    fn serialize_struct(self, _: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        Ok(self.begin_array(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::TypeNotRepresentable("struct variant"))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

impl<'s, 'a, W> SerializeSeq for Compound<'s, 'a, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'s, 'a, W> SerializeTuple for Compound<'s, 'a, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'s, 'a, W> SerializeTupleStruct for Compound<'s, 'a, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'s, 'a, W> SerializeStruct for Compound<'s, 'a, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    // Field names are not encoded, structs are positional tuples.
    fn serialize_field<T: ?Sized>(&mut self, _name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

// The remaining compound kinds are refused when they are opened, so these are
// never reached.

impl<'s, 'a, W> SerializeTupleVariant for Compound<'s, 'a, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, _value: &T) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("tuple variant (enum)"))
    }

    fn end(self) -> Result<()> {
        Err(Error::TypeNotRepresentable("tuple variant (enum)"))
    }
}

impl<'s, 'a, W> SerializeMap for Compound<'s, 'a, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized>(&mut self, _key: &T) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("map"))
    }

    fn serialize_value<T: ?Sized>(&mut self, _value: &T) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("map"))
    }

    fn end(self) -> Result<()> {
        Err(Error::TypeNotRepresentable("map"))
    }
}

impl<'s, 'a, W> SerializeStructVariant for Compound<'s, 'a, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, _key: &'static str, _value: &T) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("struct variant"))
    }

    fn end(self) -> Result<()> {
        Err(Error::TypeNotRepresentable("struct variant"))
    }
}
