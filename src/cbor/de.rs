use super::{
    error::{Error, Result},
    ser::{
        BREAK, FALSE, INDEFINITE, MAJOR_ARRAY, MAJOR_BYTES, MAJOR_NEGATIVE, MAJOR_SIMPLE,
        MAJOR_TAG, MAJOR_TEXT, MAJOR_UNSIGNED, TAG_POSITIVE_BIGNUM, TRUE,
    },
};
use serde::{
    de::{self, DeserializeSeed, SeqAccess, Visitor},
    forward_to_deserialize_any, Deserialize,
};

pub struct Deserializer<'de> {
    input: &'de [u8],
}

impl<'de> Deserializer<'de> {
    pub fn from_slice(input: &'de [u8]) -> Self {
        Deserializer { input }
    }

    /// Fails unless the whole input has been consumed.
    pub fn end(&self) -> Result<()> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(Error::TrailingBytes(self.input.len()))
        }
    }

    fn peek(&self) -> Result<u8> {
        self.input.first().copied().ok_or(Error::UnexpectedEof)
    }

    fn next_byte(&mut self) -> Result<u8> {
        let b = self.peek()?;
        self.input = &self.input[1..];
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'de [u8]> {
        if self.input.len() < len {
            return Err(Error::UnexpectedEof);
        }
        let (head, tail) = self.input.split_at(len);
        self.input = tail;
        Ok(head)
    }

    /// Read the argument following `initial`. Returns `None` for the
    /// indefinite-length marker.
    fn read_argument(&mut self, initial: u8) -> Result<Option<u64>> {
        let info = initial & 0x1f;
        let value = match info {
            0..=23 => info as u64,
            24 => self.next_byte()? as u64,
            25 => u16::from_be_bytes(self.read_array()?) as u64,
            26 => u32::from_be_bytes(self.read_array()?) as u64,
            27 => u64::from_be_bytes(self.read_array()?),
            INDEFINITE => return Ok(None),
            _ => return Err(Error::UnsupportedHeader(initial)),
        };
        Ok(Some(value))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_definite(&mut self, initial: u8) -> Result<u64> {
        self.read_argument(initial)?
            .ok_or(Error::UnsupportedHeader(initial))
    }

    fn read_length(&mut self, initial: u8) -> Result<usize> {
        usize::try_from(self.read_definite(initial)?).or(Err(Error::IntegerOverflow))
    }

    fn read_bignum(&mut self) -> Result<u128> {
        let initial = self.next_byte()?;
        if initial >> 5 != MAJOR_BYTES {
            return Err(Error::UnsupportedHeader(initial));
        }
        let len = self.read_length(initial)?;
        if len > 16 {
            return Err(Error::IntegerOverflow);
        }
        let mut buf = [0u8; 16];
        buf[16 - len..].copy_from_slice(self.take(len)?);
        Ok(u128::from_be_bytes(buf))
    }
}

pub fn from_slice<'a, T>(bytes: &'a [u8]) -> Result<T>
where
    T: Deserialize<'a>,
{
    let mut deserializer = Deserializer::from_slice(bytes);
    let value = T::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

impl<'de, 'a> de::Deserializer<'de> for &'a mut Deserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let initial = self.next_byte()?;
        match initial >> 5 {
            MAJOR_UNSIGNED => visitor.visit_u64(self.read_definite(initial)?),
            MAJOR_NEGATIVE => {
                let n = self.read_definite(initial)?;
                match i64::try_from(n) {
                    Ok(n) => visitor.visit_i64(-1 - n),
                    Err(_) => visitor.visit_i128(-1 - n as i128),
                }
            }
            MAJOR_BYTES => {
                let len = self.read_length(initial)?;
                visitor.visit_borrowed_bytes(self.take(len)?)
            }
            MAJOR_TEXT => {
                let len = self.read_length(initial)?;
                let s = core::str::from_utf8(self.take(len)?).or(Err(Error::InvalidUtf8))?;
                visitor.visit_borrowed_str(s)
            }
            MAJOR_ARRAY => {
                let remaining = self.read_argument(initial)?;
                let mut seq = Seq {
                    de: self,
                    remaining,
                    finished: false,
                };
                let value = visitor.visit_seq(&mut seq)?;
                seq.close()?;
                Ok(value)
            }
            MAJOR_TAG => match self.read_definite(initial)? {
                TAG_POSITIVE_BIGNUM => visitor.visit_u128(self.read_bignum()?),
                _ => Err(Error::UnsupportedHeader(initial)),
            },
            MAJOR_SIMPLE if initial == FALSE => visitor.visit_bool(false),
            MAJOR_SIMPLE if initial == TRUE => visitor.visit_bool(true),
            _ => Err(Error::UnsupportedHeader(initial)),
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// Elements of an array, definite (`remaining` counts down) or indefinite
/// (terminated by a break byte).
struct Seq<'a, 'de> {
    de: &'a mut Deserializer<'de>,
    remaining: Option<u64>,
    finished: bool,
}

impl<'a, 'de> Seq<'a, 'de> {
    // Derived visitors stop after the last field they know about, so whatever
    // is left of the array must be checked here.
    fn close(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        match self.remaining {
            Some(0) => Ok(()),
            Some(_) => Err(Error::TrailingElements),
            None if self.de.next_byte()? == BREAK => Ok(()),
            None => Err(Error::TrailingElements),
        }
    }
}

impl<'de, 'a, 'b> SeqAccess<'de> for &'b mut Seq<'a, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.remaining {
            Some(0) => {
                self.finished = true;
                return Ok(None);
            }
            Some(ref mut n) => *n -= 1,
            None => {
                if self.de.peek()? == BREAK {
                    self.de.next_byte()?;
                    self.finished = true;
                    return Ok(None);
                }
            }
        }
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        self.remaining.and_then(|n| usize::try_from(n).ok())
    }
}
