//! Module: lex::scalar
//! Responsibility: fixed-width scalar byte transforms preserving order.
//! Boundary: `LexEncode`/`LexDecode` impls for primitives, text, bytes,
//! ulids and optional values.

use crate::lex::{LexDecode, LexEncode, LexError};
use ulid::Ulid;

const NONE_MARKER: u8 = 0x00;
const SOME_MARKER: u8 = 0x01;

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], LexError> {
    bytes.try_into().map_err(|_| LexError::InvalidLength {
        expected: N,
        found: bytes.len(),
    })
}

macro_rules! impl_lex_signed {
    ($($t:ty => $u:ty),* $(,)?) => {
        $(
            impl LexEncode for $t {
                fn lex_encode(&self, out: &mut Vec<u8>) {
                    let biased = self.cast_unsigned() ^ (1 << (<$t>::BITS - 1));
                    out.extend_from_slice(&biased.to_be_bytes());
                }
            }

            impl LexDecode for $t {
                fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
                    let raw = <$u>::from_be_bytes(fixed(bytes)?);
                    Ok((raw ^ (1 << (<$t>::BITS - 1))).cast_signed())
                }
            }
        )*
    };
}

macro_rules! impl_lex_unsigned {
    ($($t:ty),* $(,)?) => {
        $(
            impl LexEncode for $t {
                fn lex_encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }
            }

            impl LexDecode for $t {
                fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
                    Ok(<$t>::from_be_bytes(fixed(bytes)?))
                }
            }
        )*
    };
}

impl_lex_signed!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);
impl_lex_unsigned!(u8, u16, u32, u64);

pub(super) const fn ordered_f32_bits(value: f32) -> u32 {
    if value.is_nan() {
        return 0;
    }

    let bits = value.to_bits();
    if bits & 0x8000_0000 == 0 {
        bits ^ 0x8000_0000
    } else {
        !bits
    }
}

pub(super) const fn ordered_f64_bits(value: f64) -> u64 {
    if value.is_nan() {
        return 0;
    }

    let bits = value.to_bits();
    if bits & 0x8000_0000_0000_0000 == 0 {
        bits ^ 0x8000_0000_0000_0000
    } else {
        !bits
    }
}

impl LexEncode for f32 {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&ordered_f32_bits(*self).to_be_bytes());
    }
}

impl LexDecode for f32 {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
        let ordered = u32::from_be_bytes(fixed(bytes)?);
        if ordered == 0 {
            return Ok(Self::NAN);
        }

        let bits = if ordered & 0x8000_0000 == 0 {
            !ordered
        } else {
            ordered ^ 0x8000_0000
        };

        Ok(Self::from_bits(bits))
    }
}

impl LexEncode for f64 {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&ordered_f64_bits(*self).to_be_bytes());
    }
}

impl LexDecode for f64 {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
        let ordered = u64::from_be_bytes(fixed(bytes)?);
        if ordered == 0 {
            return Ok(Self::NAN);
        }

        let bits = if ordered & 0x8000_0000_0000_0000 == 0 {
            !ordered
        } else {
            ordered ^ 0x8000_0000_0000_0000
        };

        Ok(Self::from_bits(bits))
    }
}

impl LexEncode for bool {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl LexDecode for bool {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
        match fixed::<1>(bytes)? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(LexError::InvalidMarker(other)),
        }
    }
}

impl LexEncode for str {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl LexEncode for String {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        self.as_str().lex_encode(out);
    }
}

impl LexDecode for String {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
        Self::from_utf8(bytes.to_vec()).map_err(|_| LexError::InvalidUtf8)
    }
}

impl LexEncode for [u8] {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl LexEncode for Vec<u8> {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl LexDecode for Vec<u8> {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
        Ok(bytes.to_vec())
    }
}

impl<const N: usize> LexEncode for [u8; N] {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl<const N: usize> LexDecode for [u8; N] {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
        fixed(bytes)
    }
}

impl LexEncode for Ulid {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }
}

impl LexDecode for Ulid {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
        Ok(Self::from_bytes(fixed(bytes)?))
    }
}

impl<T: LexEncode + ?Sized> LexEncode for &T {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        (**self).lex_encode(out);
    }
}

impl<T: LexEncode> LexEncode for Option<T> {
    fn lex_encode(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(NONE_MARKER),
            Some(inner) => {
                out.push(SOME_MARKER);
                inner.lex_encode(out);
            }
        }
    }
}

impl<T: LexDecode> LexDecode for Option<T> {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError> {
        match bytes.split_first() {
            None => Err(LexError::InvalidLength {
                expected: 1,
                found: 0,
            }),
            Some((&NONE_MARKER, [])) => Ok(None),
            Some((&NONE_MARKER, rest)) => Err(LexError::InvalidLength {
                expected: 1,
                found: 1 + rest.len(),
            }),
            Some((&SOME_MARKER, rest)) => T::lex_decode(rest).map(Some),
            Some((&other, _)) => Err(LexError::InvalidMarker(other)),
        }
    }
}
