//! Little-endian primitive decoding, mirroring the shape of a `Data`-over-`Read` trait
//! but operating directly on byte slices, since parsers read from accumulator views
//! rather than a live `Read` stream.

use crate::error::{Error, Result};
use lebe::prelude::*;

/// A little-endian primitive that can be decoded from (and encoded to) a fixed-size
/// byte slice. Implemented once per numeric type via the macro below, the same way
/// the reference design implements its primitive `Data` trait.
pub trait LittleEndian: Sized + Copy {
    const BYTE_SIZE: usize;

    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! implement_little_endian {
    ($kind: ident) => {
        impl LittleEndian for $kind {
            const BYTE_SIZE: usize = std::mem::size_of::<$kind>();

            fn read_le(bytes: &[u8]) -> Self {
                debug_assert_eq!(bytes.len(), Self::BYTE_SIZE);
                let mut cursor = bytes;
                cursor.read_from_little_endian().expect("slice was pre-sized by the caller")
            }

            fn write_le(self, out: &mut Vec<u8>) {
                let mut buffer = [0_u8; std::mem::size_of::<$kind>()];
                (&mut buffer[..]).write_as_little_endian(&self).expect("fixed-size buffer");
                out.extend_from_slice(&buffer);
            }
        }
    };
}

implement_little_endian!(u8);
implement_little_endian!(i8);
implement_little_endian!(u16);
implement_little_endian!(i16);
implement_little_endian!(u32);
implement_little_endian!(i32);
implement_little_endian!(u64);
implement_little_endian!(i64);
implement_little_endian!(f32);
implement_little_endian!(f64);

/// Reads a primitive out of `bytes` at `offset`, returning the value and the offset
/// just past it. Callers that only have a slice and a running offset (the Hi-C
/// metadata parsers) use these instead of threading a `Cursor` through every call.
pub fn read_at<T: LittleEndian>(bytes: &[u8], offset: usize) -> Result<(T, usize)> {
    let end = offset + T::BYTE_SIZE;
    if end > bytes.len() {
        return Err(Error::UnexpectedEof { expected: T::BYTE_SIZE, got: bytes.len().saturating_sub(offset) });
    }
    Ok((T::read_le(&bytes[offset..end]), end))
}

pub fn read_u8(bytes: &[u8], offset: usize) -> Result<(u8, usize)> { read_at(bytes, offset) }
pub fn read_i16_le(bytes: &[u8], offset: usize) -> Result<(i16, usize)> { read_at(bytes, offset) }
pub fn read_u16_le(bytes: &[u8], offset: usize) -> Result<(u16, usize)> { read_at(bytes, offset) }
pub fn read_i32_le(bytes: &[u8], offset: usize) -> Result<(i32, usize)> { read_at(bytes, offset) }
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<(u32, usize)> { read_at(bytes, offset) }
pub fn read_i64_le(bytes: &[u8], offset: usize) -> Result<(i64, usize)> { read_at(bytes, offset) }
pub fn read_f32_le(bytes: &[u8], offset: usize) -> Result<(f32, usize)> { read_at(bytes, offset) }
pub fn read_f64_le(bytes: &[u8], offset: usize) -> Result<(f64, usize)> { read_at(bytes, offset) }

/// Writes `value` to `out` as little-endian bytes, returning the written byte count.
pub fn write_le<T: LittleEndian>(value: T, out: &mut Vec<u8>) {
    value.write_le(out)
}
