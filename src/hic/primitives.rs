//! A small sequential-field reader shared by every Hi-C sub-parser. Each Hi-C
//! section is a flat sequence of little-endian primitives and null-terminated
//! strings; `FieldReader` lets a parser's `step()` attempt to read as many fields as
//! are currently buffered and suspend cleanly the moment one is not yet available,
//! without losing the fields already consumed.

use crate::io::LittleEndian;
use crate::parse::{ByteAccumulator, Cursor};

/// Borrows a parser's persistent `Cursor` and attempts to decode fields from the
/// accumulator starting at its position. Every `try_*` method either advances the
/// cursor and returns `Some`, or leaves the cursor untouched and returns `None` when
/// not enough bytes are buffered yet.
pub struct FieldReader<'a> {
    acc: &'a ByteAccumulator,
    cursor: &'a mut Cursor,
}

impl<'a> FieldReader<'a> {
    pub fn new(acc: &'a ByteAccumulator, cursor: &'a mut Cursor) -> Self {
        Self { acc, cursor }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// How many additional bytes must be appended to the accumulator before `count`
    /// more bytes are available at the cursor. Used by callers that got `None` back
    /// from a `try_*` method and need to turn that into a concrete `ExactRead`.
    pub fn shortfall(&self, count: usize) -> usize {
        let have = self.acc.last_offset().saturating_sub(self.cursor.position());
        (count as u64).saturating_sub(have) as usize
    }

    fn try_fixed<const N: usize>(&mut self) -> Option<[u8; N]> {
        let start = self.cursor.position();
        if start + N as u64 > self.acc.last_offset() {
            return None;
        }
        let mut buf = [0_u8; N];
        buf.copy_from_slice(self.acc.view_range(start, start + N as u64));
        self.cursor.advance(N as u64);
        Some(buf)
    }

    pub fn try_bytes(&mut self, count: usize) -> Option<Vec<u8>> {
        let start = self.cursor.position();
        if start + count as u64 > self.acc.last_offset() {
            return None;
        }
        let bytes = self.acc.get_range(start, start + count as u64);
        self.cursor.advance(count as u64);
        Some(bytes)
    }

    pub fn try_u8(&mut self) -> Option<u8> {
        self.try_fixed::<1>().map(|b| u8::read_le(&b))
    }

    pub fn try_i16_le(&mut self) -> Option<i16> {
        self.try_fixed::<2>().map(|b| i16::read_le(&b))
    }

    pub fn try_i32_le(&mut self) -> Option<i32> {
        self.try_fixed::<4>().map(|b| i32::read_le(&b))
    }

    pub fn try_u32_le(&mut self) -> Option<u32> {
        self.try_fixed::<4>().map(|b| u32::read_le(&b))
    }

    pub fn try_i64_le(&mut self) -> Option<i64> {
        self.try_fixed::<8>().map(|b| i64::read_le(&b))
    }

    pub fn try_f32_le(&mut self) -> Option<f32> {
        self.try_fixed::<4>().map(|b| f32::read_le(&b))
    }

    pub fn try_f64_le(&mut self) -> Option<f64> {
        self.try_fixed::<8>().map(|b| f64::read_le(&b))
    }

    /// A null-terminated, UTF-8 (lossily decoded) string. Returns `None` if no
    /// `0x00` byte has been buffered yet at or after the cursor.
    pub fn try_cstring(&mut self) -> Option<String> {
        let start = self.cursor.position();
        let zero = self.acc.find_byte(0, start)?;
        let text = String::from_utf8_lossy(self.acc.view_range(start, zero)).into_owned();
        self.cursor.advance(zero - start + 1);
        Some(text)
    }
}
