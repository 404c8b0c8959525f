//! A position marker into a `ByteAccumulator`.

use super::accumulator::ByteAccumulator;

/// An absolute byte position that only ever moves forward. Parsers keep one (or a
/// handful, for composite records) as part of their state; the accumulator itself
/// stays stateless with respect to "where have I read up to".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(u64);

impl Cursor {
    pub fn new(position: u64) -> Self { Self(position) }

    pub fn position(&self) -> u64 { self.0 }

    pub fn advance(&mut self, count: u64) {
        self.0 += count;
    }

    pub fn set(&mut self, position: u64) {
        self.0 = position;
    }

    /// The bytes from `from` (or the accumulator's own `first_offset` if unset)
    /// up to this cursor's current position.
    pub fn slice<'a>(&self, acc: &'a ByteAccumulator, from: Option<u64>) -> &'a [u8] {
        acc.view_range(from.unwrap_or_else(|| acc.first_offset()), self.0)
    }

    /// Bytes available to read without requesting more from the driver.
    pub fn available_in(&self, acc: &ByteAccumulator) -> u64 {
        acc.last_offset().saturating_sub(self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advances_and_slices() {
        let mut acc = ByteAccumulator::new(0);
        acc.append(b"0123456789");
        let mut cursor = Cursor::new(0);
        cursor.advance(4);
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.slice(&acc, Some(0)), b"0123");
        assert_eq!(cursor.available_in(&acc), 6);
    }
}
