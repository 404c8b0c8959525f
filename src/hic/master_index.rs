//! Parses the Hi-C V8 footer: the master index mapping `"{i}_{j}"` chromosome-pair
//! keys to their matrix's file region, followed by the (advisory-length) region
//! holding the expected-value vectors.

use crate::error::Result;
use crate::hic::primitives::FieldReader;
use crate::hic::types::{FileRegion, MasterIndex};
use crate::parse::{ByteAccumulator, Cursor, ParseRequest, ParseResult, Parser, Step};

enum Phase {
    Start,
    NBytes,
    NEntries,
    Key,
    BinPosition { key: String },
    NBlocks { key: String, bin_position: i64 },
    Done,
}

/// A [`Parser`] that emits exactly one [`MasterIndex`] plus the byte region
/// following it (see [`MasterIndexParser::expected_vectors_region`]).
pub struct MasterIndexParser {
    cursor: Cursor,
    phase: Phase,
    footer_position: i64,
    n_bytes: i64,
    entries_remaining: i32,
    entries: MasterIndex,
}

impl MasterIndexParser {
    pub fn new(footer_position: i64) -> Self {
        Self {
            cursor: Cursor::new(footer_position as u64),
            phase: Phase::Start,
            footer_position,
            n_bytes: 0,
            entries_remaining: 0,
            entries: MasterIndex::new(),
        }
    }

    fn pull_i32(&mut self, acc: &ByteAccumulator) -> std::result::Result<i32, ParseRequest> {
        let mut fr = FieldReader::new(acc, &mut self.cursor);
        match fr.try_i32_le() {
            Some(v) => Ok(v),
            None => Err(ParseRequest::ExactRead { count: fr.shortfall(4), source_position: None }),
        }
    }

    fn pull_i64(&mut self, acc: &ByteAccumulator) -> std::result::Result<i64, ParseRequest> {
        let mut fr = FieldReader::new(acc, &mut self.cursor);
        match fr.try_i64_le() {
            Some(v) => Ok(v),
            None => Err(ParseRequest::ExactRead { count: fr.shortfall(8), source_position: None }),
        }
    }

    fn pull_cstring(&mut self, acc: &ByteAccumulator) -> std::result::Result<String, ParseRequest> {
        let mut fr = FieldReader::new(acc, &mut self.cursor);
        match fr.try_cstring() {
            Some(s) => Ok(s),
            None => Err(ParseRequest::PartialRead { source_position: None, max_count: None }),
        }
    }

    /// The region following the master index's entries: `header.expected_vectors_region`.
    /// Only meaningful once parsing has completed (`Done`); the length is advisory
    /// per §4.5.5 — `read_expected_value_vectors` reads past it rather than trusting it.
    pub fn expected_vectors_region(&self) -> FileRegion {
        let consumed = (self.cursor.position() as i64) - self.footer_position;
        let length = (self.n_bytes + 4 - consumed).max(0) as u32;
        FileRegion { offset: self.cursor.position(), length }
    }
}

impl Parser for MasterIndexParser {
    type Output = MasterIndex;

    fn step(&mut self, acc: &ByteAccumulator, _eof: bool) -> Result<Step<Self::Output>> {
        loop {
            match &self.phase {
                Phase::Start => {
                    self.phase = Phase::NBytes;
                    return Ok(Step::Request(ParseRequest::ExactRead {
                        count: 4,
                        source_position: Some(self.footer_position as u64),
                    }));
                }

                Phase::NBytes => match self.pull_i32(acc) {
                    Ok(n) => {
                        // Widened to i64 for the remainder-length arithmetic in
                        // expected_vectors_region(); V8 itself writes it as i32.
                        self.n_bytes = n as i64;
                        self.phase = Phase::NEntries;
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::NEntries => match self.pull_i32(acc) {
                    Ok(n) => {
                        self.entries_remaining = n;
                        self.phase = if n > 0 { Phase::Key } else { Phase::Done };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::Key => match self.pull_cstring(acc) {
                    Ok(key) => self.phase = Phase::BinPosition { key },
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::BinPosition { key } => {
                    let key = key.clone();
                    match self.pull_i64(acc) {
                        Ok(bin_position) => self.phase = Phase::NBlocks { key, bin_position },
                        Err(req) => return Ok(Step::Request(req)),
                    }
                }

                Phase::NBlocks { key, bin_position } => {
                    let (key, bin_position) = (key.clone(), *bin_position);
                    match self.pull_i32(acc) {
                        Ok(n_blocks) => {
                            self.entries.insert(key, (bin_position, n_blocks));
                            self.entries_remaining -= 1;
                            self.phase = if self.entries_remaining > 0 { Phase::Key } else { Phase::Done };
                        }
                        Err(req) => return Ok(Step::Request(req)),
                    }
                }

                Phase::Done => {
                    return Ok(Step::Result(ParseResult::Complete(std::mem::take(&mut self.entries))));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::{parse_sync, MemorySource};

    fn cstr(s: &str) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.push(0);
        v
    }

    fn sample_bytes() -> Vec<u8> {
        let mut entries = Vec::new();
        entries.extend_from_slice(&2_i32.to_le_bytes()); // n entries
        entries.extend(cstr("0_0"));
        entries.extend_from_slice(&100_i64.to_le_bytes());
        entries.extend_from_slice(&4_i32.to_le_bytes());
        entries.extend(cstr("0_1"));
        entries.extend_from_slice(&500_i64.to_le_bytes());
        entries.extend_from_slice(&9_i32.to_le_bytes());

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(entries.len() as i32).to_le_bytes()); // nBytes
        bytes.extend(entries);
        bytes
    }

    #[test]
    fn parses_master_index_entries() {
        let bytes = sample_bytes();
        let mut results: Vec<MasterIndex> =
            parse_sync(MasterIndexParser::new(0), MemorySource::new(bytes)).collect::<Result<_>>().unwrap();
        let index = results.remove(0);
        assert_eq!(index.len(), 2);
        assert_eq!(index["0_0"], (100, 4));
        assert_eq!(index["0_1"], (500, 9));
    }

    #[test]
    fn expected_vectors_region_follows_the_entries() {
        let bytes = sample_bytes();
        let total_len = bytes.len() as u64;
        let acc = ByteAccumulator::with_data(bytes);
        let mut parser = MasterIndexParser::new(0);

        loop {
            match parser.step(&acc, false).unwrap() {
                Step::Result(ParseResult::Complete(_)) => break,
                Step::Request(_) => continue,
                Step::Result(ParseResult::Incomplete(_)) => unreachable!(),
            }
        }

        let region = parser.expected_vectors_region();
        assert_eq!(region.offset, total_len);
        assert_eq!(region.length, 0);
    }
}
