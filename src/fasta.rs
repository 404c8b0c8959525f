//! A pull-based FASTA reader built on the same `Parser`/`Driver` machinery as the
//! Hi-C reader. Records are yielded as `LazyRecord`s: the header is decoded eagerly
//! (it is needed to detect record boundaries anyway), but the sequence itself is only
//! concatenated and validated on demand, since callers frequently only need a subset
//! of records' sequences, or only their headers.

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::parse::{ByteAccumulator, ParseRequest, ParseResult, Parser, Step};

/// A single `>`-delimited FASTA entry. Sequence decoding is deferred until
/// [`LazyRecord::sequence`] or [`LazyRecord::sequence_strict`] is called.
#[derive(Debug, Clone)]
pub struct LazyRecord {
    header: String,
    raw: Vec<u8>,
    newline_offsets: SmallVec<[u64; 8]>,
}

impl LazyRecord {
    pub fn header(&self) -> &str {
        &self.header
    }

    /// An upper bound on the decoded sequence length (includes stripped newlines,
    /// so the real length is always `<=` this).
    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    /// Concatenates the sequence lines, stripping line endings, without validating
    /// the alphabet.
    pub fn sequence(&self) -> Vec<u8> {
        self.decode(false).expect("non-strict decode never fails")
    }

    /// As [`LazyRecord::sequence`], but rejects any byte that is not a recognized
    /// IUPAC nucleotide or amino acid code (or the `-`/`*` gap and stop markers).
    pub fn sequence_strict(&self) -> Result<Vec<u8>> {
        self.decode(true)
    }

    fn decode(&self, strict: bool) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.raw.len());

        for window in self.newline_offsets.windows(2) {
            let (a, b) = (window[0], window[1]);
            if b <= a + 1 {
                continue; // blank line
            }

            let mut line = &self.raw[(a + 1) as usize..b as usize];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }

            if strict {
                for &byte in line {
                    if !is_sequence_symbol(byte) {
                        return Err(Error::validation(
                            "IUPAC sequence symbol",
                            format!("byte {:#04x} in record {:?}", byte, self.header),
                        ));
                    }
                }
            }

            out.extend_from_slice(line);
        }

        Ok(out)
    }
}

fn is_sequence_symbol(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'-' || byte == b'*'
}

/// The offset of the next line-break byte (`\n` or `\r`) at or after `from`. CR, LF,
/// and CRLF are all accepted: a CRLF pair is found one byte at a time, which yields a
/// zero-length "line" between the two bytes that `decode` already treats as blank.
fn find_line_break(acc: &ByteAccumulator, from: u64) -> Option<u64> {
    match (acc.find_byte(b'\n', from), acc.find_byte(b'\r', from)) {
        (Some(lf), Some(cr)) => Some(lf.min(cr)),
        (Some(lf), None) => Some(lf),
        (None, Some(cr)) => Some(cr),
        (None, None) => None,
    }
}

/// Governs whether sequence lines are validated against the IUPAC alphabet as
/// records are scanned out of the file, or only when a caller asks for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Lazy,
    Strict,
}

enum State {
    Start,
    ScanningHeader { read_start: u64 },
    ScanningSequence { read_start: u64, newline_offsets: SmallVec<[u64; 8]> },
}

/// A [`Parser`] that yields one [`LazyRecord`] per `>`-delimited entry.
pub struct FastaRecords {
    state: State,
    pos: u64,
    header: String,
    validation: Validation,
    pending_collapse: Option<u64>,
    finished: bool,
}

impl FastaRecords {
    pub fn new(validation: Validation) -> Self {
        Self {
            state: State::Start,
            pos: 0,
            header: String::new(),
            validation,
            pending_collapse: None,
            finished: false,
        }
    }

    fn finish_record(
        &mut self,
        acc: &ByteAccumulator,
        read_start: u64,
        mut newline_offsets: SmallVec<[u64; 8]>,
        record_end: u64,
    ) -> Result<LazyRecord> {
        newline_offsets.push(record_end - read_start);
        let raw = acc.get_range(read_start, record_end);
        let header = std::mem::take(&mut self.header);

        let record = LazyRecord { header, raw, newline_offsets };

        if self.validation == Validation::Strict {
            let sequence = record.sequence_strict()?;
            if sequence.is_empty() {
                return Err(Error::invalid(format!("Empty sequence for header {:?}", record.header)));
            }
        }

        Ok(record)
    }
}

impl Parser for FastaRecords {
    type Output = LazyRecord;

    fn step(&mut self, acc: &ByteAccumulator, eof: bool) -> Result<Step<Self::Output>> {
        if self.finished {
            return Ok(Step::Request(ParseRequest::Stop));
        }

        if let Some(keep_from) = self.pending_collapse.take() {
            return Ok(Step::Request(ParseRequest::CollapseBuffer { keep_from_offset: Some(keep_from) }));
        }

        loop {
            if self.pos >= acc.last_offset() {
                if !eof {
                    return Ok(Step::Request(ParseRequest::PartialRead { source_position: None, max_count: None }));
                }

                // True end of input. Flush whatever record (if any) was in progress.
                return match std::mem::replace(&mut self.state, State::Start) {
                    State::Start => {
                        self.finished = true;
                        Ok(Step::Request(ParseRequest::Stop))
                    }
                    State::ScanningHeader { .. } => {
                        Err(Error::invalid("FASTA record truncated: header line has no terminator"))
                    }
                    State::ScanningSequence { read_start, newline_offsets } => {
                        let end = acc.last_offset();
                        let record = self.finish_record(acc, read_start, newline_offsets, end)?;
                        self.finished = true;
                        self.pending_collapse = Some(end);
                        Ok(Step::Result(ParseResult::Complete(record)))
                    }
                };
            }

            match &self.state {
                State::Start => {
                    let byte = acc.get_byte(self.pos);
                    if byte != b'>' {
                        return Err(Error::invalid(format!(
                            "expected '>' at start of FASTA record, found byte {:#04x}",
                            byte
                        )));
                    }
                    let read_start = self.pos;
                    self.pos += 1;
                    self.state = State::ScanningHeader { read_start };
                }

                State::ScanningHeader { read_start } => {
                    let read_start = *read_start;
                    match find_line_break(acc, self.pos) {
                        Some(nl) => {
                            self.header =
                                String::from_utf8_lossy(acc.view_range(read_start + 1, nl)).into_owned();
                            self.pos = nl + 1;
                            self.state = State::ScanningSequence {
                                read_start,
                                newline_offsets: SmallVec::from_elem(nl - read_start, 1),
                            };
                        }
                        None => {
                            return Ok(Step::Request(ParseRequest::PartialRead {
                                source_position: None,
                                max_count: None,
                            }));
                        }
                    }
                }

                State::ScanningSequence { read_start, newline_offsets } => {
                    let read_start = *read_start;

                    if acc.get_byte(self.pos) == b'>' {
                        let record_end = self.pos;
                        let newline_offsets = newline_offsets.clone();
                        let record = self.finish_record(acc, read_start, newline_offsets, record_end)?;
                        self.state = State::Start;
                        self.pending_collapse = Some(record_end);
                        return Ok(Step::Result(ParseResult::Incomplete(record)));
                    }

                    match find_line_break(acc, self.pos) {
                        Some(nl) => {
                            let mut offsets = newline_offsets.clone();
                            offsets.push(nl - read_start);
                            self.pos = nl + 1;
                            self.state = State::ScanningSequence { read_start, newline_offsets: offsets };
                        }
                        None => {
                            return Ok(Step::Request(ParseRequest::PartialRead {
                                source_position: None,
                                max_count: None,
                            }));
                        }
                    }
                }
            }
        }
    }
}
