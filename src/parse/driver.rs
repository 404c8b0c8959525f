//! The driver that mediates between a `Source` and a `Parser`, running it as a lazy iterator.

use super::accumulator::ByteAccumulator;
use super::request::{ParseRequest, ParseResult, Step};
use super::source::Source;
use crate::error::{Error, Result};

/// Default chunk size for a `PartialRead` that does not specify `max_count`.
pub const DEFAULT_PARTIAL_CHUNK_SIZE: usize = 8 * 1024;

/// A cooperative parser coroutine, reimplemented as an explicit state machine: each
/// `step()` call returns exactly one suspension point instead of actually blocking.
///
/// `acc` is the *only* view a parser has onto its input; a parser never touches the
/// `Source` directly. `eof` is `true` exactly when the previous `PartialRead` this
/// parser issued was answered with zero bytes - parsers that never issue
/// `PartialRead` can ignore it.
pub trait Parser {
    type Output;

    fn step(&mut self, acc: &ByteAccumulator, eof: bool) -> Result<Step<Self::Output>>;
}

/// Runs `parser` against `source`, producing a lazy iterator of its emitted records.
pub fn parse_sync<P: Parser, S: Source>(parser: P, source: S) -> Driver<P, S> {
    Driver {
        parser,
        source,
        acc: ByteAccumulator::new(0),
        eof: false,
        done: false,
        partial_chunk_size: DEFAULT_PARTIAL_CHUNK_SIZE,
    }
}

/// The lazy sequence of records produced by driving a `Parser` against a `Source`.
/// Dropping it mid-iteration simply stops pulling; the source is closed by its own
/// `Drop` impl, not by the driver.
pub struct Driver<P, S> {
    parser: P,
    source: S,
    acc: ByteAccumulator,
    eof: bool,
    done: bool,
    partial_chunk_size: usize,
}

impl<P, S> Driver<P, S> {
    /// Overrides the default chunk size used for `PartialRead` requests that do not
    /// specify their own `max_count`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.partial_chunk_size = chunk_size;
        self
    }

    pub fn source(&self) -> &S { &self.source }
}

impl<P: Parser, S: Source> Iterator for Driver<P, S> {
    type Item = Result<P::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let step = match self.parser.step(&self.acc, self.eof) {
                Ok(step) => step,
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            };

            self.eof = false;

            match step {
                Step::Request(ParseRequest::ExactRead { count, source_position }) => {
                    if let Some(position) = source_position {
                        self.acc.clear(Some(position));
                    }

                    let start = self.acc.last_offset();
                    log::trace!("exact read: {} bytes at {}", count, start);

                    match self.source.read_at(start, count) {
                        Ok(bytes) => {
                            if bytes.len() != count {
                                log::debug!("exact read short: wanted {} got {}", count, bytes.len());
                                self.done = true;
                                return Some(Err(Error::UnexpectedEof { expected: count, got: bytes.len() }));
                            }
                            self.acc.append(&bytes);
                        }
                        Err(io_error) => {
                            self.done = true;
                            return Some(Err(Error::Io(io_error)));
                        }
                    }
                }

                Step::Request(ParseRequest::PartialRead { source_position, max_count }) => {
                    if let Some(position) = source_position {
                        self.acc.clear(Some(position));
                    }

                    let start = self.acc.last_offset();
                    let want = max_count.unwrap_or(self.partial_chunk_size);

                    match self.source.read_at(start, want) {
                        Ok(bytes) => {
                            self.eof = bytes.is_empty();
                            log::trace!("partial read: wanted up to {} at {}, got {}", want, start, bytes.len());
                            if !bytes.is_empty() {
                                self.acc.append(&bytes);
                            }
                        }
                        Err(io_error) => {
                            self.done = true;
                            return Some(Err(Error::Io(io_error)));
                        }
                    }
                }

                Step::Request(ParseRequest::CollapseBuffer { keep_from_offset }) => {
                    let end = self.acc.last_offset();
                    match keep_from_offset {
                        Some(start) => {
                            log::trace!("collapse buffer: keep [{}, {})", start, end);
                            self.acc.trim(start, end);
                        }
                        None => {
                            log::trace!("collapse buffer: clear entirely at {}", end);
                            self.acc.clear(Some(end));
                        }
                    }
                }

                // A top-level parser has no outer layer to pass through to; treat it
                // as a no-op and step again immediately.
                Step::Request(ParseRequest::PassthroughRequest) => continue,

                Step::Request(ParseRequest::Stop) => {
                    self.done = true;
                    return None;
                }

                Step::Result(ParseResult::Incomplete(value)) => return Some(Ok(value)),

                Step::Result(ParseResult::Complete(value)) => {
                    self.done = true;
                    return Some(Ok(value));
                }
            }
        }
    }
}
