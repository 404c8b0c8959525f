//! The values a parser yields: requests for more bytes, buffer hints, and record emissions.

/// A demand issued by a parser to its driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseRequest {
    /// Demand exactly `count` more bytes. If `source_position` is set, the driver
    /// repositions the source absolutely first and resets the accumulator's origin
    /// to that position. A short read here is always fatal (`Error::UnexpectedEof`).
    ExactRead { count: usize, source_position: Option<u64> },

    /// Demand at least one more byte; the driver may supply up to `max_count` (or its
    /// own default chunk size). A short read of zero bytes means end of stream, which
    /// is reported back to the parser as `eof = true` on its next `step()` call.
    PartialRead { source_position: Option<u64>, max_count: Option<usize> },

    /// A hint that bytes before `keep_from_offset` (or all bytes, if `None`) are no
    /// longer needed and may be released to bound memory use.
    CollapseBuffer { keep_from_offset: Option<u64> },

    /// Used only by a nested parser (see the decompress adapter): yield control to
    /// the outer layer without emitting a record. A top-level driver treats this as
    /// a no-op and re-invokes the parser immediately.
    PassthroughRequest,

    /// Terminate parsing without emitting anything further.
    Stop,
}

/// A value emitted by a parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult<T> {
    /// The final emission of a composite parser; ends the section.
    Complete(T),

    /// One record among many in a streaming parser.
    Incomplete(T),
}

impl<T> ParseResult<T> {
    pub fn into_inner(self) -> T {
        match self {
            ParseResult::Complete(v) | ParseResult::Incomplete(v) => v,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ParseResult::Complete(_))
    }
}

/// One suspension point of a parser: either a request the driver must service, or a
/// value ready to be handed to the consumer.
#[derive(Debug, Clone)]
pub enum Step<T> {
    Request(ParseRequest),
    Result(ParseResult<T>),
}
