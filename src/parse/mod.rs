//! The resumable, pull-based parsing framework underlying both the FASTA reader and
//! the Hi-C reader. A `Parser` never owns its input; it is driven by a `Driver` that
//! owns a `Source` and feeds it bytes into a `ByteAccumulator` on demand.

mod accumulator;
mod cursor;
mod driver;
mod request;
mod source;

pub use accumulator::ByteAccumulator;
pub use cursor::Cursor;
pub use driver::{parse_sync, Driver, Parser, DEFAULT_PARTIAL_CHUNK_SIZE};
pub use request::{ParseRequest, ParseResult, Step};
pub use source::{FileSource, MemorySource, Source};
