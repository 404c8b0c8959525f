#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,
    missing_debug_implementations,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
    redundant_semicolon
)]

#![forbid(unsafe_code)]

//! A bioinformatics toolkit built around a pull-based, resumable byte-stream
//! parsing framework: a [`parse::Parser`] never owns its input, it only ever
//! returns the next thing it needs (more bytes, a buffer trim) or the next
//! thing it has produced, and a [`parse::Driver`] is the only component that
//! talks to a [`parse::Source`].
//!
//! Two concrete parsers are built on that framework: [`fasta`] and [`hic`].
//! [`decompress`] is a parser transformer that lets either one run forward
//! over a zlib-compressed stream without knowing compression is involved.

pub mod decompress;
pub mod domain;
pub mod error;
pub mod fasta;
pub mod hic;
pub mod io;
pub mod parse;

/// Re-exports of the types most callers need for reading FASTA and Hi-C files.
pub mod prelude {
    pub use crate::decompress::ZlibDecode;
    pub use crate::domain::{Chromosome, GenomicRange, IndexedGenome, Strand};
    pub use crate::error::{Error, Result};
    pub use crate::fasta::{FastaRecords, LazyRecord, Validation};
    pub use crate::hic::{ContactRecord, ContactsKind, HicReader, Resolution, Unit};
    pub use crate::parse::{parse_sync, FileSource, MemorySource, Source};
}
