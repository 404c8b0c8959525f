//! Error taxonomy shared by the parsing framework, the FASTA iterator and the Hi-C reader.
//!
//! Every error aborts the parser at the point of detection; there is no local recovery.
//! The driver surfaces the error to the consumer as the next `Iterator::next()` value.

pub type Result<T> = std::result::Result<T, Error>;
pub type UnitResult = Result<()>;

/// All the ways a parse can fail.
///
/// Kinds mirror §7 of the design: lookup failures at the domain layer are kept
/// distinct from byte-level format violations, which are themselves distinct
/// from the preamble-specific Hi-C checks.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of file: expected {expected} more bytes, got {got}")]
    UnexpectedEof { expected: usize, got: usize },

    #[error("not a Hi-C file: missing \"HIC\\0\" magic")]
    InvalidMagic,

    #[error("unsupported Hi-C version {found} (only version 8 is supported)")]
    UnsupportedVersion { found: i32 },

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("unknown matrix for key {0:?}")]
    UnknownMatrix(String),

    #[error("resolution not found")]
    ResolutionNotFound,

    #[error("chromosome not found: {0:?}")]
    ChromosomeNotFound(String),

    #[error("validation failed: expected {expected}, found {found}")]
    Validation { expected: String, found: String },

    #[error("invalid state: {0}")]
    StateError(&'static str),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidFormat(message.into())
    }

    pub fn validation(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::Validation { expected: expected.into(), found: found.into() }
    }
}
