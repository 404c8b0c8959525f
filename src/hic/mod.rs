//! A pull-based reader for the Hi-C V8 contact-matrix format: header, master index,
//! per-matrix block directories, contact iteration and expected-value vectors, all
//! built on the same `Parser`/`Driver` machinery as the FASTA reader.

mod contacts;
mod expected_values;
mod header;
mod master_index;
mod matrix;
mod primitives;
mod reader;
mod types;

pub use contacts::ContactsParser;
pub use expected_values::ExpectedValuesParser;
pub use header::HeaderParser;
pub use master_index::MasterIndexParser;
pub use matrix::MatrixMetadataParser;
pub use reader::HicReader;
pub use types::{
    ContactRecord, ContactsKind, ExpectedValues, FileRegion, Header, MasterIndex, MatrixMetadata,
    Resolution, ResolutionMetadata, Unit,
};
