//! `HicReader`: the stateful container that sequences the Hi-C sub-parsers against
//! one long-lived `Source`, in the order a V8 file actually has to be read in
//! (header before master index before any matrix, master index before expected
//! values). Each section is written exactly once by its own parser; there is no
//! shared mutable state beyond this container, a builder filled in one field at a
//! time (§9 "Global mutable state" design note).

use crate::domain::GenomicRange;
use crate::error::{Error, Result};
use crate::hic::contacts::{candidate_blocks, ContactsParser};
use crate::hic::expected_values::ExpectedValuesParser;
use crate::hic::header::HeaderParser;
use crate::hic::master_index::MasterIndexParser;
use crate::hic::matrix::MatrixMetadataParser;
use crate::hic::types::{master_index_key, ContactRecord, ContactsKind, ExpectedValues, FileRegion, Header, MatrixMetadata, Resolution};
use crate::parse::{ByteAccumulator, ParseRequest, ParseResult, Parser, Source, Step, DEFAULT_PARTIAL_CHUNK_SIZE};

#[cfg(feature = "rayon")]
use crate::hic::contacts::decode_and_filter_block;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Everything [`HicReader::iterate_contacts`] and
/// [`HicReader::iterate_contacts_parallel`] need once a chromosome pair and
/// resolution have been resolved to a concrete matrix: the candidate blocks in
/// ascending flat-block-number order, the bin ranges to filter to, and the
/// (chromosome-indexed) expected-value vector `kind` calls for, if any.
struct ContactsRequest {
    blocks: Vec<(i32, FileRegion)>,
    x_bins: (u32, u32),
    y_bins: (u32, u32),
    expected: Option<ExpectedValues>,
    chr_i: i32,
    chr_j: i32,
}

/// Drives `parser` against `source` to completion, the same request/response
/// protocol as [`crate::parse::Driver`] but borrowing the source instead of
/// consuming it, so `HicReader` can run several parsers in sequence against the
/// one file. `Incomplete` emissions accumulate; a `Complete` emission (or a clean
/// `Stop` after zero or more `Incomplete`s) ends the drive.
fn drive<P: Parser, S: Source>(mut parser: P, source: &mut S) -> Result<Vec<P::Output>> {
    let mut acc = ByteAccumulator::new(0);
    let mut eof = false;
    let mut results = Vec::new();

    loop {
        let step = parser.step(&acc, eof)?;
        eof = false;

        match step {
            Step::Request(ParseRequest::ExactRead { count, source_position }) => {
                if let Some(position) = source_position {
                    acc.clear(Some(position));
                }
                let start = acc.last_offset();
                let bytes = source.read_at(start, count)?;
                if bytes.len() != count {
                    return Err(Error::UnexpectedEof { expected: count, got: bytes.len() });
                }
                acc.append(&bytes);
            }

            Step::Request(ParseRequest::PartialRead { source_position, max_count }) => {
                if let Some(position) = source_position {
                    acc.clear(Some(position));
                }
                let start = acc.last_offset();
                let want = max_count.unwrap_or(DEFAULT_PARTIAL_CHUNK_SIZE);
                let bytes = source.read_at(start, want)?;
                eof = bytes.is_empty();
                if !bytes.is_empty() {
                    acc.append(&bytes);
                }
            }

            Step::Request(ParseRequest::CollapseBuffer { keep_from_offset }) => {
                let end = acc.last_offset();
                match keep_from_offset {
                    Some(start) => acc.trim(start, end),
                    None => acc.clear(Some(end)),
                }
            }

            Step::Request(ParseRequest::PassthroughRequest) => continue,

            Step::Request(ParseRequest::Stop) => return Ok(results),

            Step::Result(ParseResult::Incomplete(value)) => results.push(value),

            Step::Result(ParseResult::Complete(value)) => {
                results.push(value);
                return Ok(results);
            }
        }
    }
}

fn drive_one<P: Parser, S: Source>(parser: P, source: &mut S) -> Result<P::Output> {
    drive(parser, source)?.pop().ok_or(Error::StateError("parser completed without emitting a result"))
}

/// Sequences `read_header`, `read_master_index`, `get_matrix_metadatas`,
/// `iterate_contacts` and `read_expected_value_vectors` against one `Source`,
/// holding the sections already parsed so later calls can depend on earlier ones.
pub struct HicReader<S: Source> {
    source: S,
    header: Option<Header>,
    master_index: Option<crate::hic::types::MasterIndex>,
    expected_vectors_region: Option<FileRegion>,
    expected_values: Option<Vec<ExpectedValues>>,
}

impl<S: Source> HicReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            header: None,
            master_index: None,
            expected_vectors_region: None,
            expected_values: None,
        }
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Parses the file preamble. Safe to call more than once; later calls re-parse
    /// and replace the stored header.
    pub fn read_header(&mut self) -> Result<&Header> {
        let header = drive_one(HeaderParser::new(), &mut self.source)?;
        self.header = Some(header);
        Ok(self.header.as_ref().unwrap())
    }

    /// Parses the footer at `header.footer_position`. Requires [`Self::read_header`]
    /// to have run first.
    pub fn read_master_index(&mut self) -> Result<&crate::hic::types::MasterIndex> {
        let footer_position = self
            .header
            .as_ref()
            .ok_or(Error::StateError("read_master_index called before read_header"))?
            .footer_position;

        let mut parser = MasterIndexParser::new(footer_position);
        let index = drive_single(&mut parser, &mut self.source)?;
        self.expected_vectors_region = Some(parser.expected_vectors_region());
        self.master_index = Some(index);
        Ok(self.master_index.as_ref().unwrap())
    }

    /// Parses one chromosome-pair matrix's metadata. Requires
    /// [`Self::read_master_index`] to have run first.
    pub fn get_matrix_metadatas(&mut self, chr1: &str, chr2: &str) -> Result<MatrixMetadata> {
        let header = self.header.as_ref().ok_or(Error::StateError("get_matrix_metadatas called before read_header"))?;
        let master_index = self
            .master_index
            .as_ref()
            .ok_or(Error::StateError("get_matrix_metadatas called before read_master_index"))?;

        let (i, j) = ordered_chromosome_indices(header, chr1, chr2)?;
        let key = master_index_key(i, j);
        let (file_position, length) =
            *master_index.get(&key).ok_or_else(|| Error::UnknownMatrix(key.clone()))?;

        let region = FileRegion { offset: file_position.max(0) as u64, length: length.max(0) as u32 };
        drive_one(MatrixMetadataParser::new(region), &mut self.source)
    }

    /// Parses both expected-value vector groups, caching the result for subsequent
    /// calls. Requires [`Self::read_master_index`] to have run first.
    pub fn read_expected_value_vectors(&mut self) -> Result<&[ExpectedValues]> {
        if self.expected_values.is_none() {
            let region = self
                .expected_vectors_region
                .ok_or(Error::StateError("read_expected_value_vectors called before read_master_index"))?;
            let vectors = drive(ExpectedValuesParser::new(region.offset), &mut self.source)?;
            self.expected_values = Some(vectors);
        }
        Ok(self.expected_values.as_ref().unwrap())
    }

    /// Resolves `x`, `y` and `resolution` to the concrete matrix, candidate blocks
    /// and (if `kind` needs one) expected-value vector shared by both the sequential
    /// and parallel contact-iteration paths. Requires [`Self::read_header`] and
    /// [`Self::read_master_index`] to have run first.
    fn resolve_contacts_request(
        &mut self,
        x: &GenomicRange,
        y: &GenomicRange,
        resolution: Resolution,
        kind: &ContactsKind,
    ) -> Result<ContactsRequest> {
        let header = self.header.as_ref().ok_or(Error::StateError("iterate_contacts called before read_header"))?;
        let (mut i, mut j) = (
            header.genome.index_of(&x.chromosome_name)?,
            header.genome.index_of(&y.chromosome_name)?,
        );

        let (mut x_range, mut y_range) = (x, y);
        if i > j {
            std::mem::swap(&mut i, &mut j);
            std::mem::swap(&mut x_range, &mut y_range);
        }

        let metadata = self.get_matrix_metadatas(&x_range.chromosome_name, &y_range.chromosome_name)?;
        let resolution_metadata = metadata
            .for_resolution(resolution)
            .cloned()
            .ok_or(Error::ResolutionNotFound)?;

        let x_bins = x_range.to_bin_range(resolution_metadata.bin_size);
        let y_bins = y_range.to_bin_range(resolution_metadata.bin_size);
        let blocks = candidate_blocks(&resolution_metadata, x_bins, y_bins);

        let expected = match kind {
            ContactsKind::Observed => None,
            ContactsKind::OverExpected => {
                self.read_expected_value_vectors()?;
                self.expected_values
                    .as_ref()
                    .unwrap()
                    .iter()
                    .find(|v| v.normalization_type.is_none() && v.resolution == resolution)
                    .cloned()
            }
            ContactsKind::Normalized(name) => {
                self.read_expected_value_vectors()?;
                self.expected_values
                    .as_ref()
                    .unwrap()
                    .iter()
                    .find(|v| v.normalization_type.as_deref() == Some(name.as_str()) && v.resolution == resolution)
                    .cloned()
            }
        };

        Ok(ContactsRequest { blocks, x_bins, y_bins, expected, chr_i: i as i32, chr_j: j as i32 })
    }

    /// Iterates the contact records between `x` and `y` at `resolution`, filtered to
    /// their ranges and optionally normalized per `kind`. Records are returned in
    /// ascending flat-block-number order, then file order within each block.
    pub fn iterate_contacts(
        &mut self,
        x: &GenomicRange,
        y: &GenomicRange,
        resolution: Resolution,
        kind: ContactsKind,
    ) -> Result<Vec<ContactRecord>> {
        let request = self.resolve_contacts_request(x, y, resolution, &kind)?;
        let parser = ContactsParser::with_normalizer(
            request.blocks,
            request.x_bins,
            request.y_bins,
            kind,
            request.expected.as_ref(),
            request.chr_i,
            request.chr_j,
        );
        drive(parser, &mut self.source)
    }

    /// Like [`Self::iterate_contacts`], but decompresses and filters the candidate
    /// blocks concurrently via `rayon` instead of one at a time through the
    /// incremental parser. Each block's bytes are first read from `self.source`
    /// sequentially (the `Source` itself is not required to be thread-safe), then
    /// handed to a parallel iterator; results are re-sorted back into ascending
    /// flat-block-number order before being flattened, so the returned records are
    /// in the exact same order [`Self::iterate_contacts`] would produce them in.
    #[cfg(feature = "rayon")]
    pub fn iterate_contacts_parallel(
        &mut self,
        x: &GenomicRange,
        y: &GenomicRange,
        resolution: Resolution,
        kind: ContactsKind,
    ) -> Result<Vec<ContactRecord>> {
        let request = self.resolve_contacts_request(x, y, resolution, &kind)?;

        let mut compressed_blocks = Vec::with_capacity(request.blocks.len());
        for (number, region) in &request.blocks {
            let bytes = self.source.read_at(region.offset, region.length as usize)?;
            if bytes.len() != region.length as usize {
                return Err(Error::UnexpectedEof { expected: region.length as usize, got: bytes.len() });
            }
            compressed_blocks.push((*number, bytes));
        }

        let mut decoded: Vec<(i32, Vec<ContactRecord>)> = compressed_blocks
            .into_par_iter()
            .map(|(number, compressed)| {
                let records = decode_and_filter_block(
                    &compressed,
                    request.x_bins,
                    request.y_bins,
                    &kind,
                    request.expected.as_ref(),
                    request.chr_i,
                    request.chr_j,
                )?;
                Ok((number, records))
            })
            .collect::<Result<Vec<_>>>()?;

        decoded.sort_unstable_by_key(|(number, _)| *number);
        Ok(decoded.into_iter().flat_map(|(_, records)| records).collect())
    }
}

/// Resolves two chromosome names to `(i, j)` with `i <= j`, the master index's own
/// ordering convention (§4.5.4 step 1).
fn ordered_chromosome_indices(header: &Header, chr1: &str, chr2: &str) -> Result<(usize, usize)> {
    let i = header.genome.index_of(chr1)?;
    let j = header.genome.index_of(chr2)?;
    Ok(if i <= j { (i, j) } else { (j, i) })
}

/// Like [`drive_one`], but for a parser driven by a caller-held `&mut` reference
/// (needed when the caller still wants to call methods on the parser, such as
/// [`MasterIndexParser::expected_vectors_region`], after it completes).
fn drive_single<P: Parser, S: Source>(parser: &mut P, source: &mut S) -> Result<P::Output> {
    let mut acc = ByteAccumulator::new(0);
    let mut eof = false;

    loop {
        let step = parser.step(&acc, eof)?;
        eof = false;

        match step {
            Step::Request(ParseRequest::ExactRead { count, source_position }) => {
                if let Some(position) = source_position {
                    acc.clear(Some(position));
                }
                let start = acc.last_offset();
                let bytes = source.read_at(start, count)?;
                if bytes.len() != count {
                    return Err(Error::UnexpectedEof { expected: count, got: bytes.len() });
                }
                acc.append(&bytes);
            }

            Step::Request(ParseRequest::PartialRead { source_position, max_count }) => {
                if let Some(position) = source_position {
                    acc.clear(Some(position));
                }
                let start = acc.last_offset();
                let want = max_count.unwrap_or(DEFAULT_PARTIAL_CHUNK_SIZE);
                let bytes = source.read_at(start, want)?;
                eof = bytes.is_empty();
                if !bytes.is_empty() {
                    acc.append(&bytes);
                }
            }

            Step::Request(ParseRequest::CollapseBuffer { keep_from_offset }) => {
                let end = acc.last_offset();
                match keep_from_offset {
                    Some(start) => acc.trim(start, end),
                    None => acc.clear(Some(end)),
                }
            }

            Step::Request(ParseRequest::PassthroughRequest) => continue,

            Step::Request(ParseRequest::Stop) => {
                return Err(Error::StateError("parser stopped without emitting a Complete result"));
            }

            Step::Result(ParseResult::Incomplete(_)) => continue,

            Step::Result(ParseResult::Complete(value)) => return Ok(value),
        }
    }
}
