//! Iterates the contact records of one chromosome-pair matrix at one resolution:
//! computes which blocks overlap the requested bin ranges, reads and zlib-inflates
//! each one in ascending flat-block-number order, and yields the `(bin_x, bin_y,
//! value)` triples that fall inside the requested ranges, optionally normalized.

use std::collections::VecDeque;

use flate2::read::ZlibDecoder;
use std::io::Read;

use crate::error::{Error, Result};
use crate::hic::types::{ContactRecord, ContactsKind, ExpectedValues, FileRegion, ResolutionMetadata};
use crate::parse::{ByteAccumulator, ParseRequest, ParseResult, Parser, Step};

/// The bin-grid block numbers (and their file regions) that might hold contacts for
/// a requested pair of bin ranges, in the ascending order blocks must be emitted in.
pub(crate) fn candidate_blocks(
    metadata: &ResolutionMetadata,
    x_bins: (u32, u32),
    y_bins: (u32, u32),
) -> Vec<(i32, FileRegion)> {
    let block_size = metadata.block_size.max(1);
    let x_block_start = x_bins.0 / block_size;
    let x_block_end = (x_bins.1 + block_size - 1) / block_size;
    let y_block_start = y_bins.0 / block_size;
    let y_block_end = (y_bins.1 + block_size - 1) / block_size;

    let mut numbers = Vec::new();
    for x_block in x_block_start..x_block_end.max(x_block_start) {
        for y_block in y_block_start..y_block_end.max(y_block_start) {
            numbers.push(metadata.flat_block_number(x_block, y_block));
        }
    }
    numbers.sort_unstable();
    numbers.dedup();

    numbers
        .into_iter()
        .filter_map(|n| metadata.block_index.get(&n).map(|region| (n, *region)))
        .collect()
}

/// Divides raw counts by an expected-value vector and per-chromosome scale factors,
/// used for both `ContactsKind::OverExpected` (unnormalized vector, scale factors
/// default to 1.0) and `ContactsKind::Normalized` (normalized vector and scales).
pub(crate) struct Normalizer<'a> {
    expected: &'a ExpectedValues,
    chr_i: i32,
    chr_j: i32,
}

impl<'a> Normalizer<'a> {
    pub(crate) fn new(expected: &'a ExpectedValues, chr_i: i32, chr_j: i32) -> Self {
        Self { expected, chr_i, chr_j }
    }

    fn apply(&self, bin_x: i32, bin_y: i32, raw: f64) -> f64 {
        let distance = (bin_x as i64 - bin_y as i64).abs();
        let expected = self.expected.value_for_distance(distance);
        let scale = self.expected.scale_factor(self.chr_i) * self.expected.scale_factor(self.chr_j);
        raw / (expected * scale)
    }
}

fn normalized_value(kind: &ContactsKind, normalizer: Option<&Normalizer>, record: &ContactRecord) -> f64 {
    match (kind, normalizer) {
        (ContactsKind::Observed, _) => record.value,
        (ContactsKind::OverExpected, Some(norm)) | (ContactsKind::Normalized(_), Some(norm)) => {
            norm.apply(record.bin_x, record.bin_y, record.value)
        }
        (ContactsKind::OverExpected, None) | (ContactsKind::Normalized(_), None) => record.value,
    }
}

fn in_range(record: &ContactRecord, x_bins: (u32, u32), y_bins: (u32, u32)) -> bool {
    let x_in = record.bin_x >= x_bins.0 as i32 && (record.bin_x as u32) < x_bins.1;
    let y_in = record.bin_y >= y_bins.0 as i32 && (record.bin_y as u32) < y_bins.1;
    x_in && y_in
}

/// Decodes one zlib-compressed contact block into its raw (unfiltered,
/// un-normalized) records, in file order. Shared by the sequential
/// [`ContactsParser`] and [`crate::hic::HicReader::iterate_contacts_parallel`]'s
/// per-block decompression.
pub(crate) fn decode_contact_block(compressed: &[u8]) -> Result<Vec<ContactRecord>> {
    let mut inflater = ZlibDecoder::new(compressed);
    let mut blob = Vec::new();
    inflater.read_to_end(&mut blob).map_err(|e| Error::invalid(format!("contact block zlib error: {}", e)))?;

    let mut offset = 0_usize;
    let (_n_records, next) = crate::io::read_i32_le(&blob, offset)?;
    offset = next;
    let (bin_x_offset, next) = crate::io::read_i32_le(&blob, offset)?;
    offset = next;
    let (bin_y_offset, next) = crate::io::read_i32_le(&blob, offset)?;
    offset = next;
    let (use_float_byte, next) = crate::io::read_u8(&blob, offset)?;
    offset = next;
    let use_float = use_float_byte != 0;
    let (representation, next) = crate::io::read_u8(&blob, offset)?;
    offset = next;

    let mut records = Vec::new();

    let mut read_value = |blob: &[u8], offset: &mut usize| -> Result<f64> {
        if use_float {
            let (v, next) = crate::io::read_f32_le(blob, *offset)?;
            *offset = next;
            Ok(v as f64)
        } else {
            let (v, next) = crate::io::read_i16_le(blob, *offset)?;
            *offset = next;
            Ok(v as f64)
        }
    };

    match representation {
        1 => {
            let (row_count, next) = crate::io::read_i16_le(&blob, offset)?;
            offset = next;
            for _ in 0..row_count {
                let (row_number, next) = crate::io::read_i16_le(&blob, offset)?;
                offset = next;
                if row_number < 0 {
                    return Err(Error::invalid("contact block: negative row number"));
                }
                let (record_count, next) = crate::io::read_i16_le(&blob, offset)?;
                offset = next;
                for _ in 0..record_count {
                    let (col_delta, next) = crate::io::read_i16_le(&blob, offset)?;
                    offset = next;
                    let value = read_value(&blob, &mut offset)?;
                    records.push(ContactRecord {
                        bin_x: bin_x_offset + col_delta as i32,
                        bin_y: bin_y_offset + row_number as i32,
                        value,
                    });
                }
            }
        }
        2 => {
            let (n_points, next) = crate::io::read_i32_le(&blob, offset)?;
            offset = next;
            let (width, next) = crate::io::read_i16_le(&blob, offset)?;
            offset = next;
            let width = width.max(1) as i32;
            for k in 0..n_points {
                let row = k / width;
                let col = k % width;
                let value = read_value(&blob, &mut offset)?;
                records.push(ContactRecord { bin_x: bin_x_offset + col, bin_y: bin_y_offset + row, value });
            }
        }
        other => return Err(Error::invalid(format!("contact block: unsupported representation {}", other))),
    }

    Ok(records)
}

/// Decodes, range-filters and normalizes one block in a single call, the shape
/// `iterate_contacts_parallel` needs since each block is handled by an independent
/// rayon task with no shared `ContactsParser` state.
pub(crate) fn decode_and_filter_block(
    compressed: &[u8],
    x_bins: (u32, u32),
    y_bins: (u32, u32),
    kind: &ContactsKind,
    expected: Option<&ExpectedValues>,
    chr_i: i32,
    chr_j: i32,
) -> Result<Vec<ContactRecord>> {
    let normalizer = expected.map(|expected| Normalizer::new(expected, chr_i, chr_j));
    let records = decode_contact_block(compressed)?;
    Ok(records
        .into_iter()
        .filter(|record| in_range(record, x_bins, y_bins))
        .map(|record| ContactRecord {
            bin_x: record.bin_x,
            bin_y: record.bin_y,
            value: normalized_value(kind, normalizer.as_ref(), &record),
        })
        .collect())
}

enum Phase {
    NextBlock,
    RequestBlock(FileRegion),
    DecodeBlock(FileRegion),
    Emit,
    Done,
}

/// A [`Parser`] that yields `Incomplete(ContactRecord)` for every contact inside the
/// requested ranges, ending with `Stop`.
pub struct ContactsParser<'a> {
    phase: Phase,
    blocks: VecDeque<(i32, FileRegion)>,
    pending: VecDeque<ContactRecord>,
    x_bins: (u32, u32),
    y_bins: (u32, u32),
    kind: ContactsKind,
    normalizer: Option<Normalizer<'a>>,
}

impl<'a> ContactsParser<'a> {
    pub fn new(
        blocks: Vec<(i32, FileRegion)>,
        x_bins: (u32, u32),
        y_bins: (u32, u32),
        kind: ContactsKind,
        normalizer: Option<Normalizer<'a>>,
    ) -> Self {
        Self {
            phase: Phase::NextBlock,
            blocks: blocks.into(),
            pending: VecDeque::new(),
            x_bins,
            y_bins,
            kind,
            normalizer,
        }
    }

    pub fn with_normalizer(
        blocks: Vec<(i32, FileRegion)>,
        x_bins: (u32, u32),
        y_bins: (u32, u32),
        kind: ContactsKind,
        expected: Option<&'a ExpectedValues>,
        chr_i: i32,
        chr_j: i32,
    ) -> Self {
        let normalizer = expected.map(|expected| Normalizer { expected, chr_i, chr_j });
        Self::new(blocks, x_bins, y_bins, kind, normalizer)
    }

    fn decode_block(&self, compressed: &[u8]) -> Result<Vec<ContactRecord>> {
        let records = decode_contact_block(compressed)?;
        Ok(records
            .into_iter()
            .filter(|record| in_range(record, self.x_bins, self.y_bins))
            .map(|record| ContactRecord {
                bin_x: record.bin_x,
                bin_y: record.bin_y,
                value: normalized_value(&self.kind, self.normalizer.as_ref(), &record),
            })
            .collect())
    }
}

impl<'a> Parser for ContactsParser<'a> {
    type Output = ContactRecord;

    fn step(&mut self, acc: &ByteAccumulator, _eof: bool) -> Result<Step<Self::Output>> {
        loop {
            match &self.phase {
                Phase::NextBlock => match self.blocks.pop_front() {
                    Some((_number, region)) => self.phase = Phase::RequestBlock(region),
                    None => self.phase = Phase::Done,
                },

                Phase::RequestBlock(region) => {
                    let region = *region;
                    self.phase = Phase::DecodeBlock(region);
                    // Each block is its own self-contained ExactRead at its own file
                    // position; the accumulator never needs more than one block's
                    // worth of compressed bytes buffered at a time.
                    return Ok(Step::Request(ParseRequest::ExactRead {
                        count: region.length as usize,
                        source_position: Some(region.offset),
                    }));
                }

                Phase::DecodeBlock(region) => {
                    let region = *region;
                    let compressed = acc.get_range(region.offset, region.offset + region.length as u64);
                    self.pending = self.decode_block(&compressed)?.into();
                    self.phase = Phase::Emit;
                }

                Phase::Emit => match self.pending.pop_front() {
                    Some(record) => return Ok(Step::Result(ParseResult::Incomplete(record))),
                    None => self.phase = Phase::NextBlock,
                },

                Phase::Done => return Ok(Step::Request(ParseRequest::Stop)),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::{parse_sync, MemorySource};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// A representation-1 (list-of-rows) block: two rows, two records each.
    fn representation_one_block() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&4_i32.to_le_bytes()); // n records
        raw.extend_from_slice(&0_i32.to_le_bytes()); // bin x offset
        raw.extend_from_slice(&0_i32.to_le_bytes()); // bin y offset
        raw.push(1); // use_float
        raw.push(1); // representation

        raw.extend_from_slice(&2_i16.to_le_bytes()); // row count
        raw.extend_from_slice(&0_i16.to_le_bytes()); // row number 0
        raw.extend_from_slice(&2_i16.to_le_bytes()); // record count
        raw.extend_from_slice(&0_i16.to_le_bytes()); // col delta
        raw.extend_from_slice(&5.0_f32.to_le_bytes());
        raw.extend_from_slice(&1_i16.to_le_bytes()); // col delta
        raw.extend_from_slice(&6.0_f32.to_le_bytes());

        raw.extend_from_slice(&1_i16.to_le_bytes()); // row number 1
        raw.extend_from_slice(&2_i16.to_le_bytes()); // record count
        raw.extend_from_slice(&0_i16.to_le_bytes());
        raw.extend_from_slice(&7.0_f32.to_le_bytes());
        raw.extend_from_slice(&1_i16.to_le_bytes());
        raw.extend_from_slice(&8.0_f32.to_le_bytes());

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        encoder.finish().unwrap()
    }

    fn metadata_with_block(compressed: Vec<u8>) -> ResolutionMetadata {
        let mut block_index = std::collections::BTreeMap::new();
        block_index.insert(0, FileRegion { offset: 0, length: compressed.len() as u32 });
        ResolutionMetadata {
            resolution: crate::hic::types::Resolution::bp(10000),
            bin_size: 10000,
            block_size: 1000,
            block_column_count: 1,
            sum_counts: 26.0,
            block_index,
        }
    }

    #[test]
    fn candidate_blocks_finds_the_overlapping_block() {
        let compressed = representation_one_block();
        let metadata = metadata_with_block(compressed);
        let blocks = candidate_blocks(&metadata, (0, 10), (0, 10));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].0, 0);
    }

    #[test]
    fn iterates_observed_contacts_within_range() {
        let compressed = representation_one_block();
        let metadata = metadata_with_block(compressed.clone());
        let blocks = candidate_blocks(&metadata, (0, 10), (0, 10));

        let parser = ContactsParser::new(blocks, (0, 10), (0, 10), ContactsKind::Observed, None);
        let records: Vec<ContactRecord> =
            parse_sync(parser, MemorySource::new(compressed)).collect::<Result<_>>().unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0], ContactRecord { bin_x: 0, bin_y: 0, value: 5.0 });
        assert_eq!(records[3], ContactRecord { bin_x: 1, bin_y: 1, value: 8.0 });
    }

    #[test]
    fn range_filter_excludes_records_outside_the_window() {
        let compressed = representation_one_block();
        let metadata = metadata_with_block(compressed.clone());
        let blocks = candidate_blocks(&metadata, (0, 10), (0, 10));

        // Only bin_x in [0, 1) survives.
        let parser = ContactsParser::new(blocks, (0, 1), (0, 10), ContactsKind::Observed, None);
        let records: Vec<ContactRecord> =
            parse_sync(parser, MemorySource::new(compressed)).collect::<Result<_>>().unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.bin_x == 0));
    }

    #[test]
    fn normalizes_against_expected_values_and_scale_factors() {
        let compressed = representation_one_block();
        let metadata = metadata_with_block(compressed.clone());
        let blocks = candidate_blocks(&metadata, (0, 10), (0, 10));

        let expected = ExpectedValues {
            normalization_type: Some("VC".to_string()),
            resolution: crate::hic::types::Resolution::bp(10000),
            values: vec![2.0],
            chr_scale_factors: vec![(0, 2.0)],
        };

        let parser = ContactsParser::with_normalizer(
            blocks,
            (0, 10),
            (0, 10),
            ContactsKind::Normalized("VC".to_string()),
            Some(&expected),
            0,
            0,
        );
        let records: Vec<ContactRecord> =
            parse_sync(parser, MemorySource::new(compressed)).collect::<Result<_>>().unwrap();

        // raw 5.0 / (expected(0) * scale(0) * scale(0)) = 5.0 / (2.0 * 2.0 * 2.0)
        assert_eq!(records[0].value, 5.0 / 8.0);
    }
}
