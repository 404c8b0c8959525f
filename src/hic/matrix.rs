//! Parses one chromosome-pair matrix's metadata: one entry per stored resolution,
//! each carrying the block dimensions needed to address that resolution's contact
//! blocks and a sorted directory of where each block lives in the file.
//!
//! Unlike the header and master index, a matrix's exact byte length is already
//! known from the master index entry before parsing starts (§4.5.3: "read exactly
//! `length` bytes"), so this parser issues one `ExactRead` for the whole blob and
//! then decodes it synchronously with a [`FieldReader`] — no further suspension
//! is possible once that read completes.

use crate::error::{Error, Result};
use crate::hic::primitives::FieldReader;
use crate::hic::types::{FileRegion, MatrixMetadata, Resolution, ResolutionMetadata};
use crate::parse::{ByteAccumulator, Cursor, ParseRequest, ParseResult, Parser, Step};

enum Phase {
    Start,
    Blob,
    Done,
}

/// A [`Parser`] that emits exactly one [`MatrixMetadata`].
pub struct MatrixMetadataParser {
    cursor: Cursor,
    phase: Phase,
    file_position: u64,
    length: u32,
}

impl MatrixMetadataParser {
    pub fn new(region: FileRegion) -> Self {
        Self {
            cursor: Cursor::new(region.offset),
            phase: Phase::Start,
            file_position: region.offset,
            length: region.length,
        }
    }

    fn decode_blob(&self, blob: &[u8]) -> Result<MatrixMetadata> {
        let mut offset = 0_usize;

        let (chr1_index, next) = crate::io::read_i32_le(blob, offset)?;
        offset = next;
        let (chr2_index, next) = crate::io::read_i32_le(blob, offset)?;
        offset = next;
        let (n_resolutions, next) = crate::io::read_i32_le(blob, offset)?;
        offset = next;

        let mut resolutions = Vec::with_capacity(n_resolutions.max(0) as usize);

        for _ in 0..n_resolutions {
            let zero = blob[offset..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::invalid("matrix metadata: unterminated unit string"))?;
            let unit_str = std::str::from_utf8(&blob[offset..offset + zero])
                .map_err(|_| Error::invalid("matrix metadata: unit string is not UTF-8"))?;
            let unit = crate::hic::types::Unit::parse(unit_str)
                .ok_or_else(|| Error::invalid(format!("matrix metadata: unrecognized unit {:?}", unit_str)))?;
            offset += zero + 1;

            let (_old_zoom_index, next) = crate::io::read_i32_le(blob, offset)?;
            offset = next;
            let (sum_counts, next) = crate::io::read_f32_le(blob, offset)?;
            offset = next;
            let (occupied_cell_count, next) = crate::io::read_i32_le(blob, offset)?;
            offset = next;
            if occupied_cell_count != 0 {
                log::warn!(
                    "matrix metadata: occupiedCellCount {} is nonzero in a V8 file (expected 0)",
                    occupied_cell_count
                );
            }
            let (_percent5, next) = crate::io::read_f32_le(blob, offset)?;
            offset = next;
            let (_percent95, next) = crate::io::read_f32_le(blob, offset)?;
            offset = next;
            let (bin_size, next) = crate::io::read_i32_le(blob, offset)?;
            offset = next;
            let (block_size, next) = crate::io::read_i32_le(blob, offset)?;
            offset = next;
            let (block_column_count, next) = crate::io::read_i32_le(blob, offset)?;
            offset = next;
            let (block_count, next) = crate::io::read_i32_le(blob, offset)?;
            offset = next;

            let mut block_index = std::collections::BTreeMap::new();
            for _ in 0..block_count {
                let (block_number, next) = crate::io::read_i32_le(blob, offset)?;
                offset = next;
                let (block_offset, next) = crate::io::read_i64_le(blob, offset)?;
                offset = next;
                let (block_length, next) = crate::io::read_i32_le(blob, offset)?;
                offset = next;
                block_index.insert(
                    block_number,
                    FileRegion { offset: block_offset.max(0) as u64, length: block_length.max(0) as u32 },
                );
            }

            resolutions.push(ResolutionMetadata {
                resolution: Resolution { bin_size: bin_size.max(0) as u32, unit },
                bin_size: bin_size.max(0) as u32,
                block_size: block_size.max(0) as u32,
                block_column_count: block_column_count.max(0) as u32,
                sum_counts,
                block_index,
            });
        }

        Ok(MatrixMetadata { chr1_index, chr2_index, resolutions })
    }
}

impl Parser for MatrixMetadataParser {
    type Output = MatrixMetadata;

    fn step(&mut self, acc: &ByteAccumulator, _eof: bool) -> Result<Step<Self::Output>> {
        loop {
            match self.phase {
                Phase::Start => {
                    self.phase = Phase::Blob;
                    return Ok(Step::Request(ParseRequest::ExactRead {
                        count: self.length as usize,
                        source_position: Some(self.file_position),
                    }));
                }

                Phase::Blob => {
                    let mut fr = FieldReader::new(acc, &mut self.cursor);
                    match fr.try_bytes(self.length as usize) {
                        Some(blob) => {
                            let metadata = self.decode_blob(&blob)?;
                            self.phase = Phase::Done;
                            return Ok(Step::Result(ParseResult::Complete(metadata)));
                        }
                        None => {
                            let need = fr.shortfall(self.length as usize);
                            return Ok(Step::Request(ParseRequest::ExactRead { count: need, source_position: None }));
                        }
                    }
                }

                Phase::Done => {
                    return Ok(Step::Request(ParseRequest::Stop));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hic::types::Unit;
    use crate::parse::{parse_sync, MemorySource};

    fn cstr(s: &str) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.push(0);
        v
    }

    fn sample_blob() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0_i32.to_le_bytes()); // chr1 idx
        bytes.extend_from_slice(&0_i32.to_le_bytes()); // chr2 idx
        bytes.extend_from_slice(&1_i32.to_le_bytes()); // n resolutions
        bytes.extend(cstr("BP"));
        bytes.extend_from_slice(&0_i32.to_le_bytes()); // old zoom index
        bytes.extend_from_slice(&42.5_f32.to_le_bytes()); // sum counts
        bytes.extend_from_slice(&0_i32.to_le_bytes()); // occupied cell count
        bytes.extend_from_slice(&0.0_f32.to_le_bytes());
        bytes.extend_from_slice(&0.0_f32.to_le_bytes());
        bytes.extend_from_slice(&50000_i32.to_le_bytes()); // bin size
        bytes.extend_from_slice(&1000_i32.to_le_bytes()); // block size
        bytes.extend_from_slice(&3_i32.to_le_bytes()); // block column count
        bytes.extend_from_slice(&2_i32.to_le_bytes()); // block count
        bytes.extend_from_slice(&0_i32.to_le_bytes()); // block number
        bytes.extend_from_slice(&9999_i64.to_le_bytes()); // block offset
        bytes.extend_from_slice(&123_i32.to_le_bytes()); // block length
        bytes.extend_from_slice(&1_i32.to_le_bytes());
        bytes.extend_from_slice(&10099_i64.to_le_bytes());
        bytes.extend_from_slice(&321_i32.to_le_bytes());
        bytes
    }

    #[test]
    fn parses_a_single_resolution_matrix() {
        let blob = sample_blob();
        let region = FileRegion { offset: 0, length: blob.len() as u32 };
        let mut records: Vec<_> =
            parse_sync(MatrixMetadataParser::new(region), MemorySource::new(blob)).collect::<Result<_>>().unwrap();
        let metadata = records.remove(0);
        assert_eq!(metadata.chr1_index, 0);
        assert_eq!(metadata.chr2_index, 0);
        assert_eq!(metadata.resolutions.len(), 1);
        let res = &metadata.resolutions[0];
        assert_eq!(res.resolution, Resolution { bin_size: 50000, unit: Unit::Bp });
        assert_eq!(res.block_column_count, 3);
        assert_eq!(res.block_index.len(), 2);
        assert_eq!(res.block_index[&1], FileRegion { offset: 10099, length: 321 });
    }
}
