//! Black-box tests against the public `hic` API, built from a hand-assembled,
//! minimal V8 byte fixture rather than a real contact map on disk: one chromosome
//! pair, one resolution, two contact blocks.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

use hicfasta::prelude::*;

fn cstr(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

fn zlib_compress(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// A representation-1 (list-of-rows) block with a single record.
fn single_record_block(bin_x_offset: i32, bin_y_offset: i32, value: f32) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&1_i32.to_le_bytes()); // n records
    raw.extend_from_slice(&bin_x_offset.to_le_bytes());
    raw.extend_from_slice(&bin_y_offset.to_le_bytes());
    raw.push(1); // use_float
    raw.push(1); // representation

    raw.extend_from_slice(&1_i16.to_le_bytes()); // row count
    raw.extend_from_slice(&0_i16.to_le_bytes()); // row number
    raw.extend_from_slice(&1_i16.to_le_bytes()); // record count
    raw.extend_from_slice(&0_i16.to_le_bytes()); // col delta
    raw.extend_from_slice(&value.to_le_bytes());

    zlib_compress(&raw)
}

/// Assembles a complete, minimal V8 file: header (one chromosome, one BP
/// resolution), two zlib-compressed contact blocks, that matrix's metadata blob,
/// and the master index footer pointing back at it. Returns the raw bytes.
fn minimal_v8_file() -> Vec<u8> {
    let block0 = single_record_block(0, 0, 5.0);
    let block1 = single_record_block(0, 1, 7.0);

    let mut header = Vec::new();
    header.extend_from_slice(b"HIC\0");
    header.extend_from_slice(&8_i32.to_le_bytes()); // version
    header.extend_from_slice(&0_i64.to_le_bytes()); // footer position placeholder
    header.extend(cstr("hg19")); // genome id
    header.extend_from_slice(&0_i32.to_le_bytes()); // n attrs
    header.extend_from_slice(&1_i32.to_le_bytes()); // n chromosomes
    header.extend(cstr("chr1"));
    header.extend_from_slice(&1000_i32.to_le_bytes());
    header.extend_from_slice(&1_i32.to_le_bytes()); // n bp resolutions
    header.extend_from_slice(&10_i32.to_le_bytes()); // bin size
    header.extend_from_slice(&0_i32.to_le_bytes()); // n frag resolutions

    let block0_offset = header.len() as u64;
    let block1_offset = block0_offset + block0.len() as u64;
    let matrix_offset = block1_offset + block1.len() as u64;

    let mut matrix_blob = Vec::new();
    matrix_blob.extend_from_slice(&0_i32.to_le_bytes()); // chr1 index
    matrix_blob.extend_from_slice(&0_i32.to_le_bytes()); // chr2 index
    matrix_blob.extend_from_slice(&1_i32.to_le_bytes()); // n resolutions
    matrix_blob.extend(cstr("BP"));
    matrix_blob.extend_from_slice(&0_i32.to_le_bytes()); // old zoom index
    matrix_blob.extend_from_slice(&12.0_f32.to_le_bytes()); // sum counts
    matrix_blob.extend_from_slice(&0_i32.to_le_bytes()); // occupied cell count
    matrix_blob.extend_from_slice(&0.0_f32.to_le_bytes());
    matrix_blob.extend_from_slice(&0.0_f32.to_le_bytes());
    matrix_blob.extend_from_slice(&10_i32.to_le_bytes()); // bin size
    matrix_blob.extend_from_slice(&1_i32.to_le_bytes()); // block size (bins per block)
    matrix_blob.extend_from_slice(&1_i32.to_le_bytes()); // block column count
    matrix_blob.extend_from_slice(&2_i32.to_le_bytes()); // block count
    matrix_blob.extend_from_slice(&0_i32.to_le_bytes()); // block number
    matrix_blob.extend_from_slice(&(block0_offset as i64).to_le_bytes());
    matrix_blob.extend_from_slice(&(block0.len() as i32).to_le_bytes());
    matrix_blob.extend_from_slice(&1_i32.to_le_bytes()); // block number
    matrix_blob.extend_from_slice(&(block1_offset as i64).to_le_bytes());
    matrix_blob.extend_from_slice(&(block1.len() as i32).to_le_bytes());

    let footer_position = matrix_offset + matrix_blob.len() as u64;

    let mut entries = Vec::new();
    entries.extend_from_slice(&1_i32.to_le_bytes()); // n entries
    entries.extend(cstr("0_0"));
    entries.extend_from_slice(&(matrix_offset as i64).to_le_bytes());
    entries.extend_from_slice(&(matrix_blob.len() as i32).to_le_bytes());

    let mut footer = Vec::new();
    footer.extend_from_slice(&(entries.len() as i32).to_le_bytes()); // n bytes
    footer.extend(entries);

    let mut file = Vec::new();
    file.extend(header);
    file.extend(block0);
    file.extend(block1);
    file.extend(matrix_blob);
    file.extend(footer);

    // Patch the footer position now that its final offset is known.
    file[8..16].copy_from_slice(&(footer_position as i64).to_le_bytes());

    file
}

fn opened_reader() -> HicReader<MemorySource> {
    let bytes = minimal_v8_file();
    let mut reader = HicReader::new(MemorySource::new(bytes));
    reader.read_header().unwrap();
    reader.read_master_index().unwrap();
    reader
}

#[test]
fn reads_header_and_master_index() {
    let mut reader = opened_reader();
    assert_eq!(reader.header().unwrap().genome_id, "hg19");
    assert_eq!(reader.header().unwrap().resolutions, vec![Resolution::bp(10)]);

    let metadata = reader.get_matrix_metadatas("chr1", "chr1").unwrap();
    assert_eq!(metadata.resolutions.len(), 1);
    assert_eq!(metadata.resolutions[0].block_index.len(), 2);
}

#[test]
fn iterates_observed_contacts_across_both_blocks_in_order() {
    let mut reader = opened_reader();
    let x = GenomicRange::new("chr1", 1, 10).unwrap();
    let y = GenomicRange::new("chr1", 1, 20).unwrap();

    let records = reader
        .iterate_contacts(&x, &y, Resolution::bp(10), ContactsKind::Observed)
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0], ContactRecord { bin_x: 0, bin_y: 0, value: 5.0 });
    assert_eq!(records[1], ContactRecord { bin_x: 0, bin_y: 1, value: 7.0 });
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_contact_iteration_matches_the_sequential_order() {
    let x = GenomicRange::new("chr1", 1, 10).unwrap();
    let y = GenomicRange::new("chr1", 1, 20).unwrap();

    let mut sequential_reader = opened_reader();
    let sequential = sequential_reader
        .iterate_contacts(&x, &y, Resolution::bp(10), ContactsKind::Observed)
        .unwrap();

    let mut parallel_reader = opened_reader();
    let parallel = parallel_reader
        .iterate_contacts_parallel(&x, &y, Resolution::bp(10), ContactsKind::Observed)
        .unwrap();

    assert_eq!(sequential, parallel);
}
