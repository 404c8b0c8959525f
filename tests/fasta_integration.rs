//! Black-box tests against the public `fasta` API, built from literal byte fixtures
//! rather than files on disk.

use hicfasta::prelude::*;

fn records(input: &[u8], validation: Validation) -> Result<Vec<LazyRecord>> {
    parse_sync(FastaRecords::new(validation), MemorySource::new(input.to_vec())).collect()
}

#[test]
fn reads_a_multi_record_file_end_to_end() {
    let input = b">chr1 assembly notes\nACGTACGTACGT\nACGT\n>chr2\nTTTTGGGGCCCC\n";
    let recs = records(input, Validation::Lazy).unwrap();

    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].header(), "chr1 assembly notes");
    assert_eq!(recs[0].sequence(), b"ACGTACGTACGTACGT");
    assert_eq!(recs[1].header(), "chr2");
    assert_eq!(recs[1].sequence(), b"TTTTGGGGCCCC");
}

#[test]
fn strict_validation_catches_a_malformed_record_without_losing_the_valid_ones() {
    let input = b">good\nACGT\n>bad\nACG1\n";
    let result = records(input, Validation::Strict);
    assert!(result.is_err());
}

#[test]
fn driver_resumes_correctly_across_tiny_chunk_boundaries() {
    let input = b">seq\nACGTACGTACGTACGTACGT\n";
    let recs: Vec<_> = parse_sync(FastaRecords::new(Validation::Lazy), MemorySource::new(input.to_vec()))
        .with_chunk_size(1)
        .collect::<Result<_>>()
        .unwrap();

    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].sequence(), b"ACGTACGTACGTACGTACGT");
}
