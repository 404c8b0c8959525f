//! Genome-coordinate value types shared by the FASTA and Hi-C readers. These are
//! deliberately plain value records: the interesting engineering in this crate is
//! the parsing framework, not the coordinate algebra.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// The strand of a genomic feature. Hi-C itself is strand-agnostic, but callers
/// building `GenomicRange`s from other annotation formats need it. Parsing also
/// accepts `"1"|"-1"|"0"` as synonyms for `+|-|.`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Positive,
    Negative,
    Unspecified,
}

impl Strand {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "+" | "1" => Ok(Strand::Positive),
            "-" | "-1" => Ok(Strand::Negative),
            "." | "0" => Ok(Strand::Unspecified),
            other => Err(Error::invalid(format!("unrecognized strand token {:?}", other))),
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Strand::Positive => '+',
            Strand::Negative => '-',
            Strand::Unspecified => '.',
        }
    }

    pub fn complement(&self) -> Strand {
        match self {
            Strand::Positive => Strand::Negative,
            Strand::Negative => Strand::Positive,
            Strand::Unspecified => Strand::Unspecified,
        }
    }
}

/// A named chromosome (or scaffold/contig) with a known length in bases, as listed
/// in a Hi-C header or implied by a FASTA file's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    pub name: String,
    pub length: u32,
}

/// A 1-based, inclusive genomic interval on a named chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomicRange {
    pub chromosome_name: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

impl GenomicRange {
    pub fn new(chromosome_name: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        if start == 0 || start > end {
            return Err(Error::invalid(format!(
                "invalid 1-based range [{}, {}]",
                start, end
            )));
        }
        Ok(Self { chromosome_name: chromosome_name.into(), start, end, strand: Strand::Unspecified })
    }

    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position <= self.end
    }

    pub fn with_strand(&self, strand: Strand) -> Self {
        Self { strand, ..self.clone() }
    }

    pub fn with_start(&self, start: u64) -> Self {
        Self { start, ..self.clone() }
    }

    pub fn with_end(&self, end: u64) -> Self {
        Self { end, ..self.clone() }
    }

    /// The half-open, 0-based bin range `[start_bin, end_bin)` this range spans at
    /// the given bin size, used by the Hi-C contact iterator.
    pub fn to_bin_range(&self, bin_size: u32) -> (u32, u32) {
        let bin_size = bin_size as u64;
        let start_bin = (self.start - 1) / bin_size;
        let end_bin = (self.end + bin_size - 1) / bin_size;
        (start_bin as u32, end_bin as u32)
    }
}

/// An ordered, name-indexed list of chromosomes, shared between a parsed Hi-C header
/// and an independently-parsed FASTA genome so the two can be cross-referenced by
/// name or by index.
#[derive(Debug, Clone, Default)]
pub struct IndexedGenome {
    chromosomes: Vec<Chromosome>,
    index_by_name: HashMap<String, usize>,
}

impl IndexedGenome {
    pub fn new(chromosomes: Vec<Chromosome>) -> Self {
        let index_by_name = chromosomes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self { chromosomes, index_by_name }
    }

    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.chromosomes.get(index).map(|c| c.name.as_str())
    }

    pub fn length_at(&self, index: usize) -> Option<u32> {
        self.chromosomes.get(index).map(|c| c.length)
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.index_by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::ChromosomeNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chromosome> {
        self.chromosomes.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn looks_up_chromosomes_by_name_and_index() {
        let genome = IndexedGenome::new(vec![
            Chromosome { name: "chr1".into(), length: 1000 },
            Chromosome { name: "chr2".into(), length: 500 },
        ]);
        assert_eq!(genome.index_of("chr2").unwrap(), 1);
        assert_eq!(genome.length_at(0).unwrap(), 1000);
        assert!(genome.index_of("chr9").is_err());
    }

    #[test]
    fn range_contains_and_length_are_one_based_inclusive() {
        let range = GenomicRange::new("chr1", 1, 10).unwrap();
        assert_eq!(range.length(), 10);
        assert!(range.contains(1));
        assert!(range.contains(10));
        assert!(!range.contains(11));
    }

    #[test]
    fn bin_range_covers_the_whole_interval() {
        let range = GenomicRange::new("chr1", 1, 250_000).unwrap();
        assert_eq!(range.to_bin_range(50_000), (0, 5));
    }

    #[test]
    fn strand_accepts_known_synonyms() {
        assert_eq!(Strand::parse("1").unwrap(), Strand::Positive);
        assert_eq!(Strand::parse("-1").unwrap(), Strand::Negative);
        assert_eq!(Strand::parse("0").unwrap(), Strand::Unspecified);
        assert!(Strand::parse("?").is_err());
    }
}
