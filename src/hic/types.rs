//! The value types a parsed Hi-C V8 file is built out of: resolutions, file regions,
//! the header, the master index, per-matrix resolution metadata, expected-value
//! vectors and the contact records themselves. None of these types know how to parse
//! themselves — that lives in the sibling parser modules — they are plain data, the
//! same way the reference crate's `meta` module separates "what a field means" from
//! "how to read it off the wire".

use std::collections::BTreeMap;

/// The unit a [`Resolution`]'s bin size is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Bp,
    Frag,
}

impl Unit {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BP" => Some(Unit::Bp),
            "FRAG" => Some(Unit::Frag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Bp => "BP",
            Unit::Frag => "FRAG",
        }
    }
}

/// A zoom level: a bin size paired with the unit it is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub bin_size: u32,
    pub unit: Unit,
}

impl Resolution {
    pub fn bp(bin_size: u32) -> Self {
        Self { bin_size, unit: Unit::Bp }
    }

    pub fn frag(bin_size: u32) -> Self {
        Self { bin_size, unit: Unit::Frag }
    }
}

/// A byte range within the file: an offset and a length, as recorded by the master
/// index and by each matrix's per-resolution block index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRegion {
    pub offset: u64,
    pub length: u32,
}

/// The parsed Hi-C preamble: everything read by [`crate::hic::HicReader::read_header`].
#[derive(Debug, Clone)]
pub struct Header {
    pub version: i32,
    pub footer_position: i64,
    pub genome_id: String,
    /// Insertion-ordered free-form key/value metadata (software version, statistics, ...).
    pub attributes: Vec<(String, String)>,
    pub genome: crate::domain::IndexedGenome,
    pub resolutions: Vec<Resolution>,
    /// Restriction site positions per chromosome name, present only when the file
    /// carries fragment-unit resolutions.
    pub sites: BTreeMap<String, Vec<i32>>,
    /// Filled in by [`crate::hic::HicReader::read_master_index`]; `None` until then.
    pub expected_vectors_region: Option<FileRegion>,
}

impl Header {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Directory of `"{chr1Idx}_{chr2Idx}"` keys to the file region holding that matrix's
/// metadata and block index.
pub type MasterIndex = BTreeMap<String, (i64, i32)>;

pub(crate) fn master_index_key(i: usize, j: usize) -> String {
    format!("{}_{}", i, j)
}

/// One resolution's worth of metadata for a single chromosome-pair matrix: the
/// dimensions needed to address blocks, and the sorted directory of block regions.
#[derive(Debug, Clone)]
pub struct ResolutionMetadata {
    pub resolution: Resolution,
    pub bin_size: u32,
    pub block_size: u32,
    pub block_column_count: u32,
    pub sum_counts: f32,
    pub block_index: BTreeMap<i32, FileRegion>,
}

impl ResolutionMetadata {
    pub fn flat_block_number(&self, x_block: u32, y_block: u32) -> i32 {
        (x_block * self.block_column_count + y_block) as i32
    }
}

/// All resolution metadatas parsed for one chromosome-pair matrix, keyed by resolution
/// for lookup by [`crate::hic::HicReader::iterate_contacts`].
#[derive(Debug, Clone, Default)]
pub struct MatrixMetadata {
    pub chr1_index: i32,
    pub chr2_index: i32,
    pub resolutions: Vec<ResolutionMetadata>,
}

impl MatrixMetadata {
    pub fn for_resolution(&self, resolution: Resolution) -> Option<&ResolutionMetadata> {
        self.resolutions.iter().find(|r| r.resolution == resolution)
    }
}

/// A per-resolution expected-count vector, plus the per-chromosome scale factors used
/// to normalize observed counts against it.
#[derive(Debug, Clone)]
pub struct ExpectedValues {
    /// `None` for the un-normalized ("NONE") vector group, `Some(name)` (e.g. `"VC"`,
    /// `"KR"`) for a normalized one.
    pub normalization_type: Option<String>,
    pub resolution: Resolution,
    pub values: Vec<f64>,
    pub chr_scale_factors: Vec<(i32, f64)>,
}

impl ExpectedValues {
    /// The expected count at genomic distance `d` (in bins), clamped to the vector's
    /// last entry for distances beyond it.
    pub fn value_for_distance(&self, distance: i64) -> f64 {
        let last = self.values.len().saturating_sub(1);
        let index = distance.max(0) as usize;
        self.values[index.min(last)]
    }

    pub fn scale_factor(&self, chr_index: i32) -> f64 {
        self.chr_scale_factors
            .iter()
            .find(|(idx, _)| *idx == chr_index)
            .map(|(_, factor)| *factor)
            .unwrap_or(1.0)
    }
}

/// One observed (or normalized) contact between two bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactRecord {
    pub bin_x: i32,
    pub bin_y: i32,
    pub value: f64,
}

/// Which flavor of value [`crate::hic::HicReader::iterate_contacts`] should emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactsKind {
    /// Raw observed counts, unmodified.
    Observed,
    /// Observed divided by the un-normalized expected-value vector only.
    OverExpected,
    /// Observed divided by the named normalized expected-value vector and the two
    /// chromosomes' scale factors.
    Normalized(String),
}
