//! Parses the Hi-C V8 preamble: magic, version, footer position, genome id,
//! free-form attributes, the chromosome list, the resolution lists, and (for
//! fragment-unit files) restriction site positions.
//!
//! Every field's size depends on the string fields ahead of it, so this is written
//! as an explicit state machine rather than a sequence of fixed-offset reads: each
//! phase either has enough bytes buffered to decode its field and advance, or it
//! asks the driver for more and revisits the same phase on the next `step()`.

use crate::domain::{Chromosome, IndexedGenome};
use crate::error::{Error, Result};
use crate::hic::primitives::FieldReader;
use crate::hic::types::{Header, Resolution};
use crate::parse::{ByteAccumulator, Cursor, ParseRequest, ParseResult, Parser, Step};

enum Phase {
    Start,
    Magic,
    Version,
    FooterPosition,
    GenomeId,
    NAttrs,
    AttrKey,
    AttrValue,
    NChroms,
    ChromName,
    ChromLength,
    NBpRes,
    BpRes,
    NFragRes,
    FragRes,
    NSites,
    SiteValues,
    Done,
}

/// A [`Parser`] that emits exactly one [`Header`], as `Complete`.
pub struct HeaderParser {
    cursor: Cursor,
    phase: Phase,

    version: i32,
    footer_position: i64,
    genome_id: String,

    attrs_remaining: i32,
    attrs: Vec<(String, String)>,
    pending_attr_key: Option<String>,

    chroms_remaining: i32,
    chroms: Vec<Chromosome>,
    pending_chrom_name: Option<String>,

    bp_remaining: i32,
    bp_resolutions: Vec<Resolution>,

    frag_total: i32,
    frag_remaining: i32,
    frag_resolutions: Vec<Resolution>,

    site_chrom_idx: usize,
    site_values_remaining: i32,
    site_values: Vec<i32>,
    sites: std::collections::BTreeMap<String, Vec<i32>>,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self {
            cursor: Cursor::new(0),
            phase: Phase::Start,
            version: 0,
            footer_position: 0,
            genome_id: String::new(),
            attrs_remaining: 0,
            attrs: Vec::new(),
            pending_attr_key: None,
            chroms_remaining: 0,
            chroms: Vec::new(),
            pending_chrom_name: None,
            bp_remaining: 0,
            bp_resolutions: Vec::new(),
            frag_total: 0,
            frag_remaining: 0,
            frag_resolutions: Vec::new(),
            site_chrom_idx: 0,
            site_values_remaining: 0,
            site_values: Vec::new(),
            sites: std::collections::BTreeMap::new(),
        }
    }

    fn pull_i32(&mut self, acc: &ByteAccumulator) -> std::result::Result<i32, ParseRequest> {
        let mut fr = FieldReader::new(acc, &mut self.cursor);
        match fr.try_i32_le() {
            Some(v) => Ok(v),
            None => Err(ParseRequest::ExactRead { count: fr.shortfall(4), source_position: None }),
        }
    }

    fn pull_i64(&mut self, acc: &ByteAccumulator) -> std::result::Result<i64, ParseRequest> {
        let mut fr = FieldReader::new(acc, &mut self.cursor);
        match fr.try_i64_le() {
            Some(v) => Ok(v),
            None => Err(ParseRequest::ExactRead { count: fr.shortfall(8), source_position: None }),
        }
    }

    fn pull_cstring(&mut self, acc: &ByteAccumulator) -> std::result::Result<String, ParseRequest> {
        let mut fr = FieldReader::new(acc, &mut self.cursor);
        match fr.try_cstring() {
            Some(s) => Ok(s),
            None => Err(ParseRequest::PartialRead { source_position: None, max_count: None }),
        }
    }

    fn pull_bytes(&mut self, acc: &ByteAccumulator, count: usize) -> std::result::Result<Vec<u8>, ParseRequest> {
        let mut fr = FieldReader::new(acc, &mut self.cursor);
        match fr.try_bytes(count) {
            Some(bytes) => Ok(bytes),
            None => Err(ParseRequest::ExactRead { count: fr.shortfall(count), source_position: None }),
        }
    }
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for HeaderParser {
    type Output = Header;

    fn step(&mut self, acc: &ByteAccumulator, _eof: bool) -> Result<Step<Self::Output>> {
        loop {
            match self.phase {
                Phase::Start => {
                    self.phase = Phase::Magic;
                    return Ok(Step::Request(ParseRequest::ExactRead { count: 4, source_position: Some(0) }));
                }

                Phase::Magic => match self.pull_bytes(acc, 4) {
                    Ok(bytes) => {
                        if bytes != b"HIC\0" {
                            return Err(Error::InvalidMagic);
                        }
                        self.phase = Phase::Version;
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::Version => match self.pull_i32(acc) {
                    Ok(v) => {
                        if v != 8 {
                            return Err(Error::UnsupportedVersion { found: v });
                        }
                        self.version = v;
                        self.phase = Phase::FooterPosition;
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::FooterPosition => match self.pull_i64(acc) {
                    Ok(v) => {
                        self.footer_position = v;
                        self.phase = Phase::GenomeId;
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::GenomeId => match self.pull_cstring(acc) {
                    Ok(s) => {
                        self.genome_id = s;
                        self.phase = Phase::NAttrs;
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::NAttrs => match self.pull_i32(acc) {
                    Ok(n) => {
                        self.attrs_remaining = n;
                        self.phase = if n > 0 { Phase::AttrKey } else { Phase::NChroms };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::AttrKey => match self.pull_cstring(acc) {
                    Ok(key) => {
                        self.pending_attr_key = Some(key);
                        self.phase = Phase::AttrValue;
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::AttrValue => match self.pull_cstring(acc) {
                    Ok(value) => {
                        let key = self.pending_attr_key.take().expect("attr key read before value");
                        self.attrs.push((key, value));
                        self.attrs_remaining -= 1;
                        self.phase = if self.attrs_remaining > 0 { Phase::AttrKey } else { Phase::NChroms };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::NChroms => match self.pull_i32(acc) {
                    Ok(n) => {
                        self.chroms_remaining = n;
                        self.chroms.reserve(n.max(0) as usize);
                        self.phase = if n > 0 { Phase::ChromName } else { Phase::NBpRes };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::ChromName => match self.pull_cstring(acc) {
                    Ok(name) => {
                        self.pending_chrom_name = Some(name);
                        self.phase = Phase::ChromLength;
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::ChromLength => match self.pull_i32(acc) {
                    Ok(length) => {
                        let name = self.pending_chrom_name.take().expect("chrom name read before length");
                        self.chroms.push(Chromosome { name, length: length.max(0) as u32 });
                        self.chroms_remaining -= 1;
                        self.phase = if self.chroms_remaining > 0 { Phase::ChromName } else { Phase::NBpRes };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::NBpRes => match self.pull_i32(acc) {
                    Ok(n) => {
                        self.bp_remaining = n;
                        self.bp_resolutions.reserve(n.max(0) as usize);
                        self.phase = if n > 0 { Phase::BpRes } else { Phase::NFragRes };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::BpRes => match self.pull_i32(acc) {
                    Ok(bin_size) => {
                        self.bp_resolutions.push(Resolution::bp(bin_size.max(0) as u32));
                        self.bp_remaining -= 1;
                        self.phase = if self.bp_remaining > 0 { Phase::BpRes } else { Phase::NFragRes };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::NFragRes => match self.pull_i32(acc) {
                    Ok(n) => {
                        self.frag_total = n;
                        self.frag_remaining = n;
                        self.frag_resolutions.reserve(n.max(0) as usize);
                        self.phase = if n > 0 { Phase::FragRes } else { Phase::Done };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::FragRes => match self.pull_i32(acc) {
                    Ok(bin_size) => {
                        self.frag_resolutions.push(Resolution::frag(bin_size.max(0) as u32));
                        self.frag_remaining -= 1;
                        self.phase = if self.frag_remaining > 0 {
                            Phase::FragRes
                        } else if self.frag_total > 0 {
                            Phase::NSites
                        } else {
                            Phase::Done
                        };
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::NSites => {
                    if self.site_chrom_idx >= self.chroms.len() {
                        self.phase = Phase::Done;
                        continue;
                    }
                    match self.pull_i32(acc) {
                        Ok(n) => {
                            self.site_values_remaining = n;
                            self.site_values = Vec::with_capacity(n.max(0) as usize);
                            if n > 0 {
                                self.phase = Phase::SiteValues;
                            } else {
                                let name = self.chroms[self.site_chrom_idx].name.clone();
                                self.sites.insert(name, Vec::new());
                                self.site_chrom_idx += 1;
                            }
                        }
                        Err(req) => return Ok(Step::Request(req)),
                    }
                }

                Phase::SiteValues => match self.pull_i32(acc) {
                    Ok(position) => {
                        self.site_values.push(position);
                        self.site_values_remaining -= 1;
                        if self.site_values_remaining == 0 {
                            let name = self.chroms[self.site_chrom_idx].name.clone();
                            self.sites.insert(name, std::mem::take(&mut self.site_values));
                            self.site_chrom_idx += 1;
                            self.phase = Phase::NSites;
                        }
                    }
                    Err(req) => return Ok(Step::Request(req)),
                },

                Phase::Done => {
                    let mut resolutions = Vec::with_capacity(self.bp_resolutions.len() + self.frag_resolutions.len());
                    resolutions.extend(self.bp_resolutions.drain(..));
                    resolutions.extend(self.frag_resolutions.drain(..));

                    let header = Header {
                        version: self.version,
                        footer_position: self.footer_position,
                        genome_id: std::mem::take(&mut self.genome_id),
                        attributes: std::mem::take(&mut self.attrs),
                        genome: IndexedGenome::new(std::mem::take(&mut self.chroms)),
                        resolutions,
                        sites: std::mem::take(&mut self.sites),
                        expected_vectors_region: None,
                    };

                    return Ok(Step::Result(ParseResult::Complete(header)));
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

    fn minimal_v8_header(n_frag_res: i32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"HIC\0");
        bytes.extend_from_slice(&8_i32.to_le_bytes()); // version
        bytes.extend_from_slice(&1234_i64.to_le_bytes()); // footer position
        bytes.extend(cstr("hg19")); // genome id
        bytes.extend_from_slice(&1_i32.to_le_bytes()); // n attrs
        bytes.extend(cstr("software"));
        bytes.extend(cstr("juicer"));
        bytes.extend_from_slice(&2_i32.to_le_bytes()); // n chromosomes
        bytes.extend(cstr("chr1"));
        bytes.extend_from_slice(&1000_i32.to_le_bytes());
        bytes.extend(cstr("chr2"));
        bytes.extend_from_slice(&500_i32.to_le_bytes());
        bytes.extend_from_slice(&1_i32.to_le_bytes()); // n bp resolutions
        bytes.extend_from_slice(&50000_i32.to_le_bytes());
        bytes.extend_from_slice(&n_frag_res.to_le_bytes()); // n frag resolutions
        if n_frag_res > 0 {
            bytes.extend_from_slice(&2500_i32.to_le_bytes());
            for chrom_sites in [1_i32, 0_i32] {
                bytes.extend_from_slice(&chrom_sites.to_le_bytes());
                for k in 0..chrom_sites {
                    bytes.extend_from_slice(&(100 + k).to_le_bytes());
                }
            }
        }
        bytes
    }

    #[test]
    fn parses_header_without_fragment_resolutions() {
        let bytes = minimal_v8_header(0);
        let mut records: Vec<_> =
            parse_sync(HeaderParser::new(), MemorySource::new(bytes)).collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 1);
        let header = records.remove(0);
        assert_eq!(header.version, 8);
        assert_eq!(header.footer_position, 1234);
        assert_eq!(header.genome_id, "hg19");
        assert_eq!(header.attribute("software"), Some("juicer"));
        assert_eq!(header.genome.len(), 2);
        assert_eq!(header.genome.index_of("chr2").unwrap(), 1);
        assert_eq!(header.resolutions, vec![Resolution::bp(50000)]);
        assert!(header.sites.is_empty());
    }

    #[test]
    fn parses_fragment_sites_per_chromosome() {
        let bytes = minimal_v8_header(1);
        let mut records: Vec<_> =
            parse_sync(HeaderParser::new(), MemorySource::new(bytes)).collect::<Result<_>>().unwrap();
        let header = records.remove(0);
        assert_eq!(header.resolutions[1], Resolution { bin_size: 2500, unit: Unit::Frag });
        assert_eq!(header.sites.get("chr1").unwrap(), &vec![100]);
        assert_eq!(header.sites.get("chr2").unwrap(), &vec![]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_v8_header(0);
        bytes[0] = b'X';
        let error = parse_sync(HeaderParser::new(), MemorySource::new(bytes))
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert!(matches!(error, Error::InvalidMagic));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = minimal_v8_header(0);
        bytes[4..8].copy_from_slice(&9_i32.to_le_bytes());
        let error = parse_sync(HeaderParser::new(), MemorySource::new(bytes))
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert!(matches!(error, Error::UnsupportedVersion { found: 9 }));
    }
}
