//! Mendelian error codes and the per-entry list of mendelian error variants.
//!
//! Codes form nested ranges so predicates work on the encoded byte:
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | consistent, or not evaluable |
//! | 1 | child homozygous for an allele the father lacks |
//! | 2 | child homozygous for an allele the mother lacks |
//! | 3 | child heterozygous, alleles cannot be assigned one per parent |
//! | 4 | one parent uncalled, child shares no allele with the other |
//! | 5 | child carries the reference allele absent in both parents |
//! | 6 | child homozygous for an allele absent in both parents |
//! | 7 | child heterozygous for a novel alternate, some parent heterozygous |
//! | 8 | child heterozygous for a novel alternate, both parents homozygous reference |
//! | 9 | child heterozygous for a novel alternate, both parents homozygous, not both reference |

use super::variant::Variant;
use crate::codec::{GenotypeCodec, read_variant, write_variant};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const MAX_CODE: u8 = 9;

const MENDELIAN_ERROR: std::ops::RangeInclusive<u8> = 1..=MAX_CODE;
const DE_NOVO: std::ops::RangeInclusive<u8> = 5..=MAX_CODE;
const DE_NOVO_STRICT: std::ops::RangeInclusive<u8> = 8..=MAX_CODE;

pub fn is_mendelian_error(code: u8) -> bool {
    MENDELIAN_ERROR.contains(&code)
}

pub fn is_de_novo(code: u8) -> bool {
    DE_NOVO.contains(&code)
}

pub fn is_de_novo_strict(code: u8) -> bool {
    DE_NOVO_STRICT.contains(&code)
}

/// Query-side selection of mendelian tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MendelianFilter {
    MendelianError,
    DeNovo,
    DeNovoStrict,
}

impl MendelianFilter {
    pub fn matches(&self, code: u8) -> bool {
        match self {
            MendelianFilter::MendelianError => is_mendelian_error(code),
            MendelianFilter::DeNovo => is_de_novo(code),
            MendelianFilter::DeNovoStrict => is_de_novo_strict(code),
        }
    }
}

fn diploid(genotype: Option<&str>) -> Option<[u32; 2]> {
    let mut alleles = genotype?.split(['/', '|']).map(|a| a.parse::<u32>().ok());
    let first = alleles.next()??;
    let second = alleles.next()??;
    if alleles.next().is_some() {
        return None;
    }
    Some([first, second])
}

/// Mendelian code of an autosomal diploid trio. Haploid or missing child calls give 0.
pub fn compute(father: Option<&str>, mother: Option<&str>, child: &str) -> u8 {
    let Some(c) = diploid(Some(child)) else {
        return 0;
    };
    match (diploid(father), diploid(mother)) {
        (None, None) => 0,
        (Some(p), None) | (None, Some(p)) => {
            if c.iter().any(|a| p.contains(a)) { 0 } else { 4 }
        }
        (Some(f), Some(m)) => {
            let consistent = (f.contains(&c[0]) && m.contains(&c[1]))
                || (f.contains(&c[1]) && m.contains(&c[0]));
            if consistent {
                return 0;
            }
            let novel: Vec<u32> = c
                .iter()
                .copied()
                .filter(|a| !f.contains(a) && !m.contains(a))
                .collect();
            let child_hom = c[0] == c[1];
            if novel.is_empty() {
                return match (child_hom, f.contains(&c[0])) {
                    (true, false) => 1,
                    (true, true) => 2,
                    (false, _) => 3,
                };
            }
            if novel.contains(&0) {
                5
            } else if child_hom {
                6
            } else if f[0] != f[1] || m[0] != m[1] {
                7
            } else if f == [0, 0] && m == [0, 0] {
                8
            } else {
                9
            }
        }
    }
}

/// One stored mendelian error: the variant, the child genotype and the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MendelianRecord {
    pub variant: Variant,
    pub genotype: &'static str,
    pub code: u8,
}

/// Append one record to a mendelian blob: variant element, genotype code, error code.
pub fn write_record(
    blob: &mut Vec<u8>,
    batch_start: u32,
    variant: &Variant,
    genotype: &str,
    code: u8,
) -> Result<()> {
    if code > MAX_CODE {
        return Err(Error::InvalidInput(format!("mendelian code {} out of range", code)));
    }
    let relative = variant.start.checked_sub(batch_start).ok_or_else(|| {
        Error::InvalidInput(format!("{} is before chunk start {}", variant, batch_start))
    })?;
    write_variant(blob, relative, &variant.reference, &variant.alternate)?;
    blob.push(GenotypeCodec::encode(genotype)?);
    blob.push(code);
    Ok(())
}

/// Sequential reader over an entry's mendelian blob.
pub struct MendelianErrorIterator<'a> {
    blob: &'a [u8],
    chromosome: &'a str,
    batch_start: u32,
    offset: usize,
}

impl<'a> MendelianErrorIterator<'a> {
    pub fn new(blob: &'a [u8], chromosome: &'a str, batch_start: u32) -> Self {
        Self {
            blob,
            chromosome,
            batch_start,
            offset: 0,
        }
    }

    fn read_next(&mut self) -> Result<MendelianRecord> {
        let element = read_variant(self.blob, self.offset)?;
        let tail = self.offset + element.length;
        let trailer = self
            .blob
            .get(tail..tail + 2)
            .ok_or_else(|| Error::bounds("mendelian", tail + 2, self.blob.len()))?;
        let genotype = GenotypeCodec::decode(trailer[0])?;
        let code = trailer[1];
        if code > MAX_CODE {
            return Err(Error::Decode(format!("mendelian code {} out of range", code)));
        }
        let variant = Variant::from_element(self.chromosome, self.batch_start, &element)?;
        self.offset = tail + 2;
        Ok(MendelianRecord {
            variant,
            genotype,
            code,
        })
    }
}

impl Iterator for MendelianErrorIterator<'_> {
    type Item = Result<MendelianRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.blob.len() {
            return None;
        }
        let record = self.read_next();
        if record.is_err() {
            // corrupted blob, stop after reporting once
            self.offset = self.blob.len();
        }
        Some(record)
    }
}
