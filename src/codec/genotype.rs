//! Compact 4-bit genotype codes and the parents-of-origin byte.

use crate::{Error, Result};

/// Reserved nibble for "no call available" (e.g. a parent not in the study).
pub const UNKNOWN_CODE: u8 = 0x0F;

const GENOTYPES: [&str; 15] = [
    "0/0", "0/1", "1/1", "0|0", "0|1", "1|0", "1|1", "0/2", "1/2", "0", "1", "./.", "0/.", "1/.",
    ".",
];

pub struct GenotypeCodec;

impl GenotypeCodec {
    pub fn encode(genotype: &str) -> Result<u8> {
        let normalized = normalize(genotype)?;
        GENOTYPES
            .iter()
            .position(|gt| *gt == normalized)
            .map(|code| code as u8)
            .ok_or_else(|| Error::Decode(format!("genotype '{}' has no compact code", genotype)))
    }

    pub fn decode(code: u8) -> Result<&'static str> {
        GENOTYPES
            .get(code as usize)
            .copied()
            .ok_or_else(|| Error::Decode(format!("unknown genotype code {}", code)))
    }

    pub fn alphabet() -> &'static [&'static str] {
        &GENOTYPES
    }

    /// True for any call carrying at least one non-reference allele.
    pub fn has_alternate(genotype: &str) -> bool {
        genotype
            .split(['/', '|'])
            .any(|allele| allele != "0" && allele != ".")
    }
}

/// Unphased calls are sorted (missing last) so that "1/0" and "0/1" share a code.
fn normalize(genotype: &str) -> Result<String> {
    if genotype.is_empty() {
        return Err(Error::Decode("empty genotype".to_string()));
    }
    if genotype.contains('|') || !genotype.contains('/') {
        return Ok(genotype.to_string());
    }
    let mut alleles: Vec<&str> = genotype.split('/').collect();
    for allele in &alleles {
        if *allele != "." && allele.parse::<u32>().is_err() {
            return Err(Error::Decode(format!("invalid allele '{}' in '{}'", allele, genotype)));
        }
    }
    alleles.sort_by_key(|allele| match allele.parse::<u32>() {
        Ok(n) => (0, n),
        Err(_) => (1, 0),
    });
    Ok(alleles.join("/"))
}

/// Father genotype in the high nibble, mother in the low one.
pub struct ParentsCode;

impl ParentsCode {
    pub fn encode(father: Option<&str>, mother: Option<&str>) -> Result<u8> {
        let father = match father {
            Some(gt) => GenotypeCodec::encode(gt)?,
            None => UNKNOWN_CODE,
        };
        let mother = match mother {
            Some(gt) => GenotypeCodec::encode(gt)?,
            None => UNKNOWN_CODE,
        };
        Ok((father << 4) | mother)
    }

    pub fn decode(code: u8) -> Result<(Option<&'static str>, Option<&'static str>)> {
        Ok((Self::decode_father(code)?, Self::decode_mother(code)?))
    }

    pub fn decode_father(code: u8) -> Result<Option<&'static str>> {
        decode_nibble(code >> 4)
    }

    pub fn decode_mother(code: u8) -> Result<Option<&'static str>> {
        decode_nibble(code & 0x0F)
    }
}

fn decode_nibble(nibble: u8) -> Result<Option<&'static str>> {
    if nibble == UNKNOWN_CODE {
        Ok(None)
    } else {
        GenotypeCodec::decode(nibble).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_round_trips() {
        for gt in GenotypeCodec::alphabet() {
            let code = GenotypeCodec::encode(gt).unwrap();
            assert!(code < UNKNOWN_CODE);
            assert_eq!(GenotypeCodec::decode(code).unwrap(), *gt);
        }
    }

    #[test]
    fn test_unphased_normalization() {
        assert_eq!(
            GenotypeCodec::encode("1/0").unwrap(),
            GenotypeCodec::encode("0/1").unwrap()
        );
        assert_eq!(
            GenotypeCodec::encode("./1").unwrap(),
            GenotypeCodec::encode("1/.").unwrap()
        );
        assert_ne!(
            GenotypeCodec::encode("1|0").unwrap(),
            GenotypeCodec::encode("0|1").unwrap()
        );
    }

    #[test]
    fn test_rejects_unknown_genotypes() {
        assert!(matches!(GenotypeCodec::encode("3/4"), Err(Error::Decode(_))));
        assert!(matches!(GenotypeCodec::encode("a/b"), Err(Error::Decode(_))));
        assert!(matches!(GenotypeCodec::encode(""), Err(Error::Decode(_))));
        assert!(matches!(GenotypeCodec::decode(15), Err(Error::Decode(_))));
        assert!(matches!(GenotypeCodec::decode(200), Err(Error::Decode(_))));
    }

    #[test]
    fn test_parents_code() {
        let code = ParentsCode::encode(Some("0/1"), Some("1/1")).unwrap();
        assert_eq!(ParentsCode::decode(code).unwrap(), (Some("0/1"), Some("1/1")));

        let code = ParentsCode::encode(None, Some("0/0")).unwrap();
        assert_eq!(code >> 4, UNKNOWN_CODE);
        assert_eq!(ParentsCode::decode_father(code).unwrap(), None);
        assert_eq!(ParentsCode::decode_mother(code).unwrap(), Some("0/0"));
    }

    #[test]
    fn test_has_alternate() {
        assert!(GenotypeCodec::has_alternate("0/1"));
        assert!(GenotypeCodec::has_alternate("1"));
        assert!(!GenotypeCodec::has_alternate("0|0"));
        assert!(!GenotypeCodec::has_alternate("./."));
    }
}
