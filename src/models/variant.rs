use crate::codec::{BitBuffer, EncodedVariant, ParentsCode};
use crate::schema::AnnotationIndexEntry;
use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Variant coordinates. Empty alleles render as `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variant {
    pub chromosome: String,
    pub start: u32,
    pub end: u32,
    pub reference: String,
    pub alternate: String,
}

impl Variant {
    pub fn new(chromosome: &str, start: u32, reference: &str, alternate: &str) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            start,
            end: u32::try_from(reference.len())
                .map_or(u32::MAX, |len| start.saturating_add(len))
                .saturating_sub(1),
            reference: reference.to_string(),
            alternate: alternate.to_string(),
        }
    }

    pub(crate) fn from_element(
        chromosome: &str,
        batch_start: u32,
        element: &EncodedVariant<'_>,
    ) -> Result<Self> {
        let start = batch_start.checked_add(element.relative_start).ok_or_else(|| {
            Error::Decode(format!(
                "relative start {} overflows chunk {}",
                element.relative_start, batch_start
            ))
        })?;
        Ok(Self::new(chromosome, start, element.reference, element.alternate))
    }
}

fn allele_or_dash(allele: &str) -> &str {
    if allele.is_empty() { "-" } else { allele }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chromosome,
            self.start,
            allele_or_dash(&self.reference),
            allele_or_dash(&self.alternate)
        )
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [chromosome, start, reference, alternate] = parts[..] else {
            return Err(Error::InvalidInput(format!(
                "variant '{}' is not chr:start:ref:alt",
                s
            )));
        };
        let start = start
            .parse::<u32>()
            .map_err(|_| Error::InvalidInput(format!("invalid start in variant '{}'", s)))?;
        let dash = |a: &str| if a == "-" { String::new() } else { a.to_string() };
        Ok(Variant::new(chromosome, start, &dash(reference), &dash(alternate)))
    }
}

impl Serialize for Variant {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Owned snapshot of one decoded element. Nothing here borrows from the entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleIndexVariant {
    pub variant: Variant,
    pub genotype: String,
    pub file_index: Vec<BitBuffer>,
    #[serde(serialize_with = "serialize_file_data")]
    pub file_data: Vec<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<AnnotationIndexEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents_code: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mendelian_code: Option<u8>,
}

impl SampleIndexVariant {
    pub fn father_genotype(&self) -> Result<Option<&'static str>> {
        match self.parents_code {
            Some(code) => ParentsCode::decode_father(code),
            None => Ok(None),
        }
    }

    pub fn mother_genotype(&self) -> Result<Option<&'static str>> {
        match self.parents_code {
            Some(code) => ParentsCode::decode_mother(code),
            None => Ok(None),
        }
    }

    pub fn file_count(&self) -> usize {
        self.file_index.len()
    }
}

fn serialize_file_data<S: Serializer>(
    data: &[Bytes],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(data.iter().map(|d| STANDARD.encode(d)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_end_and_display() {
        let snv = Variant::new("1", 100, "A", "T");
        assert_eq!(snv.end, 100);
        assert_eq!(snv.to_string(), "1:100:A:T");

        let deletion = Variant::new("1", 100, "ACG", "");
        assert_eq!(deletion.end, 102);
        assert_eq!(deletion.to_string(), "1:100:ACG:-");

        let insertion = Variant::new("1", 100, "", "TT");
        assert_eq!(insertion.end, 99);

        let at_limit = Variant::new("1", u32::MAX - 1, "ACGT", "");
        assert_eq!(at_limit.end, u32::MAX - 1);
    }

    #[test]
    fn test_element_start_overflow_is_decode_error() {
        let element = EncodedVariant {
            relative_start: 10,
            reference: "A",
            alternate: "C",
            length: 3,
        };
        let variant = Variant::from_element("1", 1_000, &element).unwrap();
        assert_eq!(variant.start, 1_010);
        assert!(matches!(
            Variant::from_element("1", u32::MAX - 5, &element),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_variant_from_str() {
        let variant: Variant = "X:12345:-:CA".parse().unwrap();
        assert_eq!(variant, Variant::new("X", 12345, "", "CA"));
        assert!("X:12345:A".parse::<Variant>().is_err());
        assert!("X:abc:A:T".parse::<Variant>().is_err());
    }

    #[test]
    fn test_parents_accessors() {
        let mut variant = SampleIndexVariant {
            variant: Variant::new("1", 10, "A", "C"),
            genotype: "0/1".to_string(),
            file_index: vec![],
            file_data: vec![],
            annotation: None,
            parents_code: None,
            mendelian_code: None,
        };
        assert_eq!(variant.father_genotype().unwrap(), None);
        variant.parents_code = Some(ParentsCode::encode(Some("1/1"), None).unwrap());
        assert_eq!(variant.father_genotype().unwrap(), Some("1/1"));
        assert_eq!(variant.mother_genotype().unwrap(), None);
    }

    #[test]
    fn test_serializes_file_data_as_base64() {
        let variant = SampleIndexVariant {
            variant: Variant::new("1", 10, "A", "C"),
            genotype: "0/1".to_string(),
            file_index: vec![BitBuffer::new(0b101, 3)],
            file_data: vec![Bytes::from_static(b"hi")],
            annotation: None,
            parents_code: None,
            mendelian_code: Some(8),
        };
        let json = serde_json::to_value(&variant).unwrap();
        assert_eq!(json["variant"], "1:10:A:C");
        assert_eq!(json["fileIndex"][0], "101");
        assert_eq!(json["fileData"][0], "aGk=");
        assert_eq!(json["mendelianCode"], 8);
        assert!(json.get("parentsCode").is_none());
    }
}
