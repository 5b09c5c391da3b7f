use super::configuration::{IndexFieldConfiguration, IndexFieldKind, Source};
use crate::codec::BitBuffer;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Value handed to [`IndexField::encode`] on the write path.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Number(f64),
    Terms(Vec<String>),
    Missing,
}

impl FieldInput {
    pub fn term(value: &str) -> Self {
        FieldInput::Terms(vec![value.to_string()])
    }
}

/// Number of bits needed to tell `states` codes apart.
pub(crate) fn bits_for(states: u64) -> u32 {
    if states <= 1 {
        1
    } else {
        u64::BITS - (states - 1).leading_zeros()
    }
}

/// A configured field frozen at a bit offset inside its entry.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
    source: Source,
    key: String,
    kind: IndexFieldKind,
    nullable: bool,
    bit_offset: u32,
    bit_length: u32,
}

impl IndexField {
    pub fn new(configuration: &IndexFieldConfiguration, bit_offset: u32) -> Result<Self> {
        configuration.validate()?;
        let null_states = u64::from(configuration.nullable);
        let bit_length = match &configuration.kind {
            IndexFieldKind::Range { thresholds } => {
                bits_for(thresholds.len() as u64 + 1 + null_states)
            }
            IndexFieldKind::Categorical { values } => bits_for(values.len() as u64 + 1),
            IndexFieldKind::CategoricalMultiValue { values, .. } => values.len() as u32,
        };
        Ok(Self {
            source: configuration.source,
            key: configuration.key.clone(),
            kind: configuration.kind.clone(),
            nullable: configuration.nullable,
            bit_offset,
            bit_length,
        })
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &IndexFieldKind {
        &self.kind
    }

    pub fn bit_offset(&self) -> u32 {
        self.bit_offset
    }

    pub fn bit_length(&self) -> u32 {
        self.bit_length
    }

    pub fn end_bit(&self) -> u32 {
        self.bit_offset + self.bit_length
    }

    /// Extract this field's code from an entry.
    pub fn read(&self, entry: &BitBuffer) -> Result<u64> {
        entry.get(self.bit_offset, self.bit_length)
    }

    pub fn encode(&self, input: &FieldInput) -> Result<u64> {
        match (&self.kind, input) {
            (IndexFieldKind::Range { thresholds }, FieldInput::Number(value)) => {
                let bucket = thresholds.iter().filter(|t| *value >= **t).count() as u64;
                Ok(bucket + u64::from(self.nullable))
            }
            (IndexFieldKind::Range { .. }, FieldInput::Missing) if self.nullable => Ok(0),
            (IndexFieldKind::Categorical { values }, FieldInput::Terms(terms)) => Ok(terms
                .iter()
                .find_map(|t| values.iter().position(|v| v == t))
                .map(|i| i as u64 + 1)
                .unwrap_or(0)),
            (IndexFieldKind::Categorical { .. }, FieldInput::Missing) => Ok(0),
            (
                IndexFieldKind::CategoricalMultiValue {
                    values,
                    values_mapping,
                },
                FieldInput::Terms(terms),
            ) => Ok(terms.iter().fold(0u64, |code, term| {
                code | multi_value_bit(values, values_mapping, term)
            })),
            (IndexFieldKind::CategoricalMultiValue { .. }, FieldInput::Missing) => Ok(0),
            _ => Err(Error::InvalidInput(format!(
                "value {:?} does not fit field '{}'",
                input, self.key
            ))),
        }
    }

    pub fn encode_term(&self, term: &str) -> u64 {
        match &self.kind {
            IndexFieldKind::CategoricalMultiValue {
                values,
                values_mapping,
            } => multi_value_bit(values, values_mapping, term),
            IndexFieldKind::Categorical { values } => values
                .iter()
                .position(|v| v == term)
                .map(|i| i as u64 + 1)
                .unwrap_or(0),
            IndexFieldKind::Range { .. } => 0,
        }
    }

    /// Human readable values behind a code. Range buckets render as `[lo, hi)`.
    pub fn decode(&self, code: u64) -> Result<Vec<String>> {
        match &self.kind {
            IndexFieldKind::Range { thresholds } => {
                if self.nullable && code == 0 {
                    return Ok(Vec::new());
                }
                let bucket = (code - u64::from(self.nullable)) as usize;
                if bucket > thresholds.len() {
                    return Err(self.bad_code(code));
                }
                let lo = match bucket {
                    0 => "-inf".to_string(),
                    b => thresholds[b - 1].to_string(),
                };
                let hi = thresholds
                    .get(bucket)
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "inf".to_string());
                Ok(vec![format!("[{}, {})", lo, hi)])
            }
            IndexFieldKind::Categorical { values } => match code {
                0 => Ok(Vec::new()),
                c => values
                    .get(c as usize - 1)
                    .map(|v| vec![v.clone()])
                    .ok_or_else(|| self.bad_code(code)),
            },
            IndexFieldKind::CategoricalMultiValue { values, .. } => {
                if code >> values.len() != 0 {
                    return Err(self.bad_code(code));
                }
                Ok(values
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| code & (1 << i) != 0)
                    .map(|(_, v)| v.clone())
                    .collect())
            }
        }
    }

    fn bad_code(&self, code: u64) -> Error {
        Error::Decode(format!("code {} is outside field '{}'", code, self.key))
    }
}

fn multi_value_bit(values: &[String], mapping: &BTreeMap<String, Vec<String>>, term: &str) -> u64 {
    values
        .iter()
        .enumerate()
        .filter(|(_, value)| {
            *value == term
                || mapping
                    .get(*value)
                    .is_some_and(|aliases| aliases.iter().any(|a| a == term))
        })
        .fold(0, |code, (i, _)| code | (1 << i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(4), 2);
        assert_eq!(bits_for(5), 3);
        assert_eq!(bits_for(8), 3);
    }

    #[test]
    fn test_range_field() {
        let configuration = IndexFieldConfiguration::range(Source::File, "QUAL", &[10.0, 20.0, 30.0])
            .with_nullable(false);
        let field = IndexField::new(&configuration, 4).unwrap();
        assert_eq!(field.bit_length(), 2);
        assert_eq!(field.encode(&FieldInput::Number(5.0)).unwrap(), 0);
        assert_eq!(field.encode(&FieldInput::Number(20.0)).unwrap(), 2);
        assert_eq!(field.encode(&FieldInput::Number(99.0)).unwrap(), 3);
        assert!(field.encode(&FieldInput::Missing).is_err());
        assert_eq!(field.decode(0).unwrap(), vec!["[-inf, 10)"]);
        assert_eq!(field.decode(3).unwrap(), vec!["[30, inf)"]);

        let entry = BitBuffer::new(0b0000_10_0000, 10);
        assert_eq!(field.read(&entry).unwrap(), 2);
    }

    #[test]
    fn test_nullable_range_reserves_zero() {
        let configuration = IndexFieldConfiguration::range(Source::Sample, "DP", &[5.0, 10.0]);
        let field = IndexField::new(&configuration, 0).unwrap();
        assert_eq!(field.bit_length(), 2);
        assert_eq!(field.encode(&FieldInput::Missing).unwrap(), 0);
        assert_eq!(field.encode(&FieldInput::Number(1.0)).unwrap(), 1);
        assert!(field.decode(0).unwrap().is_empty());
        assert_eq!(field.decode(1).unwrap(), vec!["[-inf, 5)"]);
    }

    #[test]
    fn test_categorical_field() {
        let configuration = IndexFieldConfiguration::categorical(Source::File, "FILTER", &["PASS"]);
        let field = IndexField::new(&configuration, 0).unwrap();
        assert_eq!(field.bit_length(), 1);
        assert_eq!(field.encode(&FieldInput::term("PASS")).unwrap(), 1);
        assert_eq!(field.encode(&FieldInput::term("LowQual")).unwrap(), 0);
        assert_eq!(field.decode(1).unwrap(), vec!["PASS"]);
        assert!(field.decode(2).is_err());
    }

    #[test]
    fn test_multi_value_field_with_mapping() {
        let configuration =
            IndexFieldConfiguration::multi_value(Source::Annotation, "biotype", &["lincRNA", "protein_coding"])
                .with_mapping("lincRNA", &["lncRNA", "antisense"]);
        let field = IndexField::new(&configuration, 0).unwrap();
        assert_eq!(field.bit_length(), 2);
        let code = field
            .encode(&FieldInput::Terms(vec![
                "antisense".to_string(),
                "protein_coding".to_string(),
                "unlisted".to_string(),
            ]))
            .unwrap();
        assert_eq!(code, 0b11);
        assert_eq!(field.encode_term("lncRNA"), 0b01);
        assert_eq!(field.decode(0b10).unwrap(), vec!["protein_coding"]);
        assert!(field.decode(0b100).is_err());
    }
}
