//! Annotation channel layouts.
//!
//! Every element carries a one-byte summary. Consequence type, biotype and
//! transcript flag codes are stored only for non-intergenic elements, clinical
//! codes only for clinical elements, population frequencies for every element.

use super::configuration::{AnnotationIndexConfiguration, IndexFieldConfiguration};
use super::field::{FieldInput, IndexField};
use crate::codec::{BitBuffer, BitReader, BitWriter, read_at};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Bit masks of the one-byte annotation summary.
pub struct AnnotationSummary;

impl AnnotationSummary {
    pub const INTERGENIC: u8 = 1 << 0;
    pub const CLINICAL: u8 = 1 << 1;
    pub const LOF: u8 = 1 << 2;
    pub const MISSENSE: u8 = 1 << 3;
    pub const LOFE: u8 = 1 << 4;
    pub const POP_FREQ_ANY_001: u8 = 1 << 5;
    pub const LOF_EXTENDED_BASIC: u8 = 1 << 6;
    pub const CUSTOM: u8 = 1 << 7;

    pub const NAMES: [&'static str; 8] = [
        "intergenic",
        "clinical",
        "lof",
        "missense",
        "lofe",
        "popFreqAny001",
        "lofExtendedBasic",
        "custom",
    ];

    pub fn is_non_intergenic(summary: u8) -> bool {
        summary & Self::INTERGENIC == 0
    }

    pub fn is_clinical(summary: u8) -> bool {
        summary & Self::CLINICAL != 0
    }
}

/// Loss-of-function consequence types. Missense is not part of the set.
pub const LOF_CONSEQUENCE_TYPES: [&str; 13] = [
    "frameshift_variant",
    "inframe_deletion",
    "inframe_insertion",
    "start_lost",
    "stop_gained",
    "stop_lost",
    "splice_acceptor_variant",
    "splice_donor_variant",
    "transcript_ablation",
    "transcript_amplification",
    "initiator_codon_variant",
    "splice_region_variant",
    "incomplete_terminal_codon_variant",
];

pub const MISSENSE_VARIANT: &str = "missense_variant";
pub const BASIC_FLAG: &str = "basic";
/// Frequency under which a variant counts as rare in a population.
pub const RARE_FREQUENCY: f64 = 0.001;

/// Decoded ct x bt x tf presence matrix of one element.
///
/// Rows follow the set bits of the consequence type code (lowest first), then
/// the set bits of the biotype code; each row holds one bit per set transcript
/// flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CombinationTriple {
    pub x: u64,
    pub y: u64,
    pub z: u64,
    pub matrix: Vec<u64>,
}

impl CombinationTriple {
    /// True if the single-bit codes `x`, `y` and `z` appear together.
    pub fn contains(&self, x: u64, y: u64, z: u64) -> bool {
        let (Some(ix), Some(iy), Some(iz)) = (
            rank(self.x, x),
            rank(self.y, y),
            rank(self.z, z),
        ) else {
            return false;
        };
        let num_y = self.y.count_ones() as usize;
        self.matrix
            .get(ix * num_y + iy)
            .is_some_and(|row| row & (1 << iz) != 0)
    }

    pub fn clear(&mut self) {
        self.x = 0;
        self.y = 0;
        self.z = 0;
        self.matrix.clear();
    }
}

/// Ordinal of the single set bit of `bit` among the set bits of `code`.
fn rank(code: u64, bit: u64) -> Option<usize> {
    if bit.count_ones() != 1 || code & bit == 0 {
        return None;
    }
    Some((code & (bit - 1)).count_ones() as usize)
}

/// Variable-width combination channel; width is `pop(x) * pop(y) * pop(z)` bits.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinationTripleField {
    x_bits: u32,
    y_bits: u32,
    z_bits: u32,
}

impl CombinationTripleField {
    pub fn new(x: &IndexField, y: &IndexField, z: &IndexField) -> Result<Self> {
        if x.bit_length() > 32 || y.bit_length() > 32 || z.bit_length() > 32 {
            return Err(Error::InvalidSchema(
                "combination fields support at most 32 values per axis".to_string(),
            ));
        }
        Ok(Self {
            x_bits: x.bit_length(),
            y_bits: y.bit_length(),
            z_bits: z.bit_length(),
        })
    }

    pub fn element_bits(x: u64, y: u64, z: u64) -> usize {
        (x.count_ones() * y.count_ones() * z.count_ones()) as usize
    }

    /// Read one element into `out`, reusing its matrix allocation.
    pub fn read_into(
        &self,
        reader: &mut BitReader<'_>,
        x: u64,
        y: u64,
        z: u64,
        out: &mut CombinationTriple,
    ) -> Result<()> {
        out.clear();
        out.x = x;
        out.y = y;
        out.z = z;
        let rows = (x.count_ones() * y.count_ones()) as usize;
        let num_z = z.count_ones();
        for _ in 0..rows {
            let row = reader.read(num_z)?;
            // stored with the lowest z value first
            out.matrix.push(reverse_bits(row, num_z));
        }
        Ok(())
    }

    /// Encode the triples (single-bit codes) present in one element.
    pub fn write(&self, writer: &mut BitWriter, x: u64, y: u64, z: u64, triples: &[(u64, u64, u64)]) {
        let num_y = y.count_ones() as usize;
        let num_z = z.count_ones();
        let rows = x.count_ones() as usize * num_y;
        let mut matrix = vec![0u64; rows];
        for (tx, ty, tz) in triples {
            if let (Some(ix), Some(iy), Some(iz)) = (rank(x, *tx), rank(y, *ty), rank(z, *tz)) {
                matrix[ix * num_y + iy] |= 1 << iz;
            }
        }
        for row in matrix {
            writer.write(reverse_bits(row, num_z), num_z);
        }
    }

    pub fn axis_bits(&self) -> (u32, u32, u32) {
        (self.x_bits, self.y_bits, self.z_bits)
    }
}

fn reverse_bits(value: u64, n: u32) -> u64 {
    if n == 0 {
        return 0;
    }
    value.reverse_bits() >> (64 - n)
}

/// Fixed bits per element, one range field per configured population.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationFrequencySchema {
    fields: Vec<IndexField>,
    element_bits: u32,
}

impl PopulationFrequencySchema {
    pub fn new(configurations: &[IndexFieldConfiguration]) -> Result<Self> {
        let (fields, element_bits) = layout(configurations)?;
        Ok(Self {
            fields,
            element_bits,
        })
    }

    pub fn element_bits(&self) -> u32 {
        self.element_bits
    }

    pub fn fields(&self) -> &[IndexField] {
        &self.fields
    }

    pub fn field(&self, study: &str, population: &str) -> Option<&IndexField> {
        let key = format!("{}:{}", study, population);
        self.fields.iter().find(|f| f.key() == key)
    }

    pub fn read(&self, view: &[u8], index: usize) -> Result<BitBuffer> {
        let bits = read_at(view, index * self.element_bits as usize, self.element_bits)?;
        Ok(BitBuffer::new(bits, self.element_bits))
    }

    /// Missing populations are indexed as frequency 0.
    pub fn encode(&self, frequencies: &BTreeMap<String, f64>) -> Result<BitBuffer> {
        let mut bits = 0u64;
        for field in &self.fields {
            let frequency = frequencies.get(field.key()).copied().unwrap_or(0.0);
            bits = (bits << field.bit_length()) | field.encode(&FieldInput::Number(frequency))?;
        }
        Ok(BitBuffer::new(bits, self.element_bits))
    }

    pub fn is_rare_everywhere(frequencies: &BTreeMap<String, f64>, populations: &[String]) -> bool {
        populations
            .iter()
            .all(|p| frequencies.get(p).copied().unwrap_or(0.0) < RARE_FREQUENCY)
    }
}

/// Fixed bits per clinical element: source bits followed by significance bits.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalSchema {
    source: IndexField,
    significance: IndexField,
}

impl ClinicalSchema {
    pub fn new(source: &IndexFieldConfiguration, significance: &IndexFieldConfiguration) -> Result<Self> {
        let source = IndexField::new(source, 0)?;
        let significance = IndexField::new(significance, source.end_bit())?;
        Ok(Self {
            source,
            significance,
        })
    }

    pub fn element_bits(&self) -> u32 {
        self.significance.end_bit()
    }

    pub fn source(&self) -> &IndexField {
        &self.source
    }

    pub fn significance(&self) -> &IndexField {
        &self.significance
    }

    pub fn read(&self, view: &[u8], clinical_index: usize) -> Result<BitBuffer> {
        let bits = self.element_bits();
        Ok(BitBuffer::new(
            read_at(view, clinical_index * bits as usize, bits)?,
            bits,
        ))
    }

    pub fn encode(&self, assertions: &[(String, String)]) -> BitBuffer {
        let (sources, significances) = assertions.iter().fold((0u64, 0u64), |(so, si), (a, b)| {
            (so | self.source.encode_term(a), si | self.significance.encode_term(b))
        });
        BitBuffer::new(
            (sources << self.significance.bit_length()) | significances,
            self.element_bits(),
        )
    }
}

fn layout(configurations: &[IndexFieldConfiguration]) -> Result<(Vec<IndexField>, u32)> {
    let mut offset = 0;
    let mut fields = Vec::with_capacity(configurations.len());
    for configuration in configurations {
        let field = IndexField::new(configuration, offset)?;
        offset = field.end_bit();
        fields.push(field);
    }
    if offset > 64 {
        return Err(Error::InvalidSchema(format!(
            "population frequency element needs {} bits, at most 64 are supported",
            offset
        )));
    }
    Ok((fields, offset))
}

/// Every annotation channel layout of one schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationIndexSchema {
    pub consequence_type: IndexField,
    pub biotype: IndexField,
    pub transcript_flag: IndexField,
    pub ct_bt_tf: CombinationTripleField,
    pub population_frequency: PopulationFrequencySchema,
    pub clinical: ClinicalSchema,
    population_keys: Vec<String>,
}

impl AnnotationIndexSchema {
    pub fn new(configuration: &AnnotationIndexConfiguration) -> Result<Self> {
        let consequence_type = IndexField::new(&configuration.consequence_type, 0)?;
        let biotype = IndexField::new(&configuration.biotype, 0)?;
        let transcript_flag = IndexField::new(&configuration.transcript_flag, 0)?;
        let ct_bt_tf = CombinationTripleField::new(&consequence_type, &biotype, &transcript_flag)?;
        let population_frequency = PopulationFrequencySchema::new(
            &configuration.population_frequency.to_index_fields(),
        )?;
        let clinical = ClinicalSchema::new(
            &configuration.clinical_source,
            &configuration.clinical_significance,
        )?;
        Ok(Self {
            consequence_type,
            biotype,
            transcript_flag,
            ct_bt_tf,
            population_frequency,
            clinical,
            population_keys: configuration
                .population_frequency
                .populations
                .iter()
                .map(|p| p.key())
                .collect(),
        })
    }

    pub fn population_keys(&self) -> &[String] {
        &self.population_keys
    }
}

/// Decoded annotation channels of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationIndexEntry {
    pub summary: u8,
    pub consequence_type: Option<u64>,
    pub biotype: Option<u64>,
    pub transcript_flag: Option<u64>,
    pub ct_bt_tf: Option<CombinationTriple>,
    pub population_frequency: Option<BitBuffer>,
    pub clinical: Option<BitBuffer>,
}

impl AnnotationIndexEntry {
    pub fn is_intergenic(&self) -> bool {
        !AnnotationSummary::is_non_intergenic(self.summary)
    }

    pub fn is_clinical(&self) -> bool {
        AnnotationSummary::is_clinical(self.summary)
    }

    pub fn has(&self, mask: u8) -> bool {
        self.summary & mask == mask
    }

    /// Reset to an empty value, keeping the matrix allocation.
    pub(crate) fn reset(&mut self) {
        self.summary = 0;
        self.consequence_type = None;
        self.biotype = None;
        self.transcript_flag = None;
        if let Some(triple) = self.ct_bt_tf.as_mut() {
            triple.clear();
        }
        self.population_frequency = None;
        self.clinical = None;
    }
}
