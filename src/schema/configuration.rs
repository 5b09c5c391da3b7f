//! Serializable layout configuration for the sample index.
//!
//! A configuration is a plain document (usually JSON) describing which values
//! each channel indexes. It is frozen into a [`super::SampleIndexSchema`] once
//! per study version and never changes while an index is read.

use crate::codec::variant::MAX_CHUNK_SIZE;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_CHUNK_SIZE: u32 = 1_000_000;
pub const DEFAULT_FILE_POSITION_BITS: u32 = 3;

const QUAL_THRESHOLDS: [f64; 3] = [10.0, 20.0, 30.0];
const DP_THRESHOLDS: [f64; 7] = [5.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0];
const DP_THRESHOLDS_NULLABLE: [f64; 6] = [5.0, 10.0, 15.0, 20.0, 30.0, 50.0];
const POP_FREQ_THRESHOLDS: [f64; 7] = [0.0000001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    File,
    Sample,
    Annotation,
}

/// How a field maps values to codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexFieldKind {
    /// Numeric buckets split at ascending thresholds.
    Range { thresholds: Vec<f64> },
    /// One value out of a list, code 0 meaning "none of them".
    Categorical { values: Vec<String> },
    /// One bit per value.
    CategoricalMultiValue {
        values: Vec<String>,
        #[serde(default, rename = "valuesMapping", skip_serializing_if = "BTreeMap::is_empty")]
        values_mapping: BTreeMap<String, Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFieldConfiguration {
    pub source: Source,
    pub key: String,
    #[serde(flatten)]
    pub kind: IndexFieldKind,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

fn default_true() -> bool {
    true
}

impl IndexFieldConfiguration {
    pub fn range(source: Source, key: &str, thresholds: &[f64]) -> Self {
        Self {
            source,
            key: key.to_string(),
            kind: IndexFieldKind::Range {
                thresholds: thresholds.to_vec(),
            },
            nullable: true,
        }
    }

    pub fn categorical(source: Source, key: &str, values: &[&str]) -> Self {
        Self {
            source,
            key: key.to_string(),
            kind: IndexFieldKind::Categorical {
                values: values.iter().map(|v| v.to_string()).collect(),
            },
            nullable: true,
        }
    }

    pub fn multi_value(source: Source, key: &str, values: &[&str]) -> Self {
        Self {
            source,
            key: key.to_string(),
            kind: IndexFieldKind::CategoricalMultiValue {
                values: values.iter().map(|v| v.to_string()).collect(),
                values_mapping: BTreeMap::new(),
            },
            nullable: true,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_mapping(mut self, value: &str, aliases: &[&str]) -> Self {
        if let IndexFieldKind::CategoricalMultiValue { values_mapping, .. } = &mut self.kind {
            values_mapping.insert(
                value.to_string(),
                aliases.iter().map(|a| a.to_string()).collect(),
            );
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            IndexFieldKind::Range { thresholds } => {
                if thresholds.is_empty() {
                    return Err(Error::InvalidSchema(format!(
                        "range field '{}' has no thresholds",
                        self.key
                    )));
                }
                if thresholds.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(Error::InvalidSchema(format!(
                        "thresholds of '{}' must be strictly ascending",
                        self.key
                    )));
                }
            }
            IndexFieldKind::Categorical { values } => {
                if values.is_empty() {
                    return Err(Error::InvalidSchema(format!(
                        "categorical field '{}' has no values",
                        self.key
                    )));
                }
            }
            IndexFieldKind::CategoricalMultiValue {
                values,
                values_mapping,
            } => {
                if values.is_empty() || values.len() > 32 {
                    return Err(Error::InvalidSchema(format!(
                        "multi-value field '{}' needs 1 to 32 values, got {}",
                        self.key,
                        values.len()
                    )));
                }
                if let Some(unknown) = values_mapping.keys().find(|k| !values.contains(k)) {
                    return Err(Error::InvalidSchema(format!(
                        "mapping of '{}' refers to unknown value '{}'",
                        self.key, unknown
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileIndexConfiguration {
    pub custom_fields: Vec<IndexFieldConfiguration>,
    pub file_position_bits: u32,
}

impl Default for FileIndexConfiguration {
    fn default() -> Self {
        Self {
            custom_fields: vec![
                IndexFieldConfiguration::categorical(Source::File, "FILTER", &["PASS"]),
                IndexFieldConfiguration::range(Source::File, "QUAL", &QUAL_THRESHOLDS),
                IndexFieldConfiguration::range(Source::Sample, "DP", &DP_THRESHOLDS_NULLABLE),
            ],
            file_position_bits: DEFAULT_FILE_POSITION_BITS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileDataConfiguration {
    pub include_original_call: bool,
    pub include_secondary_alternates: bool,
}

impl Default for FileDataConfiguration {
    fn default() -> Self {
        Self {
            include_original_call: true,
            include_secondary_alternates: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population {
    pub study: String,
    pub population: String,
}

impl Population {
    pub fn new(study: &str, population: &str) -> Self {
        Self {
            study: study.to_string(),
            population: population.to_string(),
        }
    }

    /// `study:population`, the key used in annotation inputs.
    pub fn key(&self) -> String {
        format!("{}:{}", self.study, self.population)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationFrequencyIndexConfiguration {
    pub populations: Vec<Population>,
    pub thresholds: Vec<f64>,
}

impl Default for PopulationFrequencyIndexConfiguration {
    fn default() -> Self {
        Self {
            populations: vec![
                Population::new("1kG_phase3", "ALL"),
                Population::new("GNOMAD_GENOMES", "ALL"),
            ],
            thresholds: POP_FREQ_THRESHOLDS.to_vec(),
        }
    }
}

impl PopulationFrequencyIndexConfiguration {
    pub fn to_index_fields(&self) -> Vec<IndexFieldConfiguration> {
        self.populations
            .iter()
            .map(|p| {
                IndexFieldConfiguration::range(Source::Annotation, &p.key(), &self.thresholds)
                    .with_nullable(false)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationIndexConfiguration {
    pub population_frequency: PopulationFrequencyIndexConfiguration,
    pub consequence_type: IndexFieldConfiguration,
    pub biotype: IndexFieldConfiguration,
    pub transcript_flag: IndexFieldConfiguration,
    pub clinical_source: IndexFieldConfiguration,
    pub clinical_significance: IndexFieldConfiguration,
}

impl Default for AnnotationIndexConfiguration {
    fn default() -> Self {
        Self {
            population_frequency: PopulationFrequencyIndexConfiguration::default(),
            consequence_type: IndexFieldConfiguration::multi_value(
                Source::Annotation,
                "consequenceType",
                &[
                    "missense_variant",
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
                    "feature_truncation",
                    "synonymous_variant",
                    "regulatory_region_variant",
                    "TF_binding_site_variant",
                    "mature_miRNA_variant",
                    "upstream_gene_variant",
                    "downstream_gene_variant",
                    "3_prime_UTR_variant",
                    "5_prime_UTR_variant",
                    "intron_variant",
                ],
            ),
            biotype: IndexFieldConfiguration::multi_value(
                Source::Annotation,
                "biotype",
                &[
                    "nonsense_mediated_decay",
                    "lincRNA",
                    "miRNA",
                    "retained_intron",
                    "snRNA",
                    "snoRNA",
                    "other_non_pseudo_gene",
                    "protein_coding",
                ],
            )
            .with_mapping(
                "lincRNA",
                &[
                    "lncRNA",
                    "non_coding",
                    "lincRNA",
                    "macro_lncRNA",
                    "antisense",
                    "sense_intronic",
                    "sense_overlapping",
                    "3prime_overlapping_ncrna",
                    "bidirectional_promoter_lncRNA",
                ],
            )
            .with_mapping(
                "other_non_pseudo_gene",
                &[
                    "processed_transcript",
                    "non_stop_decay",
                    "misc_RNA",
                    "rRNA",
                    "Mt_rRNA",
                    "Mt_tRNA",
                    "IG_C_gene",
                    "IG_D_gene",
                    "IG_J_gene",
                    "IG_V_gene",
                    "TR_C_gene",
                    "TR_D_gene",
                    "TR_J_gene",
                    "TR_V_gene",
                    "nmd_transcript_variant",
                    "transcribed_unprocessed_pseudogene",
                    "ambiguous_orf",
                    "known_ncrna",
                    "retrotransposed",
                    "LRG_gene",
                ],
            ),
            transcript_flag: IndexFieldConfiguration::multi_value(
                Source::Annotation,
                "transcriptFlag",
                &[
                    "canonical",
                    "MANE_Select",
                    "MANE_Plus_Clinical",
                    "CCDS",
                    "basic",
                    "LRG",
                    "EGLH_HaemOnc",
                    "TSO500",
                ],
            ),
            clinical_source: IndexFieldConfiguration::multi_value(
                Source::Annotation,
                "clinicalSource",
                &["clinvar", "cosmic"],
            )
            .with_nullable(false),
            clinical_significance: IndexFieldConfiguration::multi_value(
                Source::Annotation,
                "clinicalSignificance",
                &[
                    "benign",
                    "likely_benign",
                    "uncertain_significance",
                    "likely_pathogenic",
                    "pathogenic",
                ],
            )
            .with_nullable(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SampleIndexConfiguration {
    pub chunk_size: u32,
    pub file_index: FileIndexConfiguration,
    pub file_data: FileDataConfiguration,
    pub annotation_index: AnnotationIndexConfiguration,
}

impl Default for SampleIndexConfiguration {
    fn default() -> Self {
        Self::default_configuration()
    }
}

impl SampleIndexConfiguration {
    pub fn default_configuration() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            file_index: FileIndexConfiguration::default(),
            file_data: FileDataConfiguration::default(),
            annotation_index: AnnotationIndexConfiguration::default(),
        }
    }

    /// Layout used by indexes written before file data and transcript flags existed.
    pub fn backward_compatible_configuration() -> Self {
        let mut configuration = Self::default_configuration();
        configuration.file_index = FileIndexConfiguration {
            custom_fields: vec![
                IndexFieldConfiguration::categorical(Source::File, "FILTER", &["PASS"]),
                IndexFieldConfiguration::range(Source::File, "QUAL", &QUAL_THRESHOLDS)
                    .with_nullable(false),
                IndexFieldConfiguration::range(Source::Sample, "DP", &DP_THRESHOLDS)
                    .with_nullable(false),
                IndexFieldConfiguration::categorical(
                    Source::Sample,
                    "padding",
                    &["add_two_extra_bits", "to_allow_backward", "compatibility"],
                ),
            ],
            file_position_bits: 4,
        };
        configuration.file_data = FileDataConfiguration {
            include_original_call: false,
            include_secondary_alternates: false,
        };
        configuration.annotation_index.population_frequency.thresholds = vec![0.001, 0.005, 0.01];
        configuration.annotation_index.clinical_source =
            IndexFieldConfiguration::multi_value(Source::Annotation, "clinicalSource", &["cosmic"])
                .with_nullable(false);
        configuration.annotation_index.clinical_significance = IndexFieldConfiguration::multi_value(
            Source::Annotation,
            "clinicalSignificance",
            &[
                "likely_benign",
                "uncertain_significance",
                "likely_pathogenic",
                "pathogenic",
                "unused_target_drug",
                "unused_pgx",
                "unused_bit8",
            ],
        )
        .with_nullable(false);
        configuration
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let configuration: Self = serde_json::from_str(json)?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::InvalidSchema(format!(
                "chunk size must be within 1..={}, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }
        if !(1..=16).contains(&self.file_index.file_position_bits) {
            return Err(Error::InvalidSchema(format!(
                "file position bits must be within 1..=16, got {}",
                self.file_index.file_position_bits
            )));
        }
        for field in &self.file_index.custom_fields {
            field.validate()?;
        }
        let annotation = &self.annotation_index;
        if annotation.population_frequency.populations.is_empty() {
            return Err(Error::InvalidSchema("no populations configured".to_string()));
        }
        for field in annotation.population_frequency.to_index_fields() {
            field.validate()?;
        }
        for field in [
            &annotation.consequence_type,
            &annotation.biotype,
            &annotation.transcript_flag,
            &annotation.clinical_source,
            &annotation.clinical_significance,
        ] {
            if !matches!(field.kind, IndexFieldKind::CategoricalMultiValue { .. }) {
                return Err(Error::InvalidSchema(format!(
                    "annotation field '{}' must be CATEGORICAL_MULTI_VALUE",
                    field.key
                )));
            }
            field.validate()?;
        }
        Ok(())
    }
}
