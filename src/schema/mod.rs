//! Versioned layout of the sample index.
//!
//! A [`SampleIndexSchema`] is built once from a [`SampleIndexConfiguration`]
//! and shared read-only (usually behind an `Arc`) by every reader and writer
//! of that study version.

pub mod annotation;
pub mod configuration;
pub mod field;
pub mod file_index;

pub use annotation::{
    AnnotationIndexEntry, AnnotationIndexSchema, AnnotationSummary, ClinicalSchema,
    CombinationTriple, CombinationTripleField, PopulationFrequencySchema,
};
pub use configuration::{
    IndexFieldConfiguration, IndexFieldKind, Population, SampleIndexConfiguration, Source,
};
pub use field::{FieldInput, IndexField};
pub use file_index::{FileData, FileDataSchema, FileIndexSchema};

use crate::models::SampleIndexEntryChunk;
use crate::types::Region;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleIndexSchema {
    version: u32,
    chunk_size: u32,
    configuration: SampleIndexConfiguration,
    file_index: FileIndexSchema,
    file_data: FileDataSchema,
    annotation: AnnotationIndexSchema,
}

impl SampleIndexSchema {
    pub fn new(version: u32, configuration: &SampleIndexConfiguration) -> Result<Self> {
        configuration.validate()?;
        Ok(Self {
            version,
            chunk_size: configuration.chunk_size,
            configuration: configuration.clone(),
            file_index: FileIndexSchema::new(&configuration.file_index)?,
            file_data: FileDataSchema::new(&configuration.file_data),
            annotation: AnnotationIndexSchema::new(&configuration.annotation_index)?,
        })
    }

    pub fn default_schema() -> Result<Self> {
        Self::new(1, &SampleIndexConfiguration::default_configuration())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn configuration(&self) -> &SampleIndexConfiguration {
        &self.configuration
    }

    pub fn file_index(&self) -> &FileIndexSchema {
        &self.file_index
    }

    pub fn file_data(&self) -> &FileDataSchema {
        &self.file_data
    }

    pub fn annotation(&self) -> &AnnotationIndexSchema {
        &self.annotation
    }

    /// Start of the chunk holding `position`.
    pub fn chunk_start(&self, position: u32) -> u32 {
        position - position % self.chunk_size
    }

    /// Inclusive region covered by the chunk starting at `batch_start`.
    pub fn chunk_region(&self, chromosome: &str, batch_start: u32) -> Region {
        Region {
            chromosome: chromosome.to_string(),
            start: batch_start,
            end: batch_start.saturating_add(self.chunk_size - 1),
        }
    }

    /// Every chunk overlapping `region`, ascending.
    pub fn chunks_for_region(&self, region: &Region) -> Vec<SampleIndexEntryChunk> {
        let first = self.chunk_start(region.start);
        let last = self.chunk_start(region.end);
        (first..=last)
            .step_by(self.chunk_size as usize)
            .map(|batch_start| SampleIndexEntryChunk::new(&region.chromosome, batch_start))
            .collect()
    }
}
