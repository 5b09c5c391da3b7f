use crate::schema::SampleIndexSchema;
use crate::types::Region;
use serde::Serialize;
use std::fmt;

/// Identity of one stored chunk: chromosome plus the stride-aligned start.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleIndexEntryChunk {
    pub chromosome: String,
    pub batch_start: u32,
}

impl SampleIndexEntryChunk {
    pub fn new(chromosome: &str, batch_start: u32) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            batch_start,
        }
    }

    pub fn region(&self, schema: &SampleIndexSchema) -> Region {
        schema.chunk_region(&self.chromosome, self.batch_start)
    }

    pub fn overlaps(&self, schema: &SampleIndexSchema, region: &Region) -> bool {
        let own = self.region(schema);
        own.chromosome == region.chromosome && own.start <= region.end && region.start <= own.end
    }
}

impl fmt::Display for SampleIndexEntryChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.chromosome, self.batch_start)
    }
}
