use crate::models::{MendelianFilter, SampleIndexVariant};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest position accepted in a region.
pub const MAX_POSITION: u32 = u32::MAX;

/// Genomic interval, 1-based and inclusive at both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub chromosome: String,
    pub start: u32,
    pub end: u32,
}

impl Region {
    pub fn new(chromosome: &str, start: u32, end: u32) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            start,
            end,
        }
    }

    pub fn whole_chromosome(chromosome: &str) -> Self {
        Self::new(chromosome, 1, MAX_POSITION)
    }

    pub fn contains(&self, chromosome: &str, position: u32) -> bool {
        self.chromosome == chromosome && self.start <= position && position <= self.end
    }

    /// Comma separated list, e.g. `1:100-200,2`.
    pub fn parse_list(text: &str) -> Result<Vec<Region>> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Region::from_str)
            .collect()
    }
}

impl FromStr for Region {
    type Err = Error;

    /// Accepts `chr`, `chr:pos` and `chr:start-end`.
    fn from_str(s: &str) -> Result<Self> {
        let (chromosome, range) = match s.rsplit_once(':') {
            Some((chromosome, range)) => (chromosome, Some(range)),
            None => (s, None),
        };
        if chromosome.is_empty() {
            return Err(Error::InvalidRange(format!("missing chromosome in '{}'", s)));
        }
        let parse = |v: &str| {
            v.replace(',', "")
                .parse::<u32>()
                .map_err(|_| Error::InvalidRange(format!("invalid position '{}' in '{}'", v, s)))
        };
        let (start, end) = match range {
            None => (1, MAX_POSITION),
            Some(range) => match range.split_once('-') {
                Some((start, end)) => (parse(start)?, parse(end)?),
                None => {
                    let pos = parse(range)?;
                    (pos, pos)
                }
            },
        };
        if start > end {
            return Err(Error::InvalidRange(format!(
                "start {} is greater than end {}",
                start, end
            )));
        }
        Ok(Region::new(chromosome, start, end))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

/// Query parameters of the variants and count endpoints.
#[derive(Debug, Deserialize, Default)]
pub struct VariantsQuery {
    /// Comma separated regions; whole sample if absent.
    pub region: Option<String>,
    /// Comma separated genotypes; every indexed genotype if absent.
    pub genotype: Option<String>,
    pub mendelian: Option<MendelianFilter>,
    pub limit: Option<usize>,
}

/// Sample index response envelope, `{"sampleIndex": {...}}`.
#[derive(Debug, Serialize)]
pub struct SampleIndexResponse<T> {
    #[serde(rename = "sampleIndex")]
    pub sample_index: T,
}

#[derive(Debug, Serialize)]
pub struct VariantsBody {
    pub study: String,
    pub sample: String,
    pub count: usize,
    pub truncated: bool,
    pub variants: Vec<SampleIndexVariant>,
}

#[derive(Debug, Serialize)]
pub struct CountBody {
    pub study: String,
    pub sample: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ChunkInfo {
    pub chromosome: String,
    #[serde(rename = "batchStart")]
    pub batch_start: u32,
    pub region: String,
    pub genotypes: Vec<GenotypeCount>,
    pub discrepancies: u32,
}

#[derive(Debug, Serialize)]
pub struct GenotypeCount {
    pub genotype: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ChunksBody {
    pub study: String,
    pub sample: String,
    pub chunks: Vec<ChunkInfo>,
}

/// Service info response (GA4GH service-info layout)
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub r#type: ServiceType,
    pub description: Option<String>,
    pub organization: Organization,
    pub version: String,
    #[serde(rename = "sampleIndex")]
    pub sample_index: SampleIndexCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Organization {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SampleIndexCapabilities {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "chunkSize")]
    pub chunk_size: u32,
    pub genotypes: Vec<&'static str>,
    #[serde(rename = "fileIndexFields")]
    pub file_index_fields: Vec<String>,
    pub populations: Vec<String>,
}
