//! Reads sample index rows through a [`Storage`] backend and answers
//! variant, count and mendelian queries over them.

use crate::models::{
    MendelianFilter, MendelianRecord, SampleIndexEntry, SampleIndexEntryChunk,
    SampleIndexVariant, SampleIndexVariantComparator,
};
use crate::schema::SampleIndexSchema;
use crate::storage::{RowCodec, Storage};
use crate::types::Region;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// What to read for one sample.
#[derive(Debug, Clone, Default)]
pub struct SampleIndexQuery {
    pub study: String,
    pub sample: String,
    /// Empty means every stored chunk.
    pub regions: Vec<Region>,
    /// Empty means every genotype bucket.
    pub genotypes: Vec<String>,
    pub mendelian: Option<MendelianFilter>,
}

impl SampleIndexQuery {
    pub fn new(study: &str, sample: &str) -> Self {
        Self {
            study: study.to_string(),
            sample: sample.to_string(),
            ..Default::default()
        }
    }

    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_genotypes(mut self, genotypes: Vec<String>) -> Self {
        self.genotypes = genotypes;
        self
    }

    pub fn with_mendelian(mut self, mendelian: Option<MendelianFilter>) -> Self {
        self.mendelian = mendelian;
        self
    }

    fn in_regions(&self, chromosome: &str, position: u32) -> bool {
        self.regions.is_empty() || self.regions.iter().any(|r| r.contains(chromosome, position))
    }

    fn wants_genotype(&self, genotype: &str) -> bool {
        self.genotypes.is_empty() || self.genotypes.iter().any(|g| g == genotype)
    }

    /// Whether every position of `chunk` is selected, so bucket counts can be used as is.
    fn covers(&self, schema: &SampleIndexSchema, chunk: &SampleIndexEntryChunk) -> bool {
        let own = chunk.region(schema);
        self.regions.is_empty()
            || self.regions.iter().any(|r| {
                r.chromosome == own.chromosome && r.start <= own.start.max(1) && own.end <= r.end
            })
    }
}

#[derive(Clone)]
pub struct SampleIndexReader {
    storage: Arc<dyn Storage>,
    schema: Arc<SampleIndexSchema>,
}

impl SampleIndexReader {
    pub fn new(storage: Arc<dyn Storage>, schema: Arc<SampleIndexSchema>) -> Self {
        Self { storage, schema }
    }

    pub fn schema(&self) -> &SampleIndexSchema {
        &self.schema
    }

    async fn chunks(&self, query: &SampleIndexQuery) -> Result<BTreeSet<SampleIndexEntryChunk>> {
        if !self.storage.exists(&query.study, &query.sample).await? {
            return Err(Error::NotFound(format!("{}/{}", query.study, query.sample)));
        }
        let mut chunks = BTreeSet::new();
        if query.regions.is_empty() {
            chunks.extend(self.storage.list_chunks(&query.study, &query.sample, None).await?);
            return Ok(chunks);
        }
        // only stored chunks are read, however wide the region
        let mut stored: BTreeMap<&str, Vec<SampleIndexEntryChunk>> = BTreeMap::new();
        for region in &query.regions {
            let chromosome = region.chromosome.as_str();
            if !stored.contains_key(chromosome) {
                let listed = self
                    .storage
                    .list_chunks(&query.study, &query.sample, Some(chromosome))
                    .await?;
                stored.insert(chromosome, listed);
            }
            chunks.extend(
                stored[chromosome]
                    .iter()
                    .filter(|chunk| chunk.overlaps(&self.schema, region))
                    .cloned(),
            );
        }
        Ok(chunks)
    }

    /// Decoded entry of one chunk, `None` if nothing is stored there.
    pub async fn read_entry(
        &self,
        study: &str,
        sample: &str,
        chunk: &SampleIndexEntryChunk,
    ) -> Result<Option<SampleIndexEntry>> {
        let Some(row) = self.storage.read_row(study, sample, chunk).await? else {
            return Ok(None);
        };
        let (header, entry) = RowCodec::decode(row)?;
        if header.schema_version != self.schema.version() {
            tracing::warn!(
                "row {} of {}/{} uses schema version {}, server runs {}",
                chunk,
                study,
                sample,
                header.schema_version,
                self.schema.version()
            );
            return Err(Error::InvalidSchema(format!(
                "row {} was written with schema version {}",
                chunk, header.schema_version
            )));
        }
        if entry.chunk() != chunk {
            return Err(Error::Decode(format!(
                "row stored as {} describes chunk {}",
                chunk,
                entry.chunk()
            )));
        }
        if entry.discrepancies() > 0 {
            tracing::warn!(
                "{}/{} chunk {} has {} discrepancies",
                study,
                sample,
                chunk,
                entry.discrepancies()
            );
        }
        tracing::debug!("decoded {} variants for chunk {}", entry.count(), chunk);
        Ok(Some(entry))
    }

    /// Every stored entry selected by the query's regions, in chunk order.
    pub async fn entries(&self, query: &SampleIndexQuery) -> Result<Vec<SampleIndexEntry>> {
        let mut entries = Vec::new();
        for chunk in self.chunks(query).await? {
            if let Some(entry) = self.read_entry(&query.study, &query.sample, &chunk).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Materialized variants, ordered by position and merged across genotypes.
    ///
    /// Stops after `limit` variants; the flag tells whether more were available.
    pub async fn variants(
        &self,
        query: &SampleIndexQuery,
        limit: Option<usize>,
    ) -> Result<(Vec<SampleIndexVariant>, bool)> {
        let comparator = SampleIndexVariantComparator::new(self.schema.file_index());
        let limit = limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for entry in self.entries(query).await? {
            let mut chunk_variants = self.entry_variants(query, &entry)?;
            comparator.sort(&mut chunk_variants);
            for variant in chunk_variants {
                if out.len() == limit {
                    return Ok((out, true));
                }
                out.push(variant);
            }
        }
        Ok((out, false))
    }

    fn entry_variants(
        &self,
        query: &SampleIndexQuery,
        entry: &SampleIndexEntry,
    ) -> Result<Vec<SampleIndexVariant>> {
        let mut out = Vec::new();
        for genotype in entry.genotypes().filter(|gt| query.wants_genotype(gt)) {
            let Some(iter) = entry.iterator(genotype, &self.schema)? else {
                continue;
            };
            if iter.is_count_only() {
                return Err(Error::MissingChannel("variants"));
            }
            for variant in iter {
                let variant = variant?;
                if !query.in_regions(&variant.variant.chromosome, variant.variant.start) {
                    continue;
                }
                if let Some(filter) = query.mendelian {
                    if !variant.mendelian_code.is_some_and(|code| filter.matches(code)) {
                        continue;
                    }
                }
                out.push(variant);
            }
        }
        Ok(out)
    }

    /// Number of matching variants. Chunks fully inside the query use the stored counts.
    pub async fn count(&self, query: &SampleIndexQuery) -> Result<usize> {
        let mut total = 0;
        for entry in self.entries(query).await? {
            if let Some(filter) = query.mendelian {
                for record in entry.mendelian_errors() {
                    let record = record?;
                    if filter.matches(record.code)
                        && query.wants_genotype(record.genotype)
                        && query.in_regions(&record.variant.chromosome, record.variant.start)
                    {
                        total += 1;
                    }
                }
                continue;
            }
            let whole_chunk = query.covers(&self.schema, entry.chunk());
            for gt in entry.gt_entries().filter(|gt| query.wants_genotype(gt.genotype())) {
                if whole_chunk {
                    total += gt.count();
                    continue;
                }
                let Some(mut iter) = entry.iterator(gt.genotype(), &self.schema)? else {
                    continue;
                };
                while iter.has_next() {
                    let variant = iter.next_variant()?;
                    if query.in_regions(&variant.chromosome, variant.start) {
                        total += 1;
                    }
                }
            }
        }
        Ok(total)
    }

    /// Stored mendelian errors of the sample in the query's regions.
    pub async fn mendelian_variants(&self, query: &SampleIndexQuery) -> Result<Vec<MendelianRecord>> {
        let mut out = Vec::new();
        for entry in self.entries(query).await? {
            for record in entry.mendelian_errors() {
                let record = record?;
                if query.in_regions(&record.variant.chromosome, record.variant.start)
                    && query.wants_genotype(record.genotype)
                    && query.mendelian.is_none_or(|f| f.matches(record.code))
                {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndexedVariant, SampleIndexEntryBuilder, Variant};
    use crate::storage::LocalStorage;
    use crate::types::MAX_POSITION;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn reader_with_data(dir: &std::path::Path) -> SampleIndexReader {
        let schema = Arc::new(SampleIndexSchema::default_schema().unwrap());
        let storage = Arc::new(LocalStorage::new(dir.to_path_buf(), schema.version()));

        let mut first = SampleIndexEntryBuilder::new(&schema, "NA1", "1", 0);
        first
            .add("0/1", IndexedVariant::new(Variant::new("1", 500, "A", "G")))
            .unwrap()
            .add("1/1", IndexedVariant::new(Variant::new("1", 100, "C", "T")))
            .unwrap()
            .add("0/1", IndexedVariant::new(Variant::new("1", 900_000, "G", "A")))
            .unwrap()
            .add_mendelian_error(Variant::new("1", 500, "A", "G"), "0/1", 8)
            .unwrap();
        let mut second = SampleIndexEntryBuilder::new(&schema, "NA1", "1", 1_000_000);
        second
            .add("0/1", IndexedVariant::new(Variant::new("1", 1_000_001, "T", "TA")))
            .unwrap()
            .add_mendelian_error(Variant::new("1", 1_000_001, "T", "TA"), "0/1", 2)
            .unwrap();

        for builder in [first, second] {
            let entry = builder.build().unwrap();
            let row = RowCodec::encode(&entry, schema.version()).unwrap();
            storage.write_row("st", "NA1", entry.chunk(), row).await.unwrap();
        }
        SampleIndexReader::new(storage, schema)
    }

    #[tokio::test]
    async fn test_variants_sorted_across_genotypes_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let reader = reader_with_data(dir.path()).await;
        let (variants, truncated) = reader.variants(&SampleIndexQuery::new("st", "NA1"), None).await.unwrap();
        assert!(!truncated);
        let positions: Vec<u32> = variants.iter().map(|v| v.variant.start).collect();
        assert_eq!(positions, vec![100, 500, 900_000, 1_000_001]);
        assert_eq!(variants[0].genotype, "1/1");
        assert_eq!(variants[1].mendelian_code, Some(8));

        let (limited, truncated) = reader
            .variants(&SampleIndexQuery::new("st", "NA1"), Some(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert!(truncated);
    }

    #[tokio::test]
    async fn test_region_genotype_and_mendelian_filters() {
        let dir = tempfile::tempdir().unwrap();
        let reader = reader_with_data(dir.path()).await;

        let query = SampleIndexQuery::new("st", "NA1").with_regions(vec![Region::new("1", 400, 1_000_001)]);
        let (variants, _) = reader.variants(&query, None).await.unwrap();
        assert_eq!(variants.len(), 3);
        assert_eq!(reader.count(&query).await.unwrap(), 3);

        let query = query.with_genotypes(vec!["0/1".to_string()]).with_mendelian(Some(MendelianFilter::DeNovo));
        let (variants, _) = reader.variants(&query, None).await.unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].variant.start, 500);
        assert_eq!(reader.count(&query).await.unwrap(), 1);

        let all = SampleIndexQuery::new("st", "NA1");
        assert_eq!(reader.count(&all).await.unwrap(), 4);
        let mendelian = reader.mendelian_variants(&all).await.unwrap();
        assert_eq!(mendelian.len(), 2);
        assert_eq!(mendelian[1].code, 2);
    }

    /// Counts row reads on top of a local store.
    struct CountingStorage {
        inner: LocalStorage,
        reads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Storage for CountingStorage {
        async fn exists(&self, study: &str, sample: &str) -> Result<bool> {
            self.inner.exists(study, sample).await
        }

        async fn read_row(
            &self,
            study: &str,
            sample: &str,
            chunk: &SampleIndexEntryChunk,
        ) -> Result<Option<bytes::Bytes>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_row(study, sample, chunk).await
        }

        async fn write_row(
            &self,
            study: &str,
            sample: &str,
            chunk: &SampleIndexEntryChunk,
            row: bytes::Bytes,
        ) -> Result<()> {
            self.inner.write_row(study, sample, chunk, row).await
        }

        async fn list_chunks(
            &self,
            study: &str,
            sample: &str,
            chromosome: Option<&str>,
        ) -> Result<Vec<SampleIndexEntryChunk>> {
            self.inner.list_chunks(study, sample, chromosome).await
        }
    }

    #[tokio::test]
    async fn test_wide_regions_only_read_stored_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mut configuration = crate::schema::SampleIndexConfiguration::default_configuration();
        configuration.chunk_size = 1_000;
        let schema = Arc::new(SampleIndexSchema::new(1, &configuration).unwrap());
        let storage = Arc::new(CountingStorage {
            inner: LocalStorage::new(dir.path().to_path_buf(), schema.version()),
            reads: AtomicUsize::new(0),
        });
        for (chromosome, position) in [("1", 1), ("1", 5_000_500), ("2", 10)] {
            let mut builder = SampleIndexEntryBuilder::new(&schema, "NA1", chromosome, position);
            builder
                .add("0/1", IndexedVariant::new(Variant::new(chromosome, position, "A", "G")))
                .unwrap();
            let entry = builder.build().unwrap();
            let row = RowCodec::encode(&entry, schema.version()).unwrap();
            storage.write_row("st", "NA1", entry.chunk(), row).await.unwrap();
        }
        let reader = SampleIndexReader::new(storage.clone(), schema);

        let query = SampleIndexQuery::new("st", "NA1")
            .with_regions(vec![Region::new("1", 2, MAX_POSITION), Region::new("1", 3, 6_000_000)]);
        let (variants, _) = reader.variants(&query, None).await.unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].variant.start, 5_000_500);
        // the first chunk overlaps the region even though its variant is outside
        assert_eq!(storage.reads.load(Ordering::SeqCst), 2);

        let query = SampleIndexQuery::new("st", "NA1").with_regions(vec![Region::new("3", 1, 100)]);
        assert_eq!(reader.count(&query).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_sample_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reader = reader_with_data(dir.path()).await;
        let result = reader.count(&SampleIndexQuery::new("st", "NA2")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_schema_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let reader = reader_with_data(dir.path()).await;
        let chunk = SampleIndexEntryChunk::new("1", 0);
        let entry = reader.read_entry("st", "NA1", &chunk).await.unwrap().unwrap();
        let row = RowCodec::encode(&entry, 7).unwrap();
        reader.storage.write_row("st", "NA1", &chunk, row).await.unwrap();
        assert!(matches!(
            reader.read_entry("st", "NA1", &chunk).await,
            Err(Error::InvalidSchema(_))
        ));
    }
}
