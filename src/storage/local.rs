use super::Storage;
use crate::models::SampleIndexEntryChunk;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::form_urlencoded;

const ROW_EXTENSION: &str = "bin";

/// Rows as files: `{data_dir}/{study}_{version}/{sample}/{chromosome}_{batchStart}.bin`.
pub struct LocalStorage {
    data_dir: PathBuf,
    schema_version: u32,
}

impl LocalStorage {
    pub fn new(data_dir: PathBuf, schema_version: u32) -> Self {
        Self {
            data_dir,
            schema_version,
        }
    }

    fn sample_dir(&self, study: &str, sample: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}", encode(study), self.schema_version))
            .join(encode(sample))
    }

    fn make_row_path(&self, study: &str, sample: &str, chunk: &SampleIndexEntryChunk) -> PathBuf {
        self.sample_dir(study, sample).join(format!(
            "{}_{}.{}",
            encode(&chunk.chromosome),
            chunk.batch_start,
            ROW_EXTENSION
        ))
    }
}

fn encode(name: &str) -> String {
    form_urlencoded::byte_serialize(name.as_bytes()).collect()
}

fn decode(encoded: &str) -> Option<String> {
    form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
}

/// Chunk named by a row file name, `None` for anything else in the directory.
fn parse_row_name(file_name: &str) -> Option<SampleIndexEntryChunk> {
    let stem = file_name.strip_suffix(ROW_EXTENSION)?.strip_suffix('.')?;
    let (chromosome, batch_start) = stem.rsplit_once('_')?;
    let batch_start = batch_start.parse().ok()?;
    Some(SampleIndexEntryChunk::new(&decode(chromosome)?, batch_start))
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, study: &str, sample: &str) -> Result<bool> {
        Ok(fs::try_exists(self.sample_dir(study, sample)).await?)
    }

    async fn read_row(
        &self,
        study: &str,
        sample: &str,
        chunk: &SampleIndexEntryChunk,
    ) -> Result<Option<Bytes>> {
        let path = self.make_row_path(study, sample, chunk);
        match fs::read(&path).await {
            Ok(buf) => {
                tracing::debug!("read {} bytes from {:?}", buf.len(), path);
                Ok(Some(Bytes::from(buf)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_row(
        &self,
        study: &str,
        sample: &str,
        chunk: &SampleIndexEntryChunk,
        row: Bytes,
    ) -> Result<()> {
        let dir = self.sample_dir(study, sample);
        fs::create_dir_all(&dir).await?;
        let path = self.make_row_path(study, sample, chunk);
        let mut file = fs::File::create(&path).await?;
        file.write_all(&row).await?;
        file.flush().await?;
        Ok(())
    }

    async fn list_chunks(
        &self,
        study: &str,
        sample: &str,
        chromosome: Option<&str>,
    ) -> Result<Vec<SampleIndexEntryChunk>> {
        let dir = self.sample_dir(study, sample);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("{}/{}", study, sample)));
            }
            Err(e) => return Err(e.into()),
        };

        let mut chunks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(chunk) = name.to_str().and_then(parse_row_name) else {
                tracing::warn!("ignoring unexpected file {:?} in {:?}", name, dir);
                continue;
            };
            if chromosome.is_none_or(|c| c == chunk.chromosome) {
                chunks.push(chunk);
            }
        }
        chunks.sort();
        Ok(chunks)
    }
}
