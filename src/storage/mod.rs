//! Storage backend abstraction for sample index rows.
//!
//! A backend stores one opaque row per (study, sample, chunk); [`RowCodec`]
//! turns rows into [`SampleIndexEntry`](crate::models::SampleIndexEntry)
//! values and back.
//!
//! # Implementations
//!
//! - [`LocalStorage`] - Local filesystem storage
//!
//! # Example
//!
//! ```no_run
//! use sampleidx::storage::{Storage, LocalStorage};
//! use std::path::PathBuf;
//!
//! let storage = LocalStorage::new(PathBuf::from("./data"), 1);
//! ```

mod local;
mod row;

pub use local::LocalStorage;
pub use row::{RowCodec, RowHeader};

use crate::Result;
use crate::models::SampleIndexEntryChunk;
use async_trait::async_trait;
use bytes::Bytes;

/// Storage backend trait for sample index rows
#[async_trait]
pub trait Storage: Send + Sync {
    /// Check if any row exists for the sample
    async fn exists(&self, study: &str, sample: &str) -> Result<bool>;

    /// Raw row for one chunk, `None` if the sample has no variants there
    async fn read_row(
        &self,
        study: &str,
        sample: &str,
        chunk: &SampleIndexEntryChunk,
    ) -> Result<Option<Bytes>>;

    /// Store (or replace) the row of one chunk
    async fn write_row(
        &self,
        study: &str,
        sample: &str,
        chunk: &SampleIndexEntryChunk,
        row: Bytes,
    ) -> Result<()>;

    /// Stored chunks of the sample, sorted, optionally restricted to one chromosome
    async fn list_chunks(
        &self,
        study: &str,
        sample: &str,
        chromosome: Option<&str>,
    ) -> Result<Vec<SampleIndexEntryChunk>>;
}
