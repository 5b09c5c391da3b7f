use super::AppState;
use crate::{
    Result,
    query::SampleIndexQuery,
    types::{ChunkInfo, ChunksBody, GenotypeCount, SampleIndexResponse},
};
use axum::{
    Json,
    extract::{Path, State},
};

/// Stored chunks of a sample with per-genotype counts.
pub async fn get_chunks(
    State(state): State<AppState>,
    Path((study, sample)): Path<(String, String)>,
) -> Result<Json<SampleIndexResponse<ChunksBody>>> {
    let entries = state
        .reader
        .entries(&SampleIndexQuery::new(&study, &sample))
        .await?;

    let chunks = entries
        .iter()
        .map(|entry| ChunkInfo {
            chromosome: entry.chromosome().to_string(),
            batch_start: entry.batch_start(),
            region: entry.chunk().region(&state.schema).to_string(),
            genotypes: entry
                .gt_entries()
                .map(|gt| GenotypeCount {
                    genotype: gt.genotype().to_string(),
                    count: gt.count(),
                })
                .collect(),
            discrepancies: entry.discrepancies(),
        })
        .collect();

    Ok(Json(SampleIndexResponse {
        sample_index: ChunksBody {
            study,
            sample,
            chunks,
        },
    }))
}
