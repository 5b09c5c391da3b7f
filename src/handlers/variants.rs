use super::AppState;
use crate::{
    Result,
    query::SampleIndexQuery,
    types::{CountBody, Region, SampleIndexResponse, VariantsBody, VariantsQuery},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};

fn build_query(study: &str, sample: &str, params: &VariantsQuery) -> Result<SampleIndexQuery> {
    let regions = match &params.region {
        Some(text) => Region::parse_list(text)?,
        None => vec![],
    };
    let genotypes = params
        .genotype
        .as_deref()
        .map(|text| {
            text.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(SampleIndexQuery::new(study, sample)
        .with_regions(regions)
        .with_genotypes(genotypes)
        .with_mendelian(params.mendelian))
}

pub async fn get_variants(
    State(state): State<AppState>,
    Path((study, sample)): Path<(String, String)>,
    Query(params): Query<VariantsQuery>,
) -> Result<Json<SampleIndexResponse<VariantsBody>>> {
    let query = build_query(&study, &sample, &params)?;
    let limit = params
        .limit
        .unwrap_or(state.max_variants)
        .min(state.max_variants);
    let (variants, truncated) = state.reader.variants(&query, Some(limit)).await?;
    if truncated {
        tracing::debug!("{}/{}: response truncated at {} variants", study, sample, limit);
    }

    Ok(Json(SampleIndexResponse {
        sample_index: VariantsBody {
            study,
            sample,
            count: variants.len(),
            truncated,
            variants,
        },
    }))
}

pub async fn get_count(
    State(state): State<AppState>,
    Path((study, sample)): Path<(String, String)>,
    Query(params): Query<VariantsQuery>,
) -> Result<Json<SampleIndexResponse<CountBody>>> {
    let query = build_query(&study, &sample, &params)?;
    let count = state.reader.count(&query).await?;

    Ok(Json(SampleIndexResponse {
        sample_index: CountBody {
            study,
            sample,
            count,
        },
    }))
}
