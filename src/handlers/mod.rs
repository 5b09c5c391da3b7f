mod chunks;
mod service_info;
mod variants;

pub use chunks::get_chunks;
pub use service_info::service_info;
pub use variants::{get_count, get_variants};

use crate::query::SampleIndexReader;
use crate::schema::SampleIndexSchema;
use crate::storage::Storage;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub reader: SampleIndexReader,
    pub schema: Arc<SampleIndexSchema>,
    pub max_variants: usize,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, schema: Arc<SampleIndexSchema>, max_variants: usize) -> Self {
        Self {
            reader: SampleIndexReader::new(storage, schema.clone()),
            schema,
            max_variants,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/samples/:study/:sample/variants", get(get_variants))
        .route("/samples/:study/:sample/count", get(get_count))
        .route("/samples/:study/:sample/chunks", get(get_chunks))
        .route("/", get(service_info))
        .route("/service-info", get(service_info))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
