use super::AppState;
use crate::codec::GenotypeCodec;
use crate::types::{Organization, SampleIndexCapabilities, ServiceInfo, ServiceType};
use axum::{Json, extract::State};

pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let schema = &state.schema;
    Json(ServiceInfo {
        id: "org.example.sampleidx".to_string(),
        name: "sampleidx".to_string(),
        r#type: ServiceType {
            group: "org.example".to_string(),
            artifact: "sample-index".to_string(),
            version: "1.0.0".to_string(),
        },
        description: Some("Per-sample genotype index query server".to_string()),
        organization: Organization {
            name: "Example Organization".to_string(),
            url: "https://example.org".to_string(),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        sample_index: SampleIndexCapabilities {
            schema_version: schema.version(),
            chunk_size: schema.chunk_size(),
            genotypes: GenotypeCodec::alphabet().to_vec(),
            file_index_fields: schema
                .file_index()
                .custom_fields()
                .iter()
                .map(|f| f.key().to_string())
                .collect(),
            populations: schema.annotation().population_keys().to_vec(),
        },
    })
}
