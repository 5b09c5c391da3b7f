use crate::Result;
use crate::schema::{SampleIndexConfiguration, SampleIndexSchema};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "sampleidx")]
#[command(about = "Sample index query server")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "SAMPLEIDX_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "SAMPLEIDX_PORT", default_value = "8080")]
    pub port: u16,

    /// Directory containing sample index rows
    #[arg(long, env = "SAMPLEIDX_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Enable CORS for all origins
    #[arg(long, env = "SAMPLEIDX_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// JSON sample index configuration; the default layout if absent
    #[arg(long, env = "SAMPLEIDX_SCHEMA_CONFIG")]
    pub schema_config: Option<PathBuf>,

    /// Schema version the stored rows were written with
    #[arg(long, env = "SAMPLEIDX_SCHEMA_VERSION", default_value = "1")]
    pub schema_version: u32,

    /// Maximum variants per response
    #[arg(long, env = "SAMPLEIDX_MAX_VARIANTS", default_value = "10000")]
    pub max_variants: usize,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Frozen schema from `--schema-config`, or the default layout.
    pub fn load_schema(&self) -> Result<SampleIndexSchema> {
        let configuration = match &self.schema_config {
            Some(path) => SampleIndexConfiguration::from_file(path)?,
            None => SampleIndexConfiguration::default_configuration(),
        };
        SampleIndexSchema::new(self.schema_version, &configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::parse_from(["sampleidx"])
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.max_variants, 10000);
        assert!(config.schema_config.is_none());
    }

    #[test]
    fn test_load_default_schema() {
        let mut config = config();
        config.schema_version = 3;
        let schema = config.load_schema().unwrap();
        assert_eq!(schema.version(), 3);
        assert_eq!(schema.chunk_size(), 1_000_000);
    }

    #[test]
    fn test_load_schema_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"chunkSize": 500000}"#).unwrap();
        let config = Config::parse_from([
            "sampleidx",
            "--schema-config",
            path.to_str().unwrap(),
            "--port",
            "3000",
        ]);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.load_schema().unwrap().chunk_size(), 500_000);

        std::fs::write(&path, "{not json").unwrap();
        assert!(config.load_schema().is_err());
    }
}
