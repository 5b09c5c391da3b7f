pub mod codec;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod query;
pub mod schema;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
