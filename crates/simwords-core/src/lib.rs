//! Simwords core crate - shared domain types, errors, configuration, and
//! the numeric vector helpers used by clustering and ranking.

pub mod config;
pub mod error;
pub mod request;
pub mod types;
pub mod vector_ops;

pub use config::{ClusteringConfig, EmbeddingConfig, QueryConfig, SimWordsConfig};
pub use error::{ErrorKind, Result, SimWordsError};
pub use request::QueryRequest;
pub use types::*;
