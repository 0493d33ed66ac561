use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog does not export a `{export}` collection")]
    CollectionNotFound { export: String },

    #[error("Catalog collection `{export}` has no usable entries")]
    EmptyCollection { export: String },

    #[error("Invalid catalog literal: {0}")]
    Literal(#[from] json5::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
