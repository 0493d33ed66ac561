use std::path::PathBuf;

use crate::generator::GeneratorError;

/// Per-item pipeline failures. These fail the item, never the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Item id {0:?} cannot be used as a file name")]
    UnsafeId(String),

    #[error("Generator returned an empty image")]
    EmptyImage,

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Generator(#[from] GeneratorError),
}
