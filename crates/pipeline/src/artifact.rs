//! Output file naming and writing.
//!
//! The presence of `<output_dir>/<id>.<ext>` is what marks an item as
//! done, so bytes are written to a `.part` sibling first and renamed into
//! place only once complete.

use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Path of the image for `id`, rejecting ids that would escape `output_dir`.
pub fn artifact_path(output_dir: &Path, id: &str, extension: &str) -> Result<PathBuf, PipelineError> {
    if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(PipelineError::UnsafeId(id.to_string()));
    }
    let extension = extension.trim_start_matches('.');
    Ok(output_dir.join(format!("{id}.{extension}")))
}

/// Write `bytes` to `path`, creating the parent directory if needed.
pub async fn save_artifact(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    tokio::fs::write(&partial, bytes).await.map_err(io_err(&partial))?;
    if let Err(e) = tokio::fs::rename(&partial, path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(io_err(path)(e));
    }

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Saved image");
    Ok(())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError {
    let path = path.to_path_buf();
    move |source| PipelineError::Io { path, source }
}

/// Whether the finished image for an item is already on disk.
pub async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
