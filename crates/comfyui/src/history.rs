//! Output lookup in ComfyUI job history records.
//!
//! `GET /history/{prompt_id}` returns
//! `{"<prompt_id>": {"outputs": {"<node_id>": {"images": [{filename, subfolder, type}]}}}}`.

use serde::{Deserialize, Serialize};

/// Location of an output file on the ComfyUI server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage folder kind (`output`, `temp`, ...).
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "output".to_string()
}

/// Find the first image produced by any node of `prompt_id`.
///
/// Nodes are visited in the order the history object yields them
/// (sorted by node id).
pub fn find_artifact_descriptor(
    history: &serde_json::Value,
    prompt_id: &str,
) -> Option<ArtifactDescriptor> {
    let outputs = history.get(prompt_id)?.get("outputs")?.as_object()?;

    outputs.iter().find_map(|(node_id, output)| {
        let first = output.get("images")?.as_array()?.first()?;
        match serde_json::from_value::<ArtifactDescriptor>(first.clone()) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::warn!(node_id = %node_id, error = %e, "Ignoring malformed image output");
                None
            }
        }
    })
}
