//! ComfyUI WebSocket status messages.
//!
//! ComfyUI sends JSON text frames shaped `{"type": "<kind>", "data": {...}}`.
//! Only the kinds that matter for following a single job are typed here;
//! anything else fails to parse and is skipped by the caller.

use serde::Deserialize;

/// Status messages relevant to a submitted job.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyUIMessage {
    /// Server status broadcast (queue depth, etc.).
    #[serde(rename = "status")]
    Status(serde_json::Value),

    /// A prompt has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(PromptRef),

    /// Some nodes were served from cache.
    #[serde(rename = "execution_cached")]
    ExecutionCached(PromptRef),

    /// A node is executing, or the prompt finished when `node` is `None`.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Step progress from a long-running node (e.g. KSampler).
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// The prompt finished successfully (newer ComfyUI builds).
    #[serde(rename = "execution_success")]
    ExecutionSuccess(PromptRef),

    /// The prompt was interrupted on the server.
    #[serde(rename = "execution_interrupted")]
    ExecutionInterrupted(PromptRef),

    /// Execution failed with an error.
    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),
}

/// Payload carrying only the prompt id.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRef {
    #[serde(default)]
    pub prompt_id: Option<String>,
}

/// Payload for `executing` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

/// Payload for `progress` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    pub value: i64,
    pub max: i64,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

/// Payload for `execution_error` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub exception_type: String,
    #[serde(default)]
    pub exception_message: String,
}

impl ComfyUIMessage {
    /// `true` for the `executing` frame with a null node for `prompt_id`,
    /// which ComfyUI sends once every node of that prompt has run.
    pub fn is_completion_of(&self, prompt_id: &str) -> bool {
        matches!(
            self,
            ComfyUIMessage::Executing(ExecutingData { node: None, prompt_id: Some(id) })
                if id == prompt_id
        )
    }

    /// Prompt id carried by the message, if any.
    pub fn prompt_id(&self) -> Option<&str> {
        match self {
            ComfyUIMessage::Status(_) => None,
            ComfyUIMessage::ExecutionStart(data)
            | ComfyUIMessage::ExecutionCached(data)
            | ComfyUIMessage::ExecutionSuccess(data)
            | ComfyUIMessage::ExecutionInterrupted(data) => data.prompt_id.as_deref(),
            ComfyUIMessage::Executing(data) => data.prompt_id.as_deref(),
            ComfyUIMessage::Progress(data) => data.prompt_id.as_deref(),
            ComfyUIMessage::ExecutionError(data) => data.prompt_id.as_deref(),
        }
    }
}

/// Parse a ComfyUI WebSocket text frame.
///
/// Returns `Err` for malformed JSON or message kinds not modelled here.
pub fn parse_message(text: &str) -> Result<ComfyUIMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn null_node_for_matching_prompt_is_completion() {
        let msg = parse_message(r#"{"type":"executing","data":{"node":null,"prompt_id":"p1"}}"#)
            .expect("parse");
        assert!(msg.is_completion_of("p1"));
        assert!(!msg.is_completion_of("p2"));
    }

    #[test]
    fn running_node_is_not_completion() {
        let msg = parse_message(r#"{"type":"executing","data":{"node":"294","prompt_id":"p1"}}"#)
            .expect("parse");
        assert!(!msg.is_completion_of("p1"));
        assert_eq!(msg.prompt_id(), Some("p1"));
    }

    #[test]
    fn executing_without_prompt_id_never_completes() {
        let msg = parse_message(r#"{"type":"executing","data":{"node":null}}"#).expect("parse");
        assert!(!msg.is_completion_of("p1"));
        assert_eq!(msg.prompt_id(), None);
    }

    #[test]
    fn status_frame_parses_with_any_payload() {
        let msg = parse_message(
            r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":2}},"sid":"abc"}}"#,
        )
        .expect("parse");
        assert_matches!(msg, ComfyUIMessage::Status(_));
    }

    #[test]
    fn execution_error_fields() {
        let msg = parse_message(
            r#"{"type":"execution_error","data":{"prompt_id":"p1","node_id":"294","exception_type":"RuntimeError","exception_message":"CUDA out of memory"}}"#,
        )
        .expect("parse");
        assert_matches!(msg, ComfyUIMessage::ExecutionError(ref data) => {
            assert_eq!(data.node_id.as_deref(), Some("294"));
            assert_eq!(data.exception_message, "CUDA out of memory");
        });
        assert_eq!(msg.prompt_id(), Some("p1"));
    }

    #[test]
    fn progress_carries_step_counts() {
        let msg = parse_message(r#"{"type":"progress","data":{"value":12,"max":40,"prompt_id":"p1","node":"294"}}"#)
            .expect("parse");
        assert_matches!(msg, ComfyUIMessage::Progress(ProgressData { value: 12, max: 40, .. }));
    }

    #[test]
    fn unmodelled_kind_is_an_error() {
        assert!(parse_message(r#"{"type":"crystools.monitor","data":{"cpu_utilization":3}}"#).is_err());
        assert!(parse_message("definitely not json").is_err());
    }
}
