//! WebSocket message processing for a single submitted prompt.
//!
//! Reads raw frames from a ComfyUI WebSocket connection, parses them into
//! typed [`ComfyUIMessage`] variants and stops at the first frame that
//! decides the fate of the prompt being waited on.

use std::fmt;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::messages::{parse_message, ComfyUIMessage};

/// How waiting for a prompt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// `executing` with a null node for the prompt was observed.
    Completed,
    /// The server reported an execution error or interruption.
    ExecutionFailed {
        node_id: Option<String>,
        message: String,
    },
    /// The server closed the stream, or it ran out of frames.
    StreamClosed,
    /// Receiving a frame failed.
    StreamError(String),
    /// The wait bound elapsed first.
    TimedOut,
}

impl CompletionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionOutcome::Completed)
    }
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionOutcome::Completed => write!(f, "completed"),
            CompletionOutcome::ExecutionFailed { node_id: Some(node), message } => {
                write!(f, "execution failed at node {node}: {message}")
            }
            CompletionOutcome::ExecutionFailed { node_id: None, message } => {
                write!(f, "execution failed: {message}")
            }
            CompletionOutcome::StreamClosed => write!(f, "status stream closed"),
            CompletionOutcome::StreamError(e) => write!(f, "status stream error: {e}"),
            CompletionOutcome::TimedOut => write!(f, "timed out waiting for completion"),
        }
    }
}

/// Consume status frames until `prompt_id` completes or the wait ends.
///
/// With `timeout` set the whole wait is bounded; `None` waits for as long
/// as the server keeps the stream open.
pub async fn await_completion<S>(
    stream: &mut S,
    prompt_id: &str,
    timeout: Option<Duration>,
) -> CompletionOutcome
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let wait = process_messages(stream, prompt_id);
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(prompt_id, timeout_secs = limit.as_secs(), "Timed out waiting for completion");
                CompletionOutcome::TimedOut
            }
        },
        None => wait.await,
    }
}

async fn process_messages<S>(stream: &mut S, prompt_id: &str) -> CompletionOutcome
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if let Some(outcome) = handle_text_message(&text, prompt_id) {
                    return outcome;
                }
            }
            Ok(Message::Binary(_)) => {
                // Preview images.
                tracing::trace!(prompt_id, "Ignoring binary message");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                tracing::warn!(prompt_id, ?frame, "ComfyUI WebSocket closed before completion");
                return CompletionOutcome::StreamClosed;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(prompt_id, error = %e, "WebSocket receive error");
                return CompletionOutcome::StreamError(e.to_string());
            }
        }
    }

    tracing::warn!(prompt_id, "ComfyUI WebSocket ended before completion");
    CompletionOutcome::StreamClosed
}

/// Returns `Some` once a frame settles the wait.
fn handle_text_message(text: &str, prompt_id: &str) -> Option<CompletionOutcome> {
    let msg = match parse_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::trace!(error = %e, raw_message = %text, "Skipping unrecognised ComfyUI message");
            return None;
        }
    };

    if msg.is_completion_of(prompt_id) {
        tracing::debug!(prompt_id, "Execution complete");
        return Some(CompletionOutcome::Completed);
    }
    if msg.prompt_id().is_some_and(|id| id != prompt_id) {
        return None;
    }

    match msg {
        ComfyUIMessage::ExecutionError(data) => {
            tracing::error!(
                prompt_id,
                node_id = ?data.node_id,
                exception_type = %data.exception_type,
                error = %data.exception_message,
                "Execution error",
            );
            Some(CompletionOutcome::ExecutionFailed {
                node_id: data.node_id,
                message: data.exception_message,
            })
        }
        ComfyUIMessage::ExecutionInterrupted(_) => {
            tracing::warn!(prompt_id, "Execution interrupted");
            Some(CompletionOutcome::ExecutionFailed {
                node_id: None,
                message: "interrupted".to_string(),
            })
        }
        ComfyUIMessage::Progress(data) => {
            tracing::debug!(prompt_id, value = data.value, max = data.max, "Generation progress");
            None
        }
        ComfyUIMessage::Executing(data) => {
            tracing::debug!(prompt_id, node = ?data.node, "Executing node");
            None
        }
        ComfyUIMessage::ExecutionStart(_) => {
            tracing::debug!(prompt_id, "Execution started");
            None
        }
        ComfyUIMessage::ExecutionCached(_)
        | ComfyUIMessage::ExecutionSuccess(_)
        | ComfyUIMessage::Status(_) => None,
    }
}
