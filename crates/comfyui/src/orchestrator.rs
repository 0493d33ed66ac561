//! End-to-end execution of one job against a ComfyUI instance.
//!
//! [`JobOrchestrator::run`] connects the status stream, submits the job,
//! waits for it to finish, looks up its first image in the history record
//! and downloads it. The WebSocket is closed on every exit path. Nothing
//! is retried here; the caller decides what a failure means.

use std::time::Duration;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::{ComfyUIClient, ComfyUIClientError, ComfyUIConnection};
use crate::workflow::JobDescription;

pub use crate::history::{find_artifact_descriptor, ArtifactDescriptor};
pub use crate::processor::{await_completion, CompletionOutcome};

/// Runs compiled jobs over a shared HTTP client and client id.
pub struct JobOrchestrator {
    api: ComfyUIApi,
    client: ComfyUIClient,
    completion_timeout: Option<Duration>,
}

impl JobOrchestrator {
    pub fn new(api: ComfyUIApi, client: ComfyUIClient, completion_timeout: Option<Duration>) -> Self {
        Self {
            api,
            client,
            completion_timeout,
        }
    }

    pub fn client_id(&self) -> &str {
        self.client.client_id()
    }

    /// Execute `job` and return the bytes of its first output image.
    pub async fn run(&self, job: &JobDescription) -> Result<Vec<u8>, JobError> {
        let mut connection = self.client.connect().await?;
        let result = self.run_on(&mut connection, job).await;
        connection.close().await;
        result
    }

    async fn run_on(
        &self,
        connection: &mut ComfyUIConnection,
        job: &JobDescription,
    ) -> Result<Vec<u8>, JobError> {
        let submitted = self
            .api
            .submit_prompt(job, &connection.client_id)
            .await
            .map_err(JobError::Submit)?;
        let prompt_id = submitted.prompt_id;
        tracing::info!(prompt_id = %prompt_id, queue_number = submitted.number, "Job submitted");

        let outcome =
            await_completion(&mut connection.ws_stream, &prompt_id, self.completion_timeout).await;
        if !outcome.is_completed() {
            tracing::warn!(prompt_id = %prompt_id, outcome = %outcome, "Wait ended without completion, checking history");
        }

        // History is consulted whatever the wait outcome was.
        let history = self
            .api
            .get_history(&prompt_id)
            .await
            .map_err(JobError::History)?;
        let artifact = find_artifact_descriptor(&history, &prompt_id).ok_or_else(|| {
            JobError::NoOutput {
                prompt_id: prompt_id.clone(),
                outcome: outcome.clone(),
            }
        })?;

        tracing::debug!(
            prompt_id = %prompt_id,
            filename = %artifact.filename,
            subfolder = %artifact.subfolder,
            "Downloading output image",
        );
        let bytes = self.api.view(&artifact).await.map_err(JobError::Download)?;
        if bytes.is_empty() {
            return Err(JobError::EmptyOutput { prompt_id });
        }
        tracing::info!(prompt_id = %prompt_id, bytes = bytes.len(), "Job output retrieved");
        Ok(bytes)
    }
}

/// Errors from running a single job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Failed to open status stream: {0}")]
    Connect(#[from] ComfyUIClientError),

    #[error("Failed to submit job: {0}")]
    Submit(#[source] ComfyUIApiError),

    #[error("Failed to fetch history: {0}")]
    History(#[source] ComfyUIApiError),

    #[error("No image output for prompt {prompt_id} ({outcome})")]
    NoOutput {
        prompt_id: String,
        outcome: CompletionOutcome,
    },

    #[error("Failed to download output image: {0}")]
    Download(#[source] ComfyUIApiError),

    #[error("Output image for prompt {prompt_id} is empty")]
    EmptyOutput { prompt_id: String },
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn unreachable_status_stream_fails_before_submission() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let orchestrator = JobOrchestrator::new(
            ComfyUIApi::new(format!("http://127.0.0.1:{port}")),
            ComfyUIClient::new(format!("ws://127.0.0.1:{port}")),
            Some(Duration::from_secs(1)),
        );

        let result = orchestrator.run(&JobDescription::default()).await;
        assert_matches!(result, Err(JobError::Connect(_)));
    }

    #[test]
    fn no_output_message_includes_wait_outcome() {
        let err = JobError::NoOutput {
            prompt_id: "p1".into(),
            outcome: CompletionOutcome::StreamClosed,
        };
        assert_eq!(err.to_string(), "No image output for prompt p1 (status stream closed)");
    }
}
