//! The image generation seam.

use std::path::PathBuf;

use async_trait::async_trait;
use outfit_comfyui::orchestrator::{JobError, JobOrchestrator};
use outfit_comfyui::workflow::{build_job, PatchTargets, SamplerSettings, WorkflowError, WorkflowTemplate};
use outfit_core::prompt::PromptPair;
use outfit_core::types::ItemRecord;

/// Everything needed to render one item.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub item: &'a ItemRecord,
    pub prompts: &'a PromptPair,
    pub seed: u32,
}

/// Produces encoded image bytes for a request.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<u8>, GeneratorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("{0}")]
    Other(String),
}

/// [`ImageGenerator`] backed by a ComfyUI workflow template.
///
/// The template is read from disk for every request, so edits made while a
/// batch is running are picked up by the next item.
pub struct ComfyUIImageGenerator {
    orchestrator: JobOrchestrator,
    workflow_path: PathBuf,
    targets: PatchTargets,
    sampler: SamplerSettings,
}

impl ComfyUIImageGenerator {
    pub fn new(
        orchestrator: JobOrchestrator,
        workflow_path: impl Into<PathBuf>,
        targets: PatchTargets,
        sampler: SamplerSettings,
    ) -> Self {
        Self {
            orchestrator,
            workflow_path: workflow_path.into(),
            targets,
            sampler,
        }
    }
}

#[async_trait]
impl ImageGenerator for ComfyUIImageGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<u8>, GeneratorError> {
        let template = WorkflowTemplate::load(&self.workflow_path)?;
        let job = build_job(
            &template,
            &self.targets,
            request.prompts,
            request.seed,
            &self.sampler,
        )?;

        tracing::debug!(
            item_id = %request.item.id,
            seed = request.seed,
            nodes = job.len(),
            "Submitting job",
        );
        Ok(self.orchestrator.run(&job).await?)
    }
}
