//! Batch worker that renders product images for every catalog item.

pub mod config;

use anyhow::Context;
use outfit_comfyui::api::ComfyUIApi;
use outfit_comfyui::client::ComfyUIClient;
use outfit_comfyui::orchestrator::JobOrchestrator;
use outfit_comfyui::workflow::SamplerSettings;
use outfit_core::catalog::extract_catalog;
use outfit_core::seed_store::SeedStore;
use outfit_core::translation::TranslationTable;
use outfit_pipeline::generator::ComfyUIImageGenerator;
use outfit_pipeline::run::{RunController, RunCounters, RunSettings, RunState};

use crate::config::WorkerConfig;

/// Run one full batch. Only configuration and catalog problems are errors;
/// per-item failures are reported in the returned counters.
pub async fn run(config: &WorkerConfig) -> anyhow::Result<RunCounters> {
    let catalog = extract_catalog(&config.catalog_path, &config.catalog_export)
        .context("Failed to load catalog")?;
    if catalog.rejected > 0 {
        tracing::warn!(rejected = catalog.rejected, "Some catalog entries were malformed and excluded");
    }

    let translations = TranslationTable::load(
        &config.locales_dir,
        &config.locale,
        &config.translation_namespace,
    );
    let seeds = SeedStore::load(&config.seed_store_path);

    if !config.workflow_path.exists() {
        tracing::warn!(
            path = %config.workflow_path.display(),
            "Workflow template not found, every item will fail until it exists",
        );
    }

    let client = ComfyUIClient::new(&config.comfyui_ws_url);
    tracing::info!(
        api_url = %config.comfyui_api_url,
        ws_url = %config.comfyui_ws_url,
        client_id = %client.client_id(),
        "Using ComfyUI instance",
    );
    let orchestrator = JobOrchestrator::new(
        ComfyUIApi::new(&config.comfyui_api_url),
        client,
        config.completion_timeout,
    );
    let generator = ComfyUIImageGenerator::new(
        orchestrator,
        &config.workflow_path,
        config.targets.clone(),
        SamplerSettings::default(),
    );

    let controller = RunController::new(
        generator,
        RunSettings {
            output_dir: config.output_dir.clone(),
            extension: config.image_extension.clone(),
            pacing: config.pacing,
        },
        Some(translations),
    );
    let mut state = RunState::new(seeds);
    Ok(controller.run(&catalog.entries, &mut state).await)
}
