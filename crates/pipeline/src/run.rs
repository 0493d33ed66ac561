//! The per-item state machine and the batch loop around it.
//!
//! An item moves from pending to one of: skipped (no id), skipped (image
//! already on disk), generated, or failed. Only the finished image file
//! marks an item as done; seeds are persisted as soon as they are minted
//! so an interrupted run regenerates with the same parameters.

use std::path::PathBuf;
use std::time::Duration;

use outfit_core::prompt::build_prompts;
use outfit_core::seed_store::SeedStore;
use outfit_core::translation::TranslationTable;
use outfit_core::types::{CatalogEntry, ItemRecord};

use crate::artifact::{artifact_exists, artifact_path, save_artifact};
use crate::error::PipelineError;
use crate::generator::{GenerationRequest, ImageGenerator};

/// Where and how images are written, and how fast items are submitted.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub extension: String,
    /// Delay after every item that reached generation.
    pub pacing: Duration,
}

/// Aggregate results of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub total: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunCounters {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::SkippedMissingId | ItemOutcome::SkippedExisting => self.skipped += 1,
            ItemOutcome::Generated => self.generated += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Terminal state of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    SkippedMissingId,
    SkippedExisting,
    Generated,
    Failed(String),
}

impl ItemOutcome {
    /// Whether the item went past the skip checks.
    pub fn was_processed(&self) -> bool {
        matches!(self, ItemOutcome::Generated | ItemOutcome::Failed(_))
    }
}

/// Mutable state threaded through a run.
#[derive(Debug)]
pub struct RunState {
    pub seeds: SeedStore,
    pub counters: RunCounters,
}

impl RunState {
    pub fn new(seeds: SeedStore) -> Self {
        Self {
            seeds,
            counters: RunCounters::default(),
        }
    }
}

pub struct RunController<G> {
    generator: G,
    settings: RunSettings,
    translations: Option<TranslationTable>,
}

impl<G: ImageGenerator> RunController<G> {
    pub fn new(generator: G, settings: RunSettings, translations: Option<TranslationTable>) -> Self {
        Self {
            generator,
            settings,
            translations,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Process `entries` in order and return the final counters.
    pub async fn run(&self, entries: &[CatalogEntry], state: &mut RunState) -> RunCounters {
        state.counters.total += entries.len();
        tracing::info!(
            items = entries.len(),
            output_dir = %self.settings.output_dir.display(),
            known_seeds = state.seeds.len(),
            "Starting image generation run",
        );

        for (index, entry) in entries.iter().enumerate() {
            let outcome = self.process_entry(entry, state).await;
            state.counters.record(&outcome);

            if outcome.was_processed() && !self.settings.pacing.is_zero() {
                tracing::trace!(index, pacing_ms = self.settings.pacing.as_millis() as u64, "Pacing");
                tokio::time::sleep(self.settings.pacing).await;
            }
        }

        if let Err(e) = state.seeds.persist().await {
            tracing::warn!(error = %e, "Failed to save seed mapping at end of run");
        }

        let counters = state.counters;
        tracing::info!(
            total = counters.total,
            generated = counters.generated,
            skipped = counters.skipped,
            failed = counters.failed,
            "Image generation run finished",
        );
        counters
    }

    /// Drive one entry to its terminal state.
    pub async fn process_entry(&self, entry: &CatalogEntry, state: &mut RunState) -> ItemOutcome {
        let Some(item) = entry.to_record() else {
            tracing::warn!(?entry, "Skipping catalog entry without an id");
            return ItemOutcome::SkippedMissingId;
        };

        match self.generate_item(&item, state).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(item_id = %item.id, error = %e, "Image generation failed");
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    async fn generate_item(
        &self,
        item: &ItemRecord,
        state: &mut RunState,
    ) -> Result<ItemOutcome, PipelineError> {
        let path = artifact_path(&self.settings.output_dir, &item.id, &self.settings.extension)?;
        if artifact_exists(&path).await {
            tracing::info!(item_id = %item.id, path = %path.display(), "Image already exists, skipping");
            return Ok(ItemOutcome::SkippedExisting);
        }

        let (seed, is_new) = state.seeds.ensure(&item.id);
        if is_new {
            tracing::debug!(item_id = %item.id, seed, "Minted new seed");
            if let Err(e) = state.seeds.persist().await {
                tracing::warn!(item_id = %item.id, error = %e, "Failed to save seed mapping");
            }
        }

        let prompts = build_prompts(item, self.translations.as_ref());
        tracing::info!(item_id = %item.id, seed, prompt = %prompts.positive, "Generating image");

        let bytes = self
            .generator
            .generate(&GenerationRequest {
                item,
                prompts: &prompts,
                seed,
            })
            .await?;
        if bytes.is_empty() {
            return Err(PipelineError::EmptyImage);
        }

        save_artifact(&path, &bytes).await?;
        tracing::info!(item_id = %item.id, path = %path.display(), "Image saved");
        Ok(ItemOutcome::Generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_fold_outcomes() {
        let mut counters = RunCounters::default();
        for outcome in [
            ItemOutcome::SkippedMissingId,
            ItemOutcome::SkippedExisting,
            ItemOutcome::Generated,
            ItemOutcome::Failed("boom".into()),
            ItemOutcome::Generated,
        ] {
            counters.record(&outcome);
        }
        assert_eq!(
            counters,
            RunCounters {
                total: 0,
                generated: 2,
                skipped: 2,
                failed: 1,
            }
        );
    }

    #[test]
    fn only_items_past_the_skip_checks_are_processed() {
        assert!(!ItemOutcome::SkippedMissingId.was_processed());
        assert!(!ItemOutcome::SkippedExisting.was_processed());
        assert!(ItemOutcome::Generated.was_processed());
        assert!(ItemOutcome::Failed(String::new()).was_processed());
    }
}
