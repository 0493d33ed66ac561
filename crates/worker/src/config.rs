use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use outfit_comfyui::client::ws_url_from_api_url;
use outfit_comfyui::workflow::PatchTargets;
use outfit_core::catalog::DEFAULT_CATALOG_EXPORT;
use outfit_core::translation::{DEFAULT_LOCALE, DEFAULT_NAMESPACE};

/// Worker configuration loaded from environment variables.
///
/// Relative paths are resolved against the working directory, which is
/// expected to be the storefront project root.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// ComfyUI HTTP base URL.
    pub comfyui_api_url: String,
    /// ComfyUI WebSocket base URL.
    pub comfyui_ws_url: String,
    /// JavaScript module exporting the catalog.
    pub catalog_path: PathBuf,
    pub catalog_export: String,
    pub locales_dir: PathBuf,
    pub locale: String,
    pub translation_namespace: String,
    pub output_dir: PathBuf,
    /// File extension of generated images, without the dot.
    pub image_extension: String,
    pub seed_store_path: PathBuf,
    /// Saved ComfyUI workflow, re-read for every item.
    pub workflow_path: PathBuf,
    pub targets: PatchTargets,
    /// Delay after each item that was submitted.
    pub pacing: Duration,
    /// Bound on waiting for one job; `None` waits indefinitely.
    pub completion_timeout: Option<Duration>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                         |
    /// |---------------------------|---------------------------------|
    /// | `COMFYUI_API_URL`         | `http://127.0.0.1:8188`         |
    /// | `COMFYUI_WS_URL`          | derived from `COMFYUI_API_URL`  |
    /// | `CATALOG_PATH`            | `app/data/clothes.js`           |
    /// | `CATALOG_EXPORT`          | `clothesData`                   |
    /// | `LOCALES_DIR`             | `public/locales`                |
    /// | `LOCALE`                  | `en`                            |
    /// | `TRANSLATION_NAMESPACE`   | `apparel`                       |
    /// | `OUTPUT_DIR`              | `public/images/clothes/items`   |
    /// | `IMAGE_EXTENSION`         | `webp`                          |
    /// | `SEED_STORE_PATH`         | `scripts/item_seeds.json`       |
    /// | `WORKFLOW_PATH`           | `scripts/workflow.json`         |
    /// | `POSITIVE_NODE_ID`        | `6`                             |
    /// | `NEGATIVE_NODE_ID`        | `71`                            |
    /// | `SAMPLER_NODE_ID`         | `294`                           |
    /// | `PACING_MS`               | `1000`                          |
    /// | `COMPLETION_TIMEOUT_SECS` | `600` (`0` waits indefinitely)  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let comfyui_api_url = var("COMFYUI_API_URL", "http://127.0.0.1:8188");
        let comfyui_ws_url =
            lookup("COMFYUI_WS_URL").unwrap_or_else(|| ws_url_from_api_url(&comfyui_api_url));

        let defaults = PatchTargets::default();
        let targets = PatchTargets {
            positive_node: var("POSITIVE_NODE_ID", &defaults.positive_node),
            negative_node: var("NEGATIVE_NODE_ID", &defaults.negative_node),
            sampler_node: var("SAMPLER_NODE_ID", &defaults.sampler_node),
        };

        let pacing_ms: u64 = parse(&lookup, "PACING_MS", "1000")?;
        let timeout_secs: u64 = parse(&lookup, "COMPLETION_TIMEOUT_SECS", "600")?;

        Ok(Self {
            comfyui_api_url,
            comfyui_ws_url,
            catalog_path: var("CATALOG_PATH", "app/data/clothes.js").into(),
            catalog_export: var("CATALOG_EXPORT", DEFAULT_CATALOG_EXPORT),
            locales_dir: var("LOCALES_DIR", "public/locales").into(),
            locale: var("LOCALE", DEFAULT_LOCALE),
            translation_namespace: var("TRANSLATION_NAMESPACE", DEFAULT_NAMESPACE),
            output_dir: var("OUTPUT_DIR", "public/images/clothes/items").into(),
            image_extension: var("IMAGE_EXTENSION", "webp")
                .trim_start_matches('.')
                .to_string(),
            seed_store_path: var("SEED_STORE_PATH", "scripts/item_seeds.json").into(),
            workflow_path: var("WORKFLOW_PATH", "scripts/workflow.json").into(),
            targets,
            pacing: Duration::from_millis(pacing_ms),
            completion_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        value: raw.clone(),
        reason: e.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}
