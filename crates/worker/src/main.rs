use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outfit_worker::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "outfit_worker=info,outfit_pipeline=info,outfit_comfyui=info,outfit_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        catalog = %config.catalog_path.display(),
        output_dir = %config.output_dir.display(),
        workflow = %config.workflow_path.display(),
        "Loaded worker configuration",
    );

    // --- Batch ---
    let counters = outfit_worker::run(&config).await?;
    println!(
        "Done: {} items, {} generated, {} skipped, {} failed",
        counters.total, counters.generated, counters.skipped, counters.failed
    );
    Ok(())
}
