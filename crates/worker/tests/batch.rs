//! Batch wiring tests that need no ComfyUI server.

use std::collections::HashMap;
use std::path::Path;

use outfit_pipeline::run::RunCounters;
use outfit_worker::config::WorkerConfig;

const CATALOG: &str = r#"
export const clothesData = [
  { id: 'tee-white', colorName: 'white', nameKey: 'items.basic_crew_tshirt', styleKey: 'style.basic' },
  { nameKey: 'items.orphan' },
  { id: 'jeans-blue', colorName: 'blue', nameKey: 'items.slim_jeans', styleKey: 'style.casual' },
];
"#;

fn config_in(root: &Path) -> WorkerConfig {
    let vars: HashMap<&str, String> = [
        ("CATALOG_PATH", root.join("clothes.js")),
        ("OUTPUT_DIR", root.join("items")),
        ("SEED_STORE_PATH", root.join("seeds.json")),
        ("WORKFLOW_PATH", root.join("workflow.json")),
        ("LOCALES_DIR", root.join("locales")),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.display().to_string()))
    .chain([("PACING_MS", "0".to_string())])
    .collect();
    WorkerConfig::from_lookup(|key| vars.get(key).cloned()).expect("config")
}

/// With every image present, a run touches nothing remote and writes no seeds.
#[tokio::test]
async fn completed_catalog_is_all_skipped() {
    let dir = tempfile::tempdir().expect("create temp dir");
    std::fs::write(dir.path().join("clothes.js"), CATALOG).expect("write catalog");
    std::fs::create_dir_all(dir.path().join("items")).expect("create output dir");
    for id in ["tee-white", "jeans-blue"] {
        std::fs::write(dir.path().join("items").join(format!("{id}.webp")), b"img").expect("write image");
    }

    let counters = outfit_worker::run(&config_in(dir.path())).await.expect("run");

    assert_eq!(
        counters,
        RunCounters {
            total: 3,
            generated: 0,
            skipped: 3,
            failed: 0,
        }
    );
    let seeds = std::fs::read_to_string(dir.path().join("seeds.json")).expect("seed file");
    assert_eq!(seeds.trim(), "{}");
}

/// Without a workflow template every pending item fails, but the run completes.
#[tokio::test]
async fn missing_workflow_fails_items_not_the_run() {
    let dir = tempfile::tempdir().expect("create temp dir");
    std::fs::write(dir.path().join("clothes.js"), CATALOG).expect("write catalog");

    let counters = outfit_worker::run(&config_in(dir.path())).await.expect("run");

    assert_eq!(counters.failed, 2);
    assert_eq!(counters.skipped, 1);
    assert!(!dir.path().join("items").join("tee-white.webp").exists());
}

/// A catalog that cannot be read aborts the batch.
#[tokio::test]
async fn missing_catalog_is_fatal() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let result = outfit_worker::run(&config_in(dir.path())).await;
    assert!(result.is_err());
}
