mod aggregate;
mod batch;
mod config;
mod dataset;
mod enrich;
mod error;
mod heuristics;
mod insights;
mod narrative;

use batch::Document;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let cfg = config::Config::load_or_default("receipts.toml");
    let input_dir = std::env::args().nth(1).unwrap_or_else(|| cfg.input_dir.clone());

    let documents = load_documents(&input_dir)?;
    info!(dir = %input_dir, count = documents.len(), "Loaded .stm documents");

    let (records, errors) = batch::extract_batch(&documents, &enrich::StubSource, &cfg.location);
    for err in &errors {
        warn!(error = %err, "Document dropped from batch");
    }

    if let Some(parent) = Path::new(&cfg.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut store = dataset::DatasetStore::new(&cfg.db_path)?;
    aggregate::aggregate_and_persist(&records, &mut store)?;

    let engine = insights::InsightEngine::new(cfg.insights.clone());
    let report = insights::compute_insights(&store, &engine, &cfg.report_path)?;
    info!(
        total_revenue = %report.total_revenue,
        average_order_value = %report.average_order_value,
        top_items = report.top_selling_items.len(),
        vat_anomalies = report.vat_anomalies.len(),
        "Insights computed"
    );

    // Best-effort commentary; failures here never touch the report above.
    if cfg.narrative.enabled {
        let narratives = narrative::generate_narratives(&cfg.narrative, &report).await;
        for (section, text) in &narratives {
            info!(section = %section, "{text}");
        }
    }

    let (orders, items, vat_rows) = store.counts()?;
    info!(
        orders = orders,
        items = items,
        vat_rows = vat_rows,
        dropped = errors.len(),
        "Run complete"
    );

    Ok(())
}

/// Collect raw .stm documents from a directory. Hidden files and other
/// extensions are the caller's concern per the core contract, so they are
/// filtered here, before the batch ever sees them.
fn load_documents(dir: &str) -> Result<Vec<Document>, Box<dyn std::error::Error>> {
    let mut documents = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("stm") {
            continue;
        }
        documents.push(Document::new(name, fs::read(&path)?));
    }

    // Deterministic batch order regardless of directory iteration order.
    documents.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(documents)
}
