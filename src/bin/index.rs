//! Index stage: ensure the vector index exists with the configured spec and
//! upsert every embedded chunk in batches of 100.
//!
//! Upsert is idempotent by id, so re-running this stage after a partial
//! failure is always safe: committed batches are simply overwritten.

use concourse::config::{self, ServiceConfig};
use concourse::stores::{IndexEntry, IndexSpec, Metric, SqliteVectorIndex, VectorIndex, upsert_batches};
use concourse::telemetry::init_tracing;
use concourse::types::{self, PipelineError};

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    init_tracing();
    let config = ServiceConfig::from_env()?;
    let embedded_file = config::embedded_file_from_env();

    let embedded = match types::read_embedded(&embedded_file).await {
        Ok(embedded) => embedded,
        Err(PipelineError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::Configuration(format!(
                "{} not found; run the embed stage first",
                embedded_file.display()
            )));
        }
        Err(err) => return Err(err),
    };
    if embedded.is_empty() {
        println!("No embedded chunks found in {}; nothing to index.", embedded_file.display());
        return Ok(());
    }

    let index = SqliteVectorIndex::open(&config.index_db).await?;
    index
        .ensure(&IndexSpec {
            name: config.index_name.clone(),
            dimension: config.dimension,
            metric: Metric::Cosine,
            model: config.embed_model.clone(),
        })
        .await?;

    let entries: Vec<IndexEntry> = embedded
        .iter()
        .enumerate()
        .map(|(position, chunk)| IndexEntry::from_embedded(chunk, position))
        .collect();

    println!("Upserting {} entries into '{}'...", entries.len(), config.index_name);
    let written = upsert_batches(&index, &entries).await?;
    let total = index.count().await?;

    println!(
        "Index complete: {} entries upserted, {} stored in {}",
        written,
        total,
        config.index_db.display()
    );
    Ok(())
}
