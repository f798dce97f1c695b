//! Harvest stage: fetch airport pages, clean and chunk them, and write the
//! chunk interchange file.
//!
//! Pages that fail to download are logged and skipped; the batch never
//! aborts on a single bad page.

use concourse::config::HarvestConfig;
use concourse::ingestion::{self, DocumentCache};
use concourse::telemetry::init_tracing;
use concourse::types::{self, PipelineError};

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    init_tracing();
    let config = HarvestConfig::from_env()?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("concourse-harvester/", env!("CARGO_PKG_VERSION")))
        .use_rustls_tls()
        .build()
        .map_err(|err| {
            PipelineError::Configuration(format!("failed to build HTTP client: {err}"))
        })?;

    let cache = match &config.cache_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            Some(DocumentCache::new(dir.clone()))
        }
        None => None,
    };

    println!("Harvesting {} page(s)...", config.urls.len());
    let chunks = ingestion::harvest_all(
        &client,
        &config.urls,
        cache.as_ref(),
        config.min_chunk_chars,
    )
    .await?;

    types::write_chunks(&config.chunks_file, &chunks).await?;

    println!(
        "Harvest complete: {} chunks written to {}",
        chunks.len(),
        config.chunks_file.display()
    );
    Ok(())
}
