//! Harvesting: turning airport web pages into retrieval-ready text chunks.
//!
//! The helpers in this module provide three capabilities:
//!
//! * [`fetch`] — HTTP download with an optional disk-backed [`DocumentCache`].
//! * [`clean`] — HTML-to-text extraction that drops script/style content.
//! * [`chunk`] — paragraph splitting, whitespace normalization, and stable
//!   chunk identifiers.
//!
//! A fetch failure is scoped to one page; the harvest binary logs it and
//! moves on to the next URL without aborting the batch.

pub mod chunk;
pub mod clean;
pub mod fetch;

pub use chunk::split_chunks;
pub use clean::extract_text;
pub use fetch::{DocumentCache, FetchedPage, fetch_page};

use url::Url;

use crate::types::{PipelineError, TextChunk};

/// Runs clean + chunk for one fetched page.
pub fn harvest_page(page: &FetchedPage, min_chunk_chars: usize) -> Vec<TextChunk> {
    let text = extract_text(&page.html);
    split_chunks(&page.url, &text, min_chunk_chars)
}

/// Fetches, cleans, and chunks every URL in order, skipping pages that fail
/// to download. Chunks are appended across pages with no cross-page dedup.
pub async fn harvest_all(
    client: &reqwest::Client,
    urls: &[Url],
    cache: Option<&DocumentCache>,
    min_chunk_chars: usize,
) -> Result<Vec<TextChunk>, PipelineError> {
    let mut chunks = Vec::new();
    for url in urls {
        match fetch_page(client, url, cache).await {
            Ok(page) => {
                let page_chunks = harvest_page(&page, min_chunk_chars);
                tracing::info!(url = %url, chunks = page_chunks.len(), "harvested page");
                chunks.extend(page_chunks);
            }
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "skipping page");
            }
        }
    }
    Ok(chunks)
}
