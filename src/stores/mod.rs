//! Vector index backends.
//!
//! [`VectorIndex`] abstracts the similarity-search store the pipeline writes
//! to and queries from:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorIndex trait│
//!                  │ ensure / upsert  │
//!                  │ query / count    │
//!                  └────────┬─────────┘
//!                           │
//!                ┌──────────┴──────────┐
//!                ▼                     ▼
//!        ┌──────────────┐      ┌──────────────┐
//!        │    SQLite    │      │   Memory     │
//!        │  sqlite-vec  │      │ tests/local  │
//!        └──────────────┘      └──────────────┘
//! ```
//!
//! Upsert is idempotent by id and **not** transactional across batches: a
//! failing batch aborts the remaining ones, but batches already committed
//! stay committed. Re-running the index stage after a partial failure is
//! always safe.

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{EmbeddedChunk, PipelineError};

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

/// Number of entries sent per upsert call by [`upsert_batches`].
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Similarity metric the index was created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cosine,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cosine" => Ok(Metric::Cosine),
            other => Err(format!("unknown similarity metric '{other}'")),
        }
    }
}

/// Parameters an index is created with, persisted as index metadata.
///
/// The embedding model id rides along so the query path can detect a
/// model/dimension mismatch instead of silently returning irrelevant
/// results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub model: String,
}

/// Metadata stored alongside each vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub text: String,
    pub source_url: String,
    pub chunk_index: usize,
}

/// One `(id, vector, metadata)` triple bound for the index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl IndexEntry {
    /// Builds an entry from an embedded chunk and its position in the batch.
    pub fn from_embedded(chunk: &EmbeddedChunk, chunk_index: usize) -> Self {
        Self {
            id: chunk.id.clone(),
            vector: chunk.embedding.clone(),
            metadata: ChunkMetadata {
                text: chunk.text.clone(),
                source_url: chunk.source_url.clone(),
                chunk_index,
            },
        }
    }
}

/// A retrieval hit, ranked by descending similarity.
#[derive(Clone, Debug)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Similarity-search index over embedded chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Ensures the index exists with exactly `spec`'s parameters.
    ///
    /// Creates the index when absent. Fails with
    /// [`PipelineError::Configuration`] when an index already exists with a
    /// different name, dimension, metric, or embedding model.
    async fn ensure(&self, spec: &IndexSpec) -> Result<(), PipelineError>;

    /// Inserts or fully replaces entries by id.
    ///
    /// Idempotent: re-upserting an id overwrites its vector and metadata.
    /// Not transactional across calls; see the module docs.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), PipelineError>;

    /// Returns up to `top_k` entries ranked by descending similarity.
    async fn query(&self, vector: &[f32], top_k: usize)
        -> Result<Vec<ScoredChunk>, PipelineError>;

    /// Total number of stored entries.
    async fn count(&self) -> Result<usize, PipelineError>;

    /// The spec the index was created with, or `None` before creation.
    async fn spec(&self) -> Result<Option<IndexSpec>, PipelineError>;
}

/// Upserts `entries` in fixed-size batches of [`UPSERT_BATCH_SIZE`].
///
/// A failing batch aborts the remaining batches; committed batches are left
/// in place. Returns the number of entries written.
pub async fn upsert_batches(
    index: &dyn VectorIndex,
    entries: &[IndexEntry],
) -> Result<usize, PipelineError> {
    let total_batches = entries.len().div_ceil(UPSERT_BATCH_SIZE);
    let mut written = 0usize;
    for (number, batch) in entries.chunks(UPSERT_BATCH_SIZE).enumerate() {
        index.upsert(batch).await?;
        written += batch.len();
        tracing::info!(batch = number + 1, total_batches, "upserted batch");
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts upsert calls and fails from a chosen batch onwards.
    struct FlakyIndex {
        calls: AtomicUsize,
        fail_from: usize,
    }

    #[async_trait]
    impl VectorIndex for FlakyIndex {
        async fn ensure(&self, _spec: &IndexSpec) -> Result<(), PipelineError> {
            Ok(())
        }

        async fn upsert(&self, _entries: &[IndexEntry]) -> Result<(), PipelineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.fail_from {
                return Err(PipelineError::Index("simulated upsert failure".to_string()));
            }
            Ok(())
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<ScoredChunk>, PipelineError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<usize, PipelineError> {
            Ok(0)
        }

        async fn spec(&self) -> Result<Option<IndexSpec>, PipelineError> {
            Ok(None)
        }
    }

    fn entries(n: usize) -> Vec<IndexEntry> {
        (0..n)
            .map(|i| IndexEntry {
                id: format!("https://example.com/_{i}"),
                vector: vec![0.0, 1.0],
                metadata: ChunkMetadata {
                    text: format!("chunk {i}"),
                    source_url: "https://example.com/".to_string(),
                    chunk_index: i,
                },
            })
            .collect()
    }

    #[tokio::test]
    async fn upsert_batches_splits_into_hundreds() {
        let index = FlakyIndex {
            calls: AtomicUsize::new(0),
            fail_from: usize::MAX,
        };
        let written = upsert_batches(&index, &entries(250)).await.unwrap();
        assert_eq!(written, 250);
        assert_eq!(index.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_batch_aborts_remaining_batches() {
        let index = FlakyIndex {
            calls: AtomicUsize::new(0),
            fail_from: 2,
        };
        let err = upsert_batches(&index, &entries(250)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Index(_)));
        // First batch committed, second failed, third never attempted.
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn metric_round_trips_through_strings() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!(Metric::Cosine.to_string(), "cosine");
        assert!("euclidean".parse::<Metric>().is_err());
    }
}
