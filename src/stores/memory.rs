//! In-process vector index for tests and local experiments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IndexEntry, IndexSpec, ScoredChunk, VectorIndex};
use crate::types::PipelineError;

#[derive(Default)]
struct MemoryState {
    spec: Option<IndexSpec>,
    entries: HashMap<String, IndexEntry>,
}

/// Vector index held entirely in memory, scored by brute-force cosine
/// similarity. Matches the [`VectorIndex`] contract of the SQLite backend,
/// including spec validation and idempotent upsert.
#[derive(Default)]
pub struct MemoryVectorIndex {
    state: RwLock<MemoryState>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure(&self, spec: &IndexSpec) -> Result<(), PipelineError> {
        let mut state = self.state.write().await;
        match &state.spec {
            None => {
                state.spec = Some(spec.clone());
                Ok(())
            }
            Some(existing) if existing == spec => Ok(()),
            Some(existing) => Err(PipelineError::Configuration(format!(
                "index '{}' already exists with dimension {}, metric {}, model '{}' \
                 (requested dimension {}, metric {}, model '{}')",
                existing.name,
                existing.dimension,
                existing.metric,
                existing.model,
                spec.dimension,
                spec.metric,
                spec.model,
            ))),
        }
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), PipelineError> {
        let mut state = self.state.write().await;
        let dimension = state
            .spec
            .as_ref()
            .ok_or_else(|| PipelineError::Index("index has not been created".to_string()))?
            .dimension;
        for entry in entries {
            if entry.vector.len() != dimension {
                return Err(PipelineError::Configuration(format!(
                    "entry '{}' has a {}-dimensional vector, index expects {}",
                    entry.id,
                    entry.vector.len(),
                    dimension
                )));
            }
        }
        for entry in entries {
            state.entries.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let state = self.state.read().await;
        let dimension = state
            .spec
            .as_ref()
            .ok_or_else(|| PipelineError::Index("index has not been created".to_string()))?
            .dimension;
        if vector.len() != dimension {
            return Err(PipelineError::Configuration(format!(
                "query vector has dimension {}, index expects {}",
                vector.len(),
                dimension
            )));
        }

        let mut hits: Vec<ScoredChunk> = state
            .entries
            .values()
            .map(|entry| ScoredChunk {
                id: entry.id.clone(),
                score: cosine_similarity(vector, &entry.vector),
                metadata: entry.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        Ok(self.state.read().await.entries.len())
    }

    async fn spec(&self) -> Result<Option<IndexSpec>, PipelineError> {
        Ok(self.state.read().await.spec.clone())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
