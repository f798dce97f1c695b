//! SQLite vector index backed by the `sqlite-vec` extension.
//!
//! One `chunks` table keyed by chunk id holds text, metadata, and the
//! embedding as a float32 blob (`vec_f32`). Similarity search runs
//! `vec_distance_cosine` over the stored blobs; similarity is reported as
//! `1 - distance` so callers always rank descending. An `index_meta` row
//! records the parameters the index was created with (name, dimension,
//! metric, embedding model) and is validated on every
//! [`ensure`](VectorIndex::ensure).

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};

use super::{ChunkMetadata, IndexEntry, IndexSpec, Metric, ScoredChunk, VectorIndex};
use crate::types::PipelineError;

/// Vector index stored in a single SQLite database file.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Connection,
}

impl SqliteVectorIndex {
    /// Opens (or creates) the database at `path` and verifies the
    /// `sqlite-vec` extension is usable.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| PipelineError::Index(err.to_string()))?;
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            Ok(())
        })
        .await
        .map_err(|err: tokio_rusqlite::Error| PipelineError::Index(err.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn ensure(&self, spec: &IndexSpec) -> Result<(), PipelineError> {
        let requested = spec.clone();
        let existing = self
            .conn
            .call(move |conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS index_meta (
                        name TEXT PRIMARY KEY,
                        dimension INTEGER NOT NULL,
                        metric TEXT NOT NULL,
                        model TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS chunks (
                        id TEXT PRIMARY KEY,
                        text TEXT NOT NULL,
                        source_url TEXT NOT NULL,
                        chunk_index INTEGER NOT NULL,
                        embedding BLOB NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_chunks_source_url
                        ON chunks(source_url);",
                )?;

                let existing = conn
                    .query_row(
                        "SELECT name, dimension, metric, model FROM index_meta LIMIT 1",
                        [],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, i64>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                            ))
                        },
                    )
                    .optional()?;

                if existing.is_none() {
                    conn.execute(
                        "INSERT INTO index_meta (name, dimension, metric, model)
                         VALUES (?1, ?2, ?3, ?4)",
                        (
                            &requested.name,
                            requested.dimension as i64,
                            requested.metric.to_string(),
                            &requested.model,
                        ),
                    )?;
                }
                Ok(existing)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::Index(err.to_string()))?;

        match existing {
            None => Ok(()),
            Some(found) => {
                let found = spec_from_row(found)?;
                if found == *spec {
                    Ok(())
                } else {
                    Err(PipelineError::Configuration(format!(
                        "index '{}' already exists with dimension {}, metric {}, model '{}' \
                         (requested '{}' with dimension {}, metric {}, model '{}')",
                        found.name,
                        found.dimension,
                        found.metric,
                        found.model,
                        spec.name,
                        spec.dimension,
                        spec.metric,
                        spec.model,
                    )))
                }
            }
        }
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), PipelineError> {
        if entries.is_empty() {
            return Ok(());
        }
        let dimension = self
            .spec()
            .await?
            .ok_or_else(|| PipelineError::Index("index has not been created".to_string()))?
            .dimension;

        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.vector.len() != dimension {
                return Err(PipelineError::Configuration(format!(
                    "entry '{}' has a {}-dimensional vector, index expects {}",
                    entry.id,
                    entry.vector.len(),
                    dimension
                )));
            }
            rows.push((
                entry.id.clone(),
                entry.metadata.text.clone(),
                entry.metadata.source_url.clone(),
                entry.metadata.chunk_index as i64,
                serde_json::to_string(&entry.vector)?,
            ));
        }

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (id, text, source_url, chunk_index, vector_json) in &rows {
                    tx.execute(
                        "INSERT OR REPLACE INTO chunks
                             (id, text, source_url, chunk_index, embedding)
                         VALUES (?1, ?2, ?3, ?4, vec_f32(?5))",
                        (id, text, source_url, chunk_index, vector_json),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::Index(err.to_string()))
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let dimension = self
            .spec()
            .await?
            .ok_or_else(|| PipelineError::Index("index has not been created".to_string()))?
            .dimension;
        if vector.len() != dimension {
            return Err(PipelineError::Configuration(format!(
                "query vector has dimension {}, index expects {}",
                vector.len(),
                dimension
            )));
        }

        let vector_json = serde_json::to_string(vector)?;
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, text, source_url, chunk_index,
                            vec_distance_cosine(embedding, vec_f32(?1)) AS distance
                     FROM chunks
                     ORDER BY distance ASC
                     LIMIT {top_k}"
                ))?;

                let rows = stmt.query_map([vector_json.as_str()], |row| {
                    let distance: f32 = row.get(4)?;
                    Ok(ScoredChunk {
                        id: row.get(0)?,
                        score: 1.0 - distance,
                        metadata: ChunkMetadata {
                            text: row.get(1)?,
                            source_url: row.get(2)?,
                            chunk_index: row.get::<_, i64>(3)? as usize,
                        },
                    })
                })?;

                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row?);
                }
                Ok(hits)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::Index(err.to_string()))
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| {
                    row.get(0)
                })?;
                Ok(count as usize)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::Index(err.to_string()))
    }

    async fn spec(&self) -> Result<Option<IndexSpec>, PipelineError> {
        let row = self
            .conn
            .call(|conn| {
                let has_meta = conn
                    .query_row(
                        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'index_meta'",
                        [],
                        |_| Ok(()),
                    )
                    .optional()?;
                if has_meta.is_none() {
                    return Ok(None);
                }
                let row = conn
                    .query_row(
                        "SELECT name, dimension, metric, model FROM index_meta LIMIT 1",
                        [],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, i64>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::Index(err.to_string()))?;

        row.map(spec_from_row).transpose()
    }
}

fn spec_from_row(row: (String, i64, String, String)) -> Result<IndexSpec, PipelineError> {
    let (name, dimension, metric, model) = row;
    Ok(IndexSpec {
        name,
        dimension: dimension as usize,
        metric: Metric::from_str(&metric).map_err(PipelineError::Configuration)?,
        model,
    })
}

fn register_sqlite_vec() -> Result<(), PipelineError> {
    static RESULT: OnceLock<Result<(), String>> = OnceLock::new();

    let result = RESULT.get_or_init(|| unsafe {
        type SqliteExtensionInit = unsafe extern "C" fn(
            *mut ffi::sqlite3,
            *mut *mut c_char,
            *const ffi::sqlite3_api_routines,
        ) -> i32;

        let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
        let init_fn: SqliteExtensionInit =
            transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
        let rc = ffi::sqlite3_auto_extension(Some(init_fn));
        if rc != ffi::SQLITE_OK {
            Err(format!("failed to register sqlite-vec extension (code {rc})"))
        } else {
            Ok(())
        }
    });

    result.clone().map_err(PipelineError::Index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn spec(dimension: usize) -> IndexSpec {
        IndexSpec {
            name: "airport-chunks".to_string(),
            dimension,
            metric: Metric::Cosine,
            model: "mock-embedder".to_string(),
        }
    }

    fn entry(id: &str, vector: Vec<f32>, text: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector,
            metadata: ChunkMetadata {
                text: text.to_string(),
                source_url: "https://www.jewelchangiairport.com/".to_string(),
                chunk_index: 0,
            },
        }
    }

    #[tokio::test]
    async fn ensure_creates_and_persists_the_spec() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.sqlite");

        let index = SqliteVectorIndex::open(&path).await.unwrap();
        assert_eq!(index.spec().await.unwrap(), None);
        index.ensure(&spec(3)).await.unwrap();
        assert_eq!(index.spec().await.unwrap(), Some(spec(3)));

        // A fresh handle over the same file sees the same spec.
        let reopened = SqliteVectorIndex::open(&path).await.unwrap();
        assert_eq!(reopened.spec().await.unwrap(), Some(spec(3)));
    }

    #[tokio::test]
    async fn ensure_rejects_mismatched_dimension() {
        let dir = tempdir().unwrap();
        let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
            .await
            .unwrap();
        index.ensure(&spec(3)).await.unwrap();

        let err = index.ensure(&spec(8)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn upsert_and_query_rank_by_similarity() {
        let dir = tempdir().unwrap();
        let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
            .await
            .unwrap();
        index.ensure(&spec(3)).await.unwrap();

        index
            .upsert(&[
                entry("aligned", vec![1.0, 0.0, 0.0], "aligned"),
                entry("close", vec![0.9, 0.1, 0.0], "close"),
                entry("orthogonal", vec![0.0, 0.0, 1.0], "orthogonal"),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "aligned");
        assert_eq!(hits[1].id, "close");
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn upsert_replaces_vector_and_metadata_by_id() {
        let dir = tempdir().unwrap();
        let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
            .await
            .unwrap();
        index.ensure(&spec(3)).await.unwrap();

        index
            .upsert(&[entry("a", vec![1.0, 0.0, 0.0], "old text")])
            .await
            .unwrap();
        index
            .upsert(&[entry("a", vec![0.0, 1.0, 0.0], "new text")])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.query(&[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].metadata.text, "new text");
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn query_with_wrong_dimension_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
            .await
            .unwrap();
        index.ensure(&spec(3)).await.unwrap();

        let err = index.query(&[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn querying_before_ensure_is_an_index_error() {
        let dir = tempdir().unwrap();
        let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
            .await
            .unwrap();
        let err = index.query(&[1.0, 0.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, PipelineError::Index(_)));
    }
}
