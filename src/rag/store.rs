//! Vector store abstraction shared by the persistent index and the in-memory fake.

use std::cmp::Ordering;

use thiserror::Error;

use super::models::{Chunk, Document, EmbeddingModel, IndexStats, SearchHit};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunk count ({chunks}) doesn't match embedding count ({embeddings})")]
    CountMismatch { chunks: usize, embeddings: usize },

    #[error("Chunk of {chunk_document} can't be stored under {document}")]
    ForeignChunk {
        document: String,
        chunk_document: String,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: u32, actual: u32 },

    #[error(
        "Index was built with {stored} but {configured} is configured; clear the index before switching models"
    )]
    ModelMismatch { stored: String, configured: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence for (chunk, embedding) pairs with nearest-neighbour lookup.
///
/// Chunks are grouped by document id. Writing a document replaces every chunk
/// it had before, so re-indexing never duplicates.
pub trait VectorStore: Send {
    /// Record the embedding model the stored vectors belong to.
    ///
    /// Fails with [`StoreError::ModelMismatch`] when the store already holds
    /// vectors from a different model.
    fn configure(&mut self, model: EmbeddingModel) -> Result<()>;

    /// The model recorded by [`VectorStore::configure`], if any.
    fn model(&self) -> Option<&EmbeddingModel>;

    /// Replace all chunks of `document` with `chunks` and their embeddings.
    fn upsert(&mut self, document: &Document, chunks: &[Chunk], embeddings: &[Vec<f32>])
        -> Result<()>;

    /// Top-`k` chunks by descending cosine similarity. An empty store yields
    /// an empty result.
    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    fn remove_document(&mut self, document_id: &str) -> Result<()>;

    /// Fingerprint recorded for a document at its last upsert.
    fn document_fingerprint(&self, document_id: &str) -> Result<Option<String>>;

    fn document_ids(&self) -> Result<Vec<String>>;

    /// Drop every document, chunk and embedding.
    fn clear(&mut self) -> Result<()>;

    fn stats(&self) -> Result<IndexStats>;
}

/// Check a batch before it is written under `document_id`.
pub(crate) fn validate_batch(
    document_id: &str,
    model: Option<&EmbeddingModel>,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
) -> Result<()> {
    if chunks.len() != embeddings.len() {
        return Err(StoreError::CountMismatch {
            chunks: chunks.len(),
            embeddings: embeddings.len(),
        });
    }

    // Chunks are only ever found again through their document id.
    if let Some(chunk) = chunks.iter().find(|c| c.document_id != document_id) {
        return Err(StoreError::ForeignChunk {
            document: document_id.to_string(),
            chunk_document: chunk.document_id.clone(),
        });
    }

    let expected = match model {
        Some(model) => Some(model.dimensions),
        None => embeddings.first().map(|e| e.len() as u32),
    };

    if let Some(expected) = expected {
        for emb in embeddings {
            if emb.len() as u32 != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: emb.len() as u32,
                });
            }
        }
    }

    Ok(())
}

/// Check a query vector against the configured dimensionality.
pub(crate) fn validate_query(model: Option<&EmbeddingModel>, embedding: &[f32]) -> Result<()> {
    match model {
        Some(model) if embedding.len() as u32 != model.dimensions => {
            Err(StoreError::DimensionMismatch {
                expected: model.dimensions,
                actual: embedding.len() as u32,
            })
        }
        _ => Ok(()),
    }
}

/// Whether switching from `stored` to `configured` is allowed.
pub(crate) fn check_model_switch(
    stored: Option<&EmbeddingModel>,
    configured: &EmbeddingModel,
    chunk_count: u64,
) -> Result<()> {
    match stored {
        Some(stored) if stored != configured && chunk_count > 0 => Err(StoreError::ModelMismatch {
            stored: format!("{} ({} dims)", stored.model, stored.dimensions),
            configured: format!("{} ({} dims)", configured.model, configured.dimensions),
        }),
        _ => Ok(()),
    }
}

/// Sort hits by score descending (ties by document, then chunk order) and keep `k`.
pub(crate) fn rank(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    hits.truncate(k);
    hits
}

/// Calculate cosine similarity between two vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot_product / denominator
}
