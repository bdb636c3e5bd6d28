//! Data models for RAG operations.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving stable chunk ids from document id + sequence index.
const CHUNK_NAMESPACE: Uuid = Uuid::from_u128(0x5f1c_2a9e_7d3b_4c88_9a61_0e2f_b7d4_1c35);

/// A regulation document read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Path relative to the data directory, `/`-separated
    pub id: String,
    /// Absolute or configured path of the source file
    pub path: PathBuf,
    /// Title from the document's core properties, if any
    pub title: Option<String>,
    /// Cleaned plain text
    pub text: String,
    /// SHA-256 of the file bytes, hex encoded
    pub fingerprint: String,
}

/// A chunk of content with its embedding-ready text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Stable identifier, derived from the document id and chunk index
    pub id: Uuid,
    /// The document this chunk belongs to
    pub document_id: String,
    /// Index of this chunk within the document (for ordering)
    pub chunk_index: u32,
    /// The text content of the chunk
    pub content: String,
    /// Start offset in the document text, in characters
    pub start_offset: usize,
    /// End offset (exclusive) in the document text, in characters
    pub end_offset: usize,
}

impl Chunk {
    pub fn new(
        document_id: &str,
        chunk_index: u32,
        content: String,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Self {
            id: chunk_id(document_id, chunk_index),
            document_id: document_id.to_string(),
            chunk_index,
            content,
            start_offset,
            end_offset,
        }
    }
}

/// Stable chunk id: re-indexing a document reproduces the same ids.
pub fn chunk_id(document_id: &str, chunk_index: u32) -> Uuid {
    Uuid::new_v5(
        &CHUNK_NAMESPACE,
        format!("{}#{}", document_id, chunk_index).as_bytes(),
    )
}

/// Embedding model identity recorded alongside the vectors it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingModel {
    /// Model identifier (e.g., "text-embedding-3-small")
    pub model: String,
    /// Dimensions of the embedding vectors
    pub dimensions: u32,
}

/// A single hit from a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    /// Document title, empty when the document has none
    pub title: String,
    pub chunk_index: u32,
    pub content: String,
    /// Cosine similarity (higher is more similar)
    pub score: f32,
}

/// Generated answer plus the context it was conditioned on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub context: Vec<SearchHit>,
    /// False when nothing relevant was retrieved and the generator was not called
    pub grounded: bool,
}

/// One question/answer exchange in the current UI session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub question: String,
    /// The answer, or the error message when the interaction failed
    pub answer: String,
    pub context: Vec<SearchHit>,
    pub failed: bool,
    pub asked_at: DateTime<Utc>,
}

/// Statistics about the vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub document_count: u64,
    pub chunk_count: u64,
    pub dimensions: u32,
    pub model: Option<String>,
}
