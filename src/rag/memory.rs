//! In-memory vector store, for tests and throwaway sessions.

use std::collections::BTreeMap;

use super::models::{Chunk, Document, EmbeddingModel, IndexStats, SearchHit};
use super::store::{
    check_model_switch, cosine_similarity, rank, validate_batch, validate_query, Result,
    VectorStore,
};

struct StoredDocument {
    title: Option<String>,
    fingerprint: String,
    entries: Vec<(Chunk, Vec<f32>)>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    model: Option<EmbeddingModel>,
    documents: BTreeMap<String, StoredDocument>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn chunk_count(&self) -> u64 {
        self.documents.values().map(|d| d.entries.len() as u64).sum()
    }
}

impl VectorStore for MemoryVectorStore {
    fn configure(&mut self, model: EmbeddingModel) -> Result<()> {
        check_model_switch(self.model.as_ref(), &model, self.chunk_count())?;
        self.model = Some(model);
        Ok(())
    }

    fn model(&self) -> Option<&EmbeddingModel> {
        self.model.as_ref()
    }

    fn upsert(
        &mut self,
        document: &Document,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        validate_batch(&document.id, self.model.as_ref(), chunks, embeddings)?;

        let entries = chunks
            .iter()
            .cloned()
            .zip(embeddings.iter().cloned())
            .collect();

        self.documents.insert(
            document.id.clone(),
            StoredDocument {
                title: document.title.clone(),
                fingerprint: document.fingerprint.clone(),
                entries,
            },
        );
        Ok(())
    }

    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        validate_query(self.model.as_ref(), embedding)?;

        let hits = self
            .documents
            .values()
            .flat_map(|doc| {
                doc.entries.iter().map(move |(chunk, stored)| SearchHit {
                    chunk_id: chunk.id.to_string(),
                    document_id: chunk.document_id.clone(),
                    title: doc.title.clone().unwrap_or_default(),
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    score: cosine_similarity(embedding, stored),
                })
            })
            .collect();

        Ok(rank(hits, k))
    }

    fn remove_document(&mut self, document_id: &str) -> Result<()> {
        self.documents.remove(document_id);
        Ok(())
    }

    fn document_fingerprint(&self, document_id: &str) -> Result<Option<String>> {
        Ok(self
            .documents
            .get(document_id)
            .map(|d| d.fingerprint.clone()))
    }

    fn document_ids(&self) -> Result<Vec<String>> {
        Ok(self.documents.keys().cloned().collect())
    }

    fn clear(&mut self) -> Result<()> {
        self.documents.clear();
        Ok(())
    }

    fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            document_count: self.documents.len() as u64,
            chunk_count: self.chunk_count(),
            dimensions: self.model.as_ref().map(|m| m.dimensions).unwrap_or(0),
            model: self.model.as_ref().map(|m| m.model.clone()),
        })
    }
}
