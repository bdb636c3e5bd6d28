//! Index and query flows tying the loader, chunker, embedder, store and
//! generator together.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, Credentials};
use crate::docx::{load_directory, LoadError};
use crate::rag::{
    check_model_switch, chunk_document, Answer, Document, Embedder, EmbeddingError,
    GeminiGenerator, GenerationError, Generator, IndexStats, OpenAiEmbedder, SqliteVectorStore,
    StoreError, VectorStore,
};

/// Answer returned when no stored chunk is similar enough to the question.
pub const NO_MATCH_ANSWER: &str = "관련된 규정을 찾을 수 없습니다. 다른 키워드로 검색해보세요.";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Question is empty")]
    EmptyQuestion,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub data_dir: PathBuf,
    pub recursive: bool,
    pub chunk_size: usize,
    pub overlap: usize,
    /// Re-embed documents even when their fingerprint is unchanged
    pub force: bool,
}

impl From<&Config> for IndexOptions {
    fn from(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            recursive: config.recursive,
            chunk_size: config.chunk_size,
            overlap: config.overlap,
            force: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub top_k: usize,
    pub min_score: f32,
}

impl From<&Config> for QueryOptions {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.min_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DocumentStatus {
    Indexed { chunks: usize },
    Unchanged,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutcome {
    pub document_id: String,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

/// Size of the loaded document set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexTotals {
    pub documents: usize,
    pub chunks: usize,
    pub total_chars: usize,
    pub average_chunk_chars: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    pub outcomes: Vec<DocumentOutcome>,
    /// Documents dropped from the store because their files are gone
    pub removed: Vec<String>,
    pub totals: IndexTotals,
    pub finished_at: DateTime<Utc>,
}

impl IndexReport {
    fn count(&self, matches: impl Fn(&DocumentStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| matches(&o.status)).count()
    }

    pub fn indexed_count(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::Indexed { .. }))
    }

    pub fn unchanged_count(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::Unchanged))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::Failed { .. }))
    }
}

/// Fingerprint recorded in the store: the file hash plus the chunking that
/// produced the stored chunks, so new chunk settings re-index the document.
fn stored_fingerprint(document: &Document, options: &IndexOptions) -> String {
    format!(
        "{}:{}:{}",
        document.fingerprint, options.chunk_size, options.overlap
    )
}

/// Load, chunk, embed and store every document in `options.data_dir`.
///
/// Per-document failures land in the report. A missing data directory, a
/// store failure outside a single upsert, or rejected embedding credentials
/// abort the run; documents already written stay written.
pub fn index_documents(
    store: &mut dyn VectorStore,
    embedder: &dyn Embedder,
    options: &IndexOptions,
) -> Result<IndexReport> {
    let model = embedder.model();
    match store.configure(model.clone()) {
        Err(StoreError::ModelMismatch { stored, configured }) if options.force => {
            log::warn!(
                "Index was built with {}, clearing it to re-embed with {}",
                stored,
                configured
            );
            store.clear()?;
            store.configure(model)?;
        }
        other => other?,
    }

    let batch = load_directory(&options.data_dir, options.recursive)?;

    let mut outcomes = Vec::new();
    let mut totals = IndexTotals::default();
    let mut chunk_chars = 0usize;
    let mut present: BTreeSet<String> = BTreeSet::new();

    for failure in batch.failures {
        present.insert(failure.document_id.clone());
        outcomes.push(DocumentOutcome {
            document_id: failure.document_id,
            status: DocumentStatus::Failed {
                error: failure.error.to_string(),
            },
        });
    }

    for document in &batch.documents {
        present.insert(document.id.clone());

        let chunks = chunk_document(document, options.chunk_size, options.overlap);
        totals.documents += 1;
        totals.chunks += chunks.len();
        totals.total_chars += document.text.chars().count();
        chunk_chars += chunks.iter().map(|c| c.content.chars().count()).sum::<usize>();

        let fingerprint = stored_fingerprint(document, options);
        if !options.force
            && store.document_fingerprint(&document.id)?.as_deref() == Some(fingerprint.as_str())
        {
            log::debug!("Unchanged: {}", document.id);
            outcomes.push(DocumentOutcome {
                document_id: document.id.clone(),
                status: DocumentStatus::Unchanged,
            });
            continue;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let stored = Document {
            fingerprint,
            ..document.clone()
        };
        let status = match embedder.embed(&texts) {
            Ok(embeddings) => match store.upsert(&stored, &chunks, &embeddings) {
                Ok(()) => {
                    log::info!("Indexed {} ({} chunks)", document.id, chunks.len());
                    DocumentStatus::Indexed {
                        chunks: chunks.len(),
                    }
                }
                Err(e) => {
                    log::warn!("Failed to store {}: {}", document.id, e);
                    DocumentStatus::Failed {
                        error: e.to_string(),
                    }
                }
            },
            Err(EmbeddingError::Auth) => return Err(EmbeddingError::Auth.into()),
            Err(e) => {
                log::warn!("Failed to embed {}: {}", document.id, e);
                DocumentStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        outcomes.push(DocumentOutcome {
            document_id: document.id.clone(),
            status,
        });
    }

    let mut removed = Vec::new();
    for id in store.document_ids()? {
        if !present.contains(&id) {
            store.remove_document(&id)?;
            log::info!("Removed {} (file no longer present)", id);
            removed.push(id);
        }
    }

    if totals.chunks > 0 {
        totals.average_chunk_chars = chunk_chars as f64 / totals.chunks as f64;
    }
    outcomes.sort_by(|a, b| a.document_id.cmp(&b.document_id));

    let report = IndexReport {
        outcomes,
        removed,
        totals,
        finished_at: Utc::now(),
    };

    log::info!(
        "Index run finished: {} indexed, {} unchanged, {} failed, {} removed",
        report.indexed_count(),
        report.unchanged_count(),
        report.failed_count(),
        report.removed.len()
    );

    Ok(report)
}

/// Answer `question` from the stored regulations.
///
/// A populated store built with another embedding model is refused. When no
/// hit reaches `min_score` the fixed [`NO_MATCH_ANSWER`] is returned and the
/// generator is not called.
pub fn ask(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    question: &str,
    options: &QueryOptions,
) -> Result<Answer> {
    let question = question.trim();
    if question.is_empty() {
        return Err(PipelineError::EmptyQuestion);
    }

    // Vectors from different models are not comparable, even at equal dimensions.
    check_model_switch(store.model(), &embedder.model(), store.stats()?.chunk_count)?;

    let query = embedder
        .embed(&[question.to_string()])?
        .into_iter()
        .next()
        .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding for question".to_string()))?;

    let mut hits = store.query(&query, options.top_k)?;
    hits.retain(|hit| hit.score >= options.min_score);

    if hits.is_empty() {
        log::info!("No chunk reached score {}", options.min_score);
        return Ok(Answer {
            question: question.to_string(),
            text: NO_MATCH_ANSWER.to_string(),
            context: Vec::new(),
            grounded: false,
        });
    }

    log::debug!(
        "Retrieved {} chunks (best score {:.3})",
        hits.len(),
        hits[0].score
    );

    let text = generator.generate(question, &hits)?;

    Ok(Answer {
        question: question.to_string(),
        text,
        context: hits,
        grounded: true,
    })
}

/// The pipeline components plus their settings, owned together.
pub struct Assistant {
    store: Box<dyn VectorStore>,
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
    index_options: IndexOptions,
    query_options: QueryOptions,
}

impl Assistant {
    pub fn new(
        store: Box<dyn VectorStore>,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn Generator>,
        index_options: IndexOptions,
        query_options: QueryOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            index_options,
            query_options,
        }
    }

    /// Open the on-disk index and build the hosted-API clients.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        let store = SqliteVectorStore::open(&config.index_dir)?;

        let embedder = OpenAiEmbedder::new(
            credentials.openai_api_key.clone(),
            &config.embedding.base_url,
            config.embedding_model(),
            config.embedding.batch_size,
            config.request_timeout(),
            config.retry_policy(),
        )?;

        let generator = GeminiGenerator::new(
            credentials.google_api_key.clone(),
            &config.generation.base_url,
            &config.generation.model,
            config.generation.temperature,
            config.generation.max_output_tokens,
            config.request_timeout(),
            config.retry_policy(),
        )?;

        Ok(Self::new(
            Box::new(store),
            Box::new(embedder),
            Box::new(generator),
            IndexOptions::from(config),
            QueryOptions::from(config),
        ))
    }

    pub fn index(&mut self, force: bool) -> Result<IndexReport> {
        let options = IndexOptions {
            force,
            ..self.index_options.clone()
        };
        index_documents(self.store.as_mut(), self.embedder.as_ref(), &options)
    }

    pub fn ask(&self, question: &str) -> Result<Answer> {
        ask(
            self.store.as_ref(),
            self.embedder.as_ref(),
            self.generator.as_ref(),
            question,
            &self.query_options,
        )
    }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(self.store.stats()?)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()?;
        log::info!("Index cleared");
        Ok(())
    }
}
