//! RAG (Retrieval-Augmented Generation) building blocks: chunking, embedding,
//! vector storage and answer generation.

mod chunker;
mod embedding;
mod generator;
mod index;
mod memory;
mod models;
mod retry;
mod store;

pub use chunker::{chunk_document, chunk_text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
pub use embedding::{
    Embedder, EmbeddingError, OpenAiEmbedder, DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL,
};
pub use generator::{
    build_prompt, GeminiGenerator, GenerationError, Generator, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GENERATION_MODEL, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE,
    INSUFFICIENT_CONTEXT_REPLY,
};
pub use index::{SqliteVectorStore, INDEX_FILE_NAME};
pub use memory::MemoryVectorStore;
pub use models::{
    chunk_id, Answer, ChatTurn, Chunk, Document, EmbeddingModel, IndexStats, SearchHit,
};
pub use retry::RetryPolicy;
pub use store::{StoreError, VectorStore};

pub(crate) use store::check_model_switch;
