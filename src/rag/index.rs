//! Persistent vector index backed by SQLite.
//!
//! Embeddings are stored as little-endian f32 blobs and searched by
//! brute-force cosine similarity, which is plenty for a few thousand chunks.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Chunk, Document, EmbeddingModel, IndexStats, SearchHit};
use super::store::{
    check_model_switch, cosine_similarity, rank, validate_batch, validate_query, Result,
    VectorStore,
};

/// File name of the database inside the index directory.
pub const INDEX_FILE_NAME: &str = "index.sqlite3";

pub struct SqliteVectorStore {
    conn: Connection,
    model: Option<EmbeddingModel>,
    db_path: PathBuf,
}

impl SqliteVectorStore {
    /// Open (or create) the index inside `index_dir`.
    pub fn open(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        let db_path = index_dir.join(INDEX_FILE_NAME);

        let conn = Connection::open(&db_path)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                title TEXT,
                fingerprint TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                indexed_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                chunk_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);
            "#,
        )?;

        let model = conn
            .query_row(
                "SELECT value FROM config WHERE key = 'embedding_model'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|s| serde_json::from_str::<EmbeddingModel>(&s))
            .transpose()?;

        log::debug!("Opened vector index at {:?}", db_path);

        Ok(Self {
            conn,
            model,
            db_path,
        })
    }

    /// Get the database path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn chunk_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl VectorStore for SqliteVectorStore {
    fn configure(&mut self, model: EmbeddingModel) -> Result<()> {
        check_model_switch(self.model.as_ref(), &model, self.chunk_count()?)?;

        let model_json = serde_json::to_string(&model)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES ('embedding_model', ?1)",
            params![model_json],
        )?;

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

        let tx = self.conn.transaction()?;

        // Remove existing chunks and embeddings for this document
        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?1)",
            params![document.id],
        )?;
        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document.id],
        )?;

        tx.execute(
            "INSERT OR REPLACE INTO documents (id, path, title, fingerprint, chunk_count, indexed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)",
            params![
                document.id,
                document.path.to_string_lossy().into_owned(),
                document.title,
                document.fingerprint,
                chunks.len() as i64,
            ],
        )?;

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            tx.execute(
                "INSERT INTO chunks (id, document_id, chunk_index, content, start_offset, end_offset) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    chunk.id.to_string(),
                    chunk.document_id,
                    chunk.chunk_index,
                    chunk.content,
                    chunk.start_offset as i64,
                    chunk.end_offset as i64,
                ],
            )?;

            tx.execute(
                "INSERT INTO embeddings (chunk_id, embedding, dimensions) VALUES (?1, ?2, ?3)",
                params![
                    chunk.id.to_string(),
                    serialize_embedding(embedding),
                    embedding.len() as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        validate_query(self.model.as_ref(), embedding)?;

        if k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.content, e.embedding, d.title
            FROM chunks c
            JOIN embeddings e ON c.id = e.chunk_id
            LEFT JOIN documents d ON c.document_id = d.id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let hits = rows
            .into_iter()
            .map(
                |(chunk_id, document_id, chunk_index, content, embedding_bytes, title)| {
                    let stored = deserialize_embedding(&embedding_bytes);
                    SearchHit {
                        chunk_id,
                        document_id,
                        title: title.unwrap_or_default(),
                        chunk_index,
                        content,
                        score: cosine_similarity(embedding, &stored),
                    }
                },
            )
            .collect();

        Ok(rank(hits, k))
    }

    fn remove_document(&mut self, document_id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?1)",
            params![document_id],
        )?;
        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id],
        )?;
        tx.execute("DELETE FROM documents WHERE id = ?1", params![document_id])?;

        tx.commit()?;
        Ok(())
    }

    fn document_fingerprint(&self, document_id: &str) -> Result<Option<String>> {
        let fingerprint = self
            .conn
            .query_row(
                "SELECT fingerprint FROM documents WHERE id = ?1",
                params![document_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(fingerprint)
    }

    fn document_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM documents ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM embeddings", [])?;
        tx.execute("DELETE FROM chunks", [])?;
        tx.execute("DELETE FROM documents", [])?;

        tx.commit()?;
        log::info!("Cleared vector index at {:?}", self.db_path);
        Ok(())
    }

    fn stats(&self) -> Result<IndexStats> {
        let document_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        Ok(IndexStats {
            document_count: document_count as u64,
            chunk_count: self.chunk_count()?,
            dimensions: self.model.as_ref().map(|m| m.dimensions).unwrap_or(0),
            model: self.model.as_ref().map(|m| m.model.clone()),
        })
    }
}

/// Serialize embedding to a binary blob (f32 little-endian).
fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from binary blob.
fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
