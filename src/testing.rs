//! Shared fixtures for unit tests.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::sync::oneshot;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::rag::{
    EmbeddingError, EmbeddingModel, Embedder, GenerationError, Generator, SearchHit,
};

pub fn hit(document_id: &str, chunk_index: u32, content: &str, score: f32) -> SearchHit {
    SearchHit {
        chunk_id: format!("{}#{}", document_id, chunk_index),
        document_id: document_id.to_string(),
        title: String::new(),
        chunk_index,
        content: content.to_string(),
        score,
    }
}

/// A request captured by [`fake_api`].
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

struct FakeApiState {
    responses: Mutex<VecDeque<(u16, String)>>,
    recorded: Mutex<Vec<RecordedRequest>>,
    served_all: Mutex<Option<oneshot::Sender<()>>>,
}

pub struct FakeApi {
    pub base_url: String,
    handle: JoinHandle<Vec<RecordedRequest>>,
}

impl FakeApi {
    /// Wait until every canned response was served and return the requests.
    pub fn finish(self) -> Vec<RecordedRequest> {
        self.handle.join().unwrap()
    }
}

async fn canned_response(
    State(state): State<Arc<FakeApiState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.recorded.lock().unwrap().push(RecordedRequest {
        request_line: format!("{} {}", method, uri),
        headers: headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let (status, body) = {
        let mut responses = state.responses.lock().unwrap();
        let next = responses
            .pop_front()
            .unwrap_or((500, r#"{"error":"no response left"}"#.to_string()));
        if responses.is_empty() {
            if let Some(tx) = state.served_all.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
        next
    };

    (
        StatusCode::from_u16(status).unwrap(),
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONNECTION, "close"),
        ],
        body,
    )
        .into_response()
}

/// Serve the given (status, JSON body) responses in order, then shut down.
pub fn fake_api(responses: Vec<(u16, String)>) -> FakeApi {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let (served_tx, served_rx) = oneshot::channel::<()>();
    let state = Arc::new(FakeApiState {
        responses: Mutex::new(responses.into()),
        recorded: Mutex::new(Vec::new()),
        served_all: Mutex::new(Some(served_tx)),
    });
    let app = Router::new()
        .fallback(canned_response)
        .with_state(state.clone());

    // The HTTP clients under test are blocking, so the server gets its own runtime.
    let handle = thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = served_rx.await;
                })
                .await
                .unwrap();
        });
        std::mem::take(&mut *state.recorded.lock().unwrap())
    });

    FakeApi {
        base_url: format!("http://{}", addr),
        handle,
    }
}

/// Bag-of-words embedder: each lowercase word is hashed into one of `dims` buckets.
pub struct KeywordEmbedder {
    pub dims: usize,
    pub name: &'static str,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            name: "keyword-test",
            calls: AtomicUsize::new(0),
        }
    }

    /// Same vectors, reported under another model id.
    pub fn named(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % self.dims as u64) as usize] += 1.0;
        }
        v
    }
}

impl Embedder for KeywordEmbedder {
    fn model(&self) -> EmbeddingModel {
        EmbeddingModel {
            model: self.name.to_string(),
            dimensions: self.dims as u32,
        }
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Embedder that fails every call with the error `make` builds.
pub struct FailingEmbedder {
    pub make: fn() -> EmbeddingError,
}

impl Embedder for FailingEmbedder {
    fn model(&self) -> EmbeddingModel {
        EmbeddingModel {
            model: "keyword-test".to_string(),
            dimensions: 64,
        }
    }

    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err((self.make)())
    }
}

/// Generator that answers by quoting the best context chunk.
pub struct QuotingGenerator {
    pub calls: AtomicUsize,
}

impl QuotingGenerator {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Generator for QuotingGenerator {
    fn generate(&self, _question: &str, context: &[SearchHit]) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let best = context
            .first()
            .map(|h| h.content.as_str())
            .unwrap_or_default();
        Ok(format!("According to the regulations: {}", best))
    }
}

/// Generator that always fails.
pub struct FailingGenerator;

impl Generator for FailingGenerator {
    fn generate(&self, _question: &str, _context: &[SearchHit]) -> Result<String, GenerationError> {
        Err(GenerationError::Api {
            status: 503,
            message: "overloaded".to_string(),
        })
    }
}

/// Write a minimal .docx with an optional title, body paragraphs and one table.
pub fn write_docx(path: &Path, title: Option<&str>, paragraphs: &[&str], table: &[Vec<&str>]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let mut body = String::new();
    for text in paragraphs {
        body.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            html_escape::encode_text(text)
        ));
    }
    if !table.is_empty() {
        body.push_str("<w:tbl>");
        for row in table {
            body.push_str("<w:tr>");
            for cell in row {
                body.push_str(&format!(
                    "<w:tc><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc>",
                    html_escape::encode_text(cell)
                ));
            }
            body.push_str("</w:tr>");
        }
        body.push_str("</w:tbl>");
    }

    zip.start_file("word/document.xml", options).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    )
    .unwrap();

    if let Some(title) = title {
        zip.start_file("docProps/core.xml", options).unwrap();
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8"?><cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{}</dc:title></cp:coreProperties>"#,
            html_escape::encode_text(title)
        )
        .unwrap();
    }

    zip.finish().unwrap();
}
