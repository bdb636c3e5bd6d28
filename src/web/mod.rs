//! Embedded HTTP server for the question-answering page.
//!
//! Every action posts a form and is redirected back to `/`, where the outcome
//! is rendered from the session. Pipeline work is blocking, so it runs on the
//! blocking pool while holding the assistant lock; interactions are serialized.

mod page;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::pipeline::{Assistant, IndexReport, PipelineError};
use crate::rag::ChatTurn;

pub use page::{render_page, PAGE_TITLE};

/// Message shown once above the chat.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// In-memory state of the single UI session.
#[derive(Debug, Default)]
pub struct Session {
    pub history: Vec<ChatTurn>,
    pub last_report: Option<IndexReport>,
    pub notice: Option<Notice>,
}

/// Server state shared across requests.
pub struct WebState {
    pub assistant: Mutex<Assistant>,
    pub session: Mutex<Session>,
}

impl WebState {
    pub fn new(assistant: Assistant) -> Self {
        Self {
            assistant: Mutex::new(assistant),
            session: Mutex::new(Session::default()),
        }
    }
}

/// A panicked handler must not take the page down with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Deserialize)]
pub struct AskForm {
    #[serde(default)]
    pub question: String,
}

pub fn router(state: Arc<WebState>) -> Router {
    Router::new()
        .route("/", get(show_page))
        .route("/index", post(index_documents))
        .route("/ask", post(ask_question))
        .route("/reset", post(reset_session))
        .with_state(state)
}

async fn show_page(State(state): State<Arc<WebState>>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let stats = lock(&state.assistant).stats().map_err(|e| e.to_string());
        let mut session = lock(&state.session);
        let html = render_page(stats.as_ref().map_err(String::as_str), &session);
        // Notices are shown once.
        session.notice = None;
        html
    })
    .await;

    match result {
        Ok(html) => Html(html).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn index_documents(State(state): State<Arc<WebState>>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let outcome = lock(&state.assistant).index(false);
        let mut session = lock(&state.session);
        match outcome {
            Ok(report) => {
                session.notice = Some(Notice::Info(format!(
                    "문서 인덱싱이 완료되었습니다. ({}개 인덱싱, {}개 변경 없음, {}개 실패)",
                    report.indexed_count(),
                    report.unchanged_count(),
                    report.failed_count()
                )));
                session.last_report = Some(report);
            }
            Err(e) => {
                log::error!("Indexing failed: {}", e);
                session.notice = Some(Notice::Error(format!("문서 인덱싱에 실패했습니다: {}", e)));
            }
        }
    })
    .await;

    match result {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => internal_error(e),
    }
}

async fn ask_question(
    State(state): State<Arc<WebState>>,
    Form(form): Form<AskForm>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let outcome = lock(&state.assistant).ask(&form.question);
        let mut session = lock(&state.session);
        match outcome {
            Ok(answer) => session.history.push(ChatTurn {
                question: answer.question,
                answer: answer.text,
                context: answer.context,
                failed: false,
                asked_at: Utc::now(),
            }),
            Err(PipelineError::EmptyQuestion) => {
                session.notice = Some(Notice::Error("질문을 입력해주세요.".to_string()));
            }
            Err(e) => {
                log::error!("Question failed: {}", e);
                session.history.push(ChatTurn {
                    question: form.question.trim().to_string(),
                    answer: format!("답변을 생성하지 못했습니다: {}", e),
                    context: Vec::new(),
                    failed: true,
                    asked_at: Utc::now(),
                });
            }
        }
    })
    .await;

    match result {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => internal_error(e),
    }
}

async fn reset_session(State(state): State<Arc<WebState>>) -> Redirect {
    let mut session = lock(&state.session);
    session.history.clear();
    session.last_report = None;
    session.notice = Some(Notice::Info("대화 기록이 초기화되었습니다.".to_string()));
    Redirect::to("/")
}

fn internal_error(err: tokio::task::JoinError) -> Response {
    log::error!("Request handler failed: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
}

/// Web server handle for managing the server lifecycle.
pub struct WebServer {
    /// Port the server is listening on.
    pub port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WebServer {
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Start the UI server on `127.0.0.1:port` (`0` picks a free port).
pub async fn start_server(assistant: Assistant, port: u16) -> std::io::Result<WebServer> {
    let app = router(Arc::new(WebState::new(assistant)));

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let port = listener.local_addr()?.port();

    log::info!("Web UI started on http://127.0.0.1:{}", port);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                log::info!("Web UI shutting down");
            })
            .await
            .ok();
    });

    Ok(WebServer {
        port,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{IndexOptions, QueryOptions, NO_MATCH_ANSWER};
    use crate::rag::{Generator, MemoryVectorStore};
    use crate::testing::{write_docx, FailingGenerator, KeywordEmbedder, QuotingGenerator};
    use axum::body::Body;
    use axum::http::{header, Request};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(dir: &TempDir, generator: Box<dyn Generator>) -> Arc<WebState> {
        let assistant = Assistant::new(
            Box::new(MemoryVectorStore::new()),
            Box::new(KeywordEmbedder::new(256)),
            generator,
            IndexOptions {
                data_dir: dir.path().to_path_buf(),
                recursive: false,
                chunk_size: 800,
                overlap: 150,
                force: false,
            },
            QueryOptions {
                top_k: 5,
                min_score: 0.25,
            },
        );
        Arc::new(WebState::new(assistant))
    }

    async fn get_page(state: &Arc<WebState>) -> String {
        let response = router(state.clone())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn post(state: &Arc<WebState>, uri: &str, form: &str) -> Response {
        router(state.clone())
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_page_renders_empty_index() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Box::new(QuotingGenerator::new()));

        let html = get_page(&state).await;
        assert!(html.contains(PAGE_TITLE));
        assert!(html.contains("문서 0개, 청크 0개"));
    }

    #[tokio::test]
    async fn test_index_then_ask() {
        let dir = TempDir::new().unwrap();
        write_docx(
            &dir.path().join("membership.docx"),
            None,
            &["Article 1. Members must renew annually."],
            &[],
        );
        let state = state(&dir, Box::new(QuotingGenerator::new()));

        let response = post(&state, "/index", "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let html = get_page(&state).await;
        assert!(html.contains("문서 1개, 청크 1개"));
        assert!(html.contains("1개 인덱싱"));

        let response = post(&state, "/ask", "question=How+often+must+members+renew%3F").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let session = lock(&state.session);
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].question, "How often must members renew?");
        assert!(session.history[0].answer.contains("annually"));
        assert!(!session.history[0].failed);
    }

    #[tokio::test]
    async fn test_ask_on_empty_index_gives_no_match() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Box::new(QuotingGenerator::new()));

        post(&state, "/ask", "question=%ED%9A%8C%EC%9B%90").await;
        let html = get_page(&state).await;
        assert!(html.contains(NO_MATCH_ANSWER));
    }

    #[tokio::test]
    async fn test_failures_are_rendered() {
        let dir = TempDir::new().unwrap();
        write_docx(
            &dir.path().join("a.docx"),
            None,
            &["Article 1. Members must renew annually."],
            &[],
        );
        let state = state(&dir, Box::new(FailingGenerator));
        post(&state, "/index", "").await;

        post(&state, "/ask", "question=How+often+must+members+renew%3F").await;
        post(&state, "/ask", "question=+++").await;

        let html = get_page(&state).await;
        assert!(html.contains("answer failed"));
        assert!(html.contains("overloaded"));
        assert!(html.contains("질문을 입력해주세요."));
        assert_eq!(lock(&state.session).history.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_data_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Box::new(QuotingGenerator::new()));
        drop(dir);

        post(&state, "/index", "").await;
        let html = get_page(&state).await;
        assert!(html.contains("문서 인덱싱에 실패했습니다"));
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Box::new(QuotingGenerator::new()));
        post(&state, "/ask", "question=anything").await;
        assert_eq!(lock(&state.session).history.len(), 1);

        let response = post(&state, "/reset", "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(lock(&state.session).history.is_empty());
    }

    #[tokio::test]
    async fn test_server_binds_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        let assistant = Assistant::new(
            Box::new(MemoryVectorStore::new()),
            Box::new(KeywordEmbedder::new(8)),
            Box::new(QuotingGenerator::new()),
            IndexOptions {
                data_dir: dir.path().to_path_buf(),
                recursive: false,
                chunk_size: 800,
                overlap: 150,
                force: false,
            },
            QueryOptions {
                top_k: 5,
                min_score: 0.25,
            },
        );

        let server = start_server(assistant, 0).await.unwrap();
        assert_ne!(server.port, 0);
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        server.shutdown().await;
    }
}
