//! Answer generation through the Gemini `generateContent` API.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::SearchHit;
use super::retry::RetryPolicy;

pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;

/// Reply the model is told to give when the context does not cover the question.
pub const INSUFFICIENT_CONTEXT_REPLY: &str = "해당 내용을 찾을 수 없습니다";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Generation request timed out")]
    Timeout,

    #[error("Generation API rejected the credentials")]
    Auth,

    #[error("Generation API rate limit exceeded")]
    RateLimited,

    #[error("Generation API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no answer: {0}")]
    Blocked(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

impl GenerationError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited => true,
            Self::Http(e) => e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Produces an answer to a question from retrieved context.
pub trait Generator: Send + Sync {
    fn generate(&self, question: &str, context: &[SearchHit]) -> Result<String>;
}

/// Build the prompt sent to the model.
///
/// Only chunk text goes into the context; file names stay out so the model
/// cannot cite them.
pub fn build_prompt(question: &str, context: &[SearchHit]) -> String {
    let context_text = context
        .iter()
        .map(|hit| hit.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "주어진 규정 문서 내용을 바탕으로 질문에 답변해주세요.\n\
         \n\
         **질문:** {question}\n\
         \n\
         **관련 규정 내용:**\n\
         {context_text}\n\
         \n\
         **답변 지침:**\n\
         1. 위의 관련 규정 내용만을 근거로 답변하세요.\n\
         2. 근거가 되는 조항(예: \"제3조 제2항에 따르면...\")을 명확히 인용하세요.\n\
         3. 규정 내용에 답이 없다면 \"{INSUFFICIENT_CONTEXT_REPLY}\"라고 답변하세요.\n\
         4. 이해하기 쉽게 설명하세요.\n\
         5. 파일명이나 문서명은 언급하지 마세요.\n\
         6. 인사말 없이 바로 답변 내용으로 시작하세요.\n\
         \n\
         **답변:**\n"
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    candidate_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Blocking client for Gemini.
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    retry: RetryPolicy,
}

impl GeminiGenerator {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        temperature: f32,
        max_output_tokens: u32,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            max_output_tokens,
            retry,
        })
    }

    fn request(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                candidate_count: 1,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()?;

        let parsed: GenerateResponse = check_status(response)?.json()?;
        extract_answer(parsed)
    }
}

impl Generator for GeminiGenerator {
    fn generate(&self, question: &str, context: &[SearchHit]) -> Result<String> {
        let prompt = build_prompt(question, context);
        self.retry.run(
            "Generation request",
            || self.request(&prompt),
            GenerationError::is_transient,
        )
    }
}

fn extract_answer(response: GenerateResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Blocked("no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::Blocked(
            candidate
                .finish_reason
                .unwrap_or_else(|| "empty response".to_string()),
        ));
    }

    Ok(text.trim().to_string())
}

fn check_status(response: Response) -> Result<Response> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GenerationError::Auth),
        StatusCode::TOO_MANY_REQUESTS => Err(GenerationError::RateLimited),
        status if !status.is_success() => {
            let message = response.text().unwrap_or_default();
            // Gemini reports a bad key as 400 with this reason
            if message.contains("API_KEY_INVALID") {
                return Err(GenerationError::Auth);
            }
            Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            })
        }
        _ => Ok(response),
    }
}
