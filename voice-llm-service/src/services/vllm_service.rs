//! Streaming client for the vLLM OpenAI-compatible serving endpoint.
//!
//! This module implements a thin client for `POST {endpoint}/v1/chat/completions`
//! with `stream=true`. Each request selects the reviewer's LoRA adapter by
//! passing the served adapter name (`"{username}-{repo_owner}"`) as the
//! `model` field; vLLM routes to the adapter over the shared base model.
//!
//! The returned stream yields text chunks in generation order. It is finite
//! and single-pass; the pipeline concatenates it into one comment string.

use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::VllmConfig;
use crate::prompt;

/// Errors produced by [`VllmService`].
#[derive(Debug, Error)]
pub enum VllmError {
    /// Invalid endpoint (empty or missing http/https).
    #[error("[Voice LLM Service] invalid vLLM endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport/HTTP client error.
    #[error("[Voice LLM Service] transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-successful HTTP status from upstream.
    #[error("[Voice LLM Service] unexpected HTTP status {status} from {url}: {snippet}")]
    HttpStatus {
        /// Numeric HTTP status code.
        status: StatusCode,
        /// Request URL.
        url: String,
        /// Optional short snippet of the response body.
        snippet: String,
    },

    /// Unexpected/invalid SSE frame or JSON payload.
    #[error("[Voice LLM Service] failed to decode response: {0}")]
    Decode(String),
}

/// Result alias for generation operations.
pub type Result<T> = std::result::Result<T, VllmError>;

/// Everything the generation side needs to produce one review comment.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Hunk text (possibly truncated) or raw code under review.
    pub code: &'a str,
    /// Repo-relative path of the file being reviewed.
    pub file_path: &'a str,
    /// Reviewer whose voice adapter should be used.
    pub reviewer: &'a str,
    /// Repository owner; part of the adapter identity.
    pub repo_owner: &'a str,
    /// Repository name (kept for adapter scoping parity with training).
    pub repo_name: &'a str,
}

impl GenerationRequest<'_> {
    /// Served adapter name, matching the identity used at fine-tune time.
    pub fn adapter_ident(&self) -> String {
        format!("{}-{}", self.reviewer, self.repo_owner)
    }
}

/// Thin streaming client for vLLM.
///
/// Reuses one HTTP client with a generous timeout (the connection stays open
/// for the whole inference).
#[derive(Debug, Clone)]
pub struct VllmService {
    client: reqwest::Client,
    cfg: VllmConfig,
    url_chat: String,
}

impl VllmService {
    /// Creates a new [`VllmService`] from the given config.
    ///
    /// # Errors
    /// - [`VllmError::InvalidEndpoint`] if `cfg.endpoint` is invalid
    /// - [`VllmError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: VllmConfig) -> Result<Self> {
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(VllmError::InvalidEndpoint(cfg.endpoint));
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(300));

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let url_chat = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));

        Ok(Self {
            client,
            cfg,
            url_chat,
        })
    }

    /// Starts a streaming generation and returns chunks of comment text.
    ///
    /// The stream ends when the server emits `data: [DONE]` or closes the
    /// connection. Mid-stream transport failures surface as one `Err` item
    /// followed by end of stream.
    ///
    /// # Errors
    /// - [`VllmError::HttpStatus`] for non-2xx responses
    /// - [`VllmError::Transport`] for client errors at request time
    #[instrument(skip_all, fields(reviewer = %req.reviewer, file = %req.file_path))]
    pub async fn stream_review_comment(
        &self,
        req: &GenerationRequest<'_>,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let body = ChatRequest {
            model: req.adapter_ident(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::system_prompt_for(req.reviewer),
                },
                ChatMessage {
                    role: "user",
                    content: prompt::user_prompt_for(req.file_path, req.code),
                },
            ],
            stream: true,
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
            top_p: self.cfg.top_p,
        };

        debug!("POST {} model={}", self.url_chat, body.model);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_chat.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = text.chars().take(240).collect::<String>();
            return Err(VllmError::HttpStatus {
                status,
                url,
                snippet,
            });
        }

        let mut bytes = resp.bytes_stream();
        let mut buf = BytesMut::new();

        let s = async_stream::stream! {
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(VllmError::Transport(e));
                        return;
                    }
                };
                buf.extend_from_slice(&chunk);
                while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line = buf.split_to(pos + 1);
                    let Ok(text) = std::str::from_utf8(&line) else {
                        continue;
                    };
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let Some(data) = text.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        return;
                    }
                    match serde_json::from_str::<ChatChunk>(data) {
                        Ok(frame) => {
                            if let Some(piece) = frame
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta.content)
                            {
                                if !piece.is_empty() {
                                    yield Ok(piece);
                                }
                            }
                        }
                        Err(e) => {
                            yield Err(VllmError::Decode(format!("bad SSE frame: {e}")));
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(s))
    }
}

/* ==========================
HTTP payloads
========================== */

/// Request body for `/v1/chat/completions` (streaming).
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// One SSE frame of a streamed chat completion (subset of fields).
#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    delta: ChatDelta,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_ident_matches_training_identity() {
        let req = GenerationRequest {
            code: "",
            file_path: "a.rs",
            reviewer: "octocat",
            repo_owner: "acme",
            repo_name: "widgets",
        };
        assert_eq!(req.adapter_ident(), "octocat-acme");
    }

    #[test]
    fn rejects_bad_endpoint() {
        let cfg = VllmConfig {
            endpoint: "localhost:8000".into(),
            base_model: "m".into(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: None,
        };
        assert!(matches!(
            VllmService::new(cfg),
            Err(VllmError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn chunk_frame_decodes_delta_content() {
        let frame: ChatChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"nit: "},"index":0}]}"#,
        )
        .unwrap();
        assert_eq!(frame.choices[0].delta.content.as_deref(), Some("nit: "));
    }
}
