//! HTTP completion client for the local llama-server instance.
//!
//! Speaks the OpenAI-compatible chat endpoint: non-streaming responses
//! come back as one JSON document, streaming responses as `data: {...}`
//! lines whose deltas are concatenated in arrival order. Streaming only
//! changes what gets echoed to the terminal; callers always receive the
//! full completion text.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::client::message::ChatMessage;
use crate::errors::{DiagnosisError, Result};

/// Model name registered with the serving process
pub const DEFAULT_MODEL: &str = "plant-qwen2.5-vl";

/// Generation cut-off token for the chat template
const STOP_TOKEN: &str = "<|im_end|>";

const N_PREDICT: u32 = 4096;

/// Completions can run for many minutes on CPU-bound hosts
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1000);

const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// External completion endpoint consumed by the diagnostic pipeline
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion over the message list and return the full text.
    ///
    /// With `stream` set, tokens are echoed to stdout as they arrive; the
    /// call still returns only once the response is complete.
    async fn complete(&self, messages: &[ChatMessage], stream: bool) -> Result<String>;
}

/// llama-server chat client
#[derive(Debug, Clone)]
pub struct LlamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl LlamaClient {
    pub fn new(host: &str, port: u16, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(DiagnosisError::Http)?;

        Ok(Self {
            client,
            base_url: format!("http://{host}:{port}"),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Poll the health endpoint until the server reports ready.
    ///
    /// 200 means ready, 503 means the model is still loading; any other
    /// status or a connection failure keeps polling until the deadline.
    /// Request-builder failures are fatal immediately, the URL will never
    /// become routable.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let deadline = Instant::now() + timeout;

        loop {
            match self.client.get(&url).send().await {
                Ok(response) if response.status() == StatusCode::OK => return Ok(()),
                Ok(response) if response.status() == StatusCode::SERVICE_UNAVAILABLE => {}
                Ok(_) => {}
                Err(err) if err.is_builder() => {
                    return Err(DiagnosisError::Api(format!(
                        "health endpoint unusable: {err}"
                    )));
                }
                Err(_) => {}
            }

            if Instant::now() >= deadline {
                return Err(DiagnosisError::Timeout {
                    duration_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
            n_predict: N_PREDICT,
            stop: &[STOP_TOKEN],
            stream,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DiagnosisError::Api(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiagnosisError::Api(format!("HTTP {status}: {body}")));
        }
        Ok(response)
    }

    async fn complete_blocking(&self, messages: &[ChatMessage]) -> Result<String> {
        let response: CompletionResponse = self
            .send(messages, false)
            .await?
            .json()
            .await
            .map_err(|e| DiagnosisError::Api(format!("malformed completion response: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| DiagnosisError::Api("completion response had no choices".into()))
    }

    async fn complete_streaming(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self.send(messages, true).await?;
        let mut stream = response.bytes_stream();

        let mut pending = String::new();
        let mut result = String::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| DiagnosisError::Streaming(e.to_string()))?;
            pending.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..=newline).collect();
                if let Some(delta) = parse_stream_line(line.trim()) {
                    print!("{delta}");
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                    result.push_str(&delta);
                }
            }
        }

        if let Some(delta) = parse_stream_line(pending.trim()) {
            result.push_str(&delta);
        }

        Ok(result)
    }
}

#[async_trait]
impl CompletionBackend for LlamaClient {
    async fn complete(&self, messages: &[ChatMessage], stream: bool) -> Result<String> {
        if stream {
            self.complete_streaming(messages).await
        } else {
            self.complete_blocking(messages).await
        }
    }
}

/// Extract the delta text from one `data: {...}` stream line
fn parse_stream_line(line: &str) -> Option<String> {
    if !line.starts_with("data: {") {
        return None;
    }
    let payload = line["data:".len()..].trim();
    let chunk: StreamChunk = serde_json::from_str(payload).ok()?;
    let content = chunk.choices.into_iter().next()?.delta.content;
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    n_predict: u32,
    stop: &'a [&'a str],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: String,
}
