//! Vision-language description of captured frames.
//!
//! The [`Describer`] trait is the seam the pipeline calls through;
//! [`VlmClient`] implements it against an Ollama-compatible generate
//! endpoint. A describer reads the frame once, never caches results and
//! never retries: a retry could blow the cycle's time budget, so that policy
//! belongs to the caller.

use std::time::{Duration, Instant};

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::InferenceConfig;
use crate::error::InferenceError;
use crate::frame::{VolatileFrameHandle, VolatileRoot};

/// Longest upstream error body kept in an error message.
const MAX_ERROR_DETAIL: usize = 200;

/// Result type for description operations.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// A short natural-language description of one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionResult {
    /// The description text, trimmed.
    pub text: String,
    /// Round-trip time of the inference call.
    #[serde(rename = "latency_secs", serialize_with = "crate::record::serialize_secs")]
    pub latency: Duration,
    /// Model that produced the description.
    pub model: String,
}

/// Produces text descriptions of volatile frames.
#[async_trait::async_trait]
pub trait Describer: Send + Sync {
    /// Describe the frame referenced by `handle`.
    ///
    /// # Errors
    ///
    /// - [`InferenceError::InvalidHandle`] if the handle is outside the volatile
    ///   root (checked before any network call)
    /// - [`InferenceError::FrameUnreadable`] if the frame can't be read
    /// - [`InferenceError::Timeout`] if no response arrives within `timeout`
    /// - [`InferenceError::Upstream`] on a non-success response
    /// - [`InferenceError::Transport`] on network failure
    async fn infer(
        &self,
        handle: &VolatileFrameHandle,
        prompt: &str,
        timeout: Duration,
    ) -> Result<DescriptionResult>;
}

/// Generate request body.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    images: Vec<String>,
}

/// Generate response body.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client for an Ollama-compatible vision-language model.
#[derive(Debug, Clone)]
pub struct VlmClient {
    client: reqwest::Client,
    url: String,
    model: String,
    root: VolatileRoot,
}

impl VlmClient {
    /// Create a client for the configured endpoint.
    ///
    /// Frames are only accepted from inside `root`.
    #[must_use]
    pub fn new(config: &InferenceConfig, root: VolatileRoot) -> Self {
        info!(url = %config.url, model = %config.model, "Inference client initialized");
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            model: config.model.clone(),
            root,
        }
    }

    /// Read and base64-encode the frame, refusing anything outside the root.
    async fn encode_frame(&self, handle: &VolatileFrameHandle) -> Result<String> {
        if !self.root.contains(&handle.path) {
            error!(path = %handle.path.display(), "Refusing frame outside the volatile root");
            return Err(InferenceError::InvalidHandle {
                path: handle.path.clone(),
                reason: format!("outside volatile root {}", self.root.path().display()),
            });
        }

        let frame = tokio::fs::read(&handle.path)
            .await
            .map_err(|e| InferenceError::FrameUnreadable {
                path: handle.path.clone(),
                reason: e.to_string(),
            })?;

        Ok(base64::engine::general_purpose::STANDARD.encode(&frame))
    }
}

#[async_trait::async_trait]
impl Describer for VlmClient {
    async fn infer(
        &self,
        handle: &VolatileFrameHandle,
        prompt: &str,
        timeout: Duration,
    ) -> Result<DescriptionResult> {
        let image = self.encode_frame(handle).await?;

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            images: vec![image],
        };

        info!(model = %self.model, prompt, "Inference started");
        let started = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map_or(body, |parsed| parsed.error);
            let message = truncate(&message, MAX_ERROR_DETAIL);
            error!(
                status = status.as_u16(),
                latency_ms = started.elapsed().as_millis(),
                detail = %message,
                "Inference service returned an error"
            );
            return Err(InferenceError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(timeout)
            } else {
                InferenceError::Upstream {
                    status: status.as_u16(),
                    message: format!("malformed response: {e}"),
                }
            }
        })?;

        let latency = started.elapsed();
        let text = body.response.trim().to_string();

        info!(
            latency_ms = latency.as_millis(),
            response_length = text.len(),
            "Inference succeeded"
        );

        Ok(DescriptionResult {
            text,
            latency,
            model: self.model.clone(),
        })
    }
}

/// Map a reqwest failure onto the timeout/transport split.
fn classify(err: &reqwest::Error, timeout: Duration) -> InferenceError {
    if err.is_timeout() {
        error!(timeout_ms = timeout.as_millis(), "Inference timed out");
        InferenceError::Timeout(timeout)
    } else {
        error!(error = %err, "Inference request failed");
        InferenceError::Transport(err.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}
