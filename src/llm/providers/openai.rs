// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible streaming chat adapter
//!
//! Speaks the OpenAI chat-completions SSE wire format: a flat sequence of
//! `data: {...}` lines terminated by `data: [DONE]`.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::chunk::{CompletionChunk, FinishReason, ToolCallDelta};
use crate::llm::message::{ChatMessage, Role};
use crate::llm::normalize::normalize_error;
use crate::llm::provider::{validate_params, ChatClient, ChatParams, ChunkStream};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const SUPPORTED_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4.1",
    "gpt-4.1-mini",
    "o3-mini",
];

/// OpenAI-compatible provider client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Create a new client against the official endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    /// Create with a custom base URL (OpenAI-compatible gateways)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn build_request(&self, params: &ChatParams) -> WireRequest {
        WireRequest {
            model: params.model.clone(),
            messages: params
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: Some(params.max_tokens),
            temperature: Some(params.temperature),
            stream: true,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn supported_models(&self) -> &'static [&'static str] {
        SUPPORTED_MODELS
    }

    async fn chat_completion(&self, params: ChatParams) -> Result<ChunkStream> {
        validate_params(self, &params)?;

        let body = self.build_request(&params);
        let request = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        Ok(stream_openai_wire(request).await)
    }
}

/// Drive an OpenAI-shaped SSE response into canonical chunks.
///
/// Shared with the router adapter, which speaks the same wire format.
/// The stream ends after the first terminal chunk; remaining upstream
/// bytes are not consumed.
pub(crate) async fn stream_openai_wire(request: reqwest::RequestBuilder) -> ChunkStream {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            // Never reached HTTP: status 0, nothing to normalize
            let chunk = CompletionChunk::error(e.to_string(), 0, 0);
            return Box::pin(futures::stream::once(async move { chunk }));
        }
    };

    let status = response.status().as_u16();
    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        let chunk = normalize_error(status, &body, 0);
        return Box::pin(futures::stream::once(async move { chunk }));
    }

    let mut bytes = response.bytes_stream();

    let chunks = stream! {
        // Requests are single-choice (n is never set above 1), so a
        // failure seen before a choice decodes is attributed to choice 0
        let mut buffer = super::common::SseLineBuffer::new();
        let mut done = false;

        'read: while let Some(next) = bytes.next().await {
            let slice = match next {
                Ok(b) => b,
                Err(e) => {
                    yield CompletionChunk::error(e.to_string(), 0, 0);
                    return;
                }
            };

            for payload in buffer.push(&slice) {
                if payload == "[DONE]" {
                    done = true;
                    break 'read;
                }

                let value: serde_json::Value = match serde_json::from_str(&payload) {
                    Ok(v) => v,
                    Err(_) => {
                        yield CompletionChunk::error(
                            format!("malformed stream event: {}", payload),
                            0,
                            0,
                        );
                        return;
                    }
                };

                // Some gateways deliver errors in-band as data frames
                if value.get("error").is_some() {
                    yield normalize_error(200, &payload, 0);
                    return;
                }

                let wire: WireStreamChunk = match serde_json::from_value(value) {
                    Ok(w) => w,
                    Err(e) => {
                        yield CompletionChunk::error(
                            format!("malformed stream event: {}", e),
                            0,
                            0,
                        );
                        return;
                    }
                };

                for choice in wire.choices {
                    for chunk in decode_choice(choice) {
                        let terminal = chunk.is_terminal();
                        yield chunk;
                        if terminal {
                            return;
                        }
                    }
                }
            }
        }

        if !done {
            yield CompletionChunk::error("stream ended unexpectedly".to_string(), 0, 0);
        }
    };

    Box::pin(chunks)
}

/// Decode one wire choice delta into zero or more canonical chunks.
fn decode_choice(choice: WireStreamChoice) -> Vec<CompletionChunk> {
    let idx = choice.index.unwrap_or(0);
    let mut chunks = Vec::new();

    if let Some(role) = choice.delta.role.as_deref() {
        if role == "assistant" {
            chunks.push(CompletionChunk::role(Role::Assistant, idx));
        }
    }

    if let Some(text) = choice.delta.content {
        if !text.is_empty() {
            chunks.push(CompletionChunk::text(text, idx));
        }
    }

    for tc in choice.delta.tool_calls.unwrap_or_default() {
        chunks.push(CompletionChunk::Content {
            role: None,
            text: None,
            tool_call: Some(ToolCallDelta {
                index: tc.index.unwrap_or(0),
                id: tc.id,
                name: tc.function.as_ref().and_then(|f| f.name.clone()),
                arguments: tc.function.and_then(|f| f.arguments),
            }),
            finish_reason: None,
            idx,
        });
    }

    if let Some(reason) = choice.finish_reason.as_deref() {
        chunks.push(CompletionChunk::finish(FinishReason::from_wire(reason), idx));
    }

    chunks
}

// OpenAI wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    index: Option<usize>,
    delta: WireStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WireStreamDelta {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireStreamToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<WireStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct WireStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
