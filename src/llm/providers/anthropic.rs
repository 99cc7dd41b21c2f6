// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Anthropic streaming chat adapter
//!
//! Speaks the Anthropic messages SSE wire format: `event:`/`data:` blocks
//! separated by blank lines.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::llm::chunk::{CompletionChunk, FinishReason, ToolCallDelta};
use crate::llm::message::{ChatMessage, Role};
use crate::llm::normalize::normalize_error;
use crate::llm::provider::{validate_params, ChatClient, ChatParams, ChunkStream};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const SUPPORTED_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];

/// Anthropic provider client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Create a new client against the official endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Create with a custom base URL (Anthropic-compatible gateways)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn build_request(&self, params: &ChatParams) -> WireRequest {
        // Anthropic takes the system prompt out of band
        let system = params
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");

        WireRequest {
            model: params.model.clone(),
            messages: params
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            system: (!system.is_empty()).then_some(system),
            max_tokens: params.max_tokens,
            temperature: Some(params.temperature),
            stream: true,
        }
    }
}

#[async_trait]
impl ChatClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
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
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let chunk = CompletionChunk::error(e.to_string(), 0, 0);
                return Ok(Box::pin(futures::stream::once(async move { chunk })));
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let chunk = normalize_error(status, &body, 0);
            return Ok(Box::pin(futures::stream::once(async move { chunk })));
        }

        let mut bytes = response.bytes_stream();

        let chunks = stream! {
            let mut buffer = super::common::SseEventBuffer::new();
            let mut stopped = false;

            'read: while let Some(next) = bytes.next().await {
                let slice = match next {
                    Ok(b) => b,
                    Err(e) => {
                        yield CompletionChunk::error(e.to_string(), 0, 0);
                        return;
                    }
                };

                for event in buffer.push(&slice) {
                    for chunk in decode_event(&event.event, &event.data) {
                        match chunk {
                            DecodedEvent::Chunk(chunk) => {
                                let terminal = chunk.is_terminal();
                                yield chunk;
                                if terminal {
                                    return;
                                }
                            }
                            DecodedEvent::Stop => {
                                stopped = true;
                                break 'read;
                            }
                        }
                    }
                }
            }

            if !stopped {
                yield CompletionChunk::error("stream ended unexpectedly".to_string(), 0, 0);
            }
        };

        Ok(Box::pin(chunks))
    }
}

enum DecodedEvent {
    Chunk(CompletionChunk),
    Stop,
}

/// Decode one Anthropic SSE event into canonical chunks.
///
/// Anthropic streams a single choice; every chunk carries idx 0.
fn decode_event(event: &str, data: &str) -> Vec<DecodedEvent> {
    match event {
        "message_start" => vec![DecodedEvent::Chunk(CompletionChunk::role(
            Role::Assistant,
            0,
        ))],
        "content_block_start" => {
            let Ok(parsed) = serde_json::from_str::<Value>(data) else {
                return malformed(data);
            };
            let block = &parsed["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                let index = parsed["index"].as_u64().unwrap_or(0) as usize;
                vec![DecodedEvent::Chunk(CompletionChunk::Content {
                    role: None,
                    text: None,
                    tool_call: Some(ToolCallDelta {
                        index,
                        id: block["id"].as_str().map(str::to_string),
                        name: block["name"].as_str().map(str::to_string),
                        arguments: None,
                    }),
                    finish_reason: None,
                    idx: 0,
                })]
            } else {
                vec![]
            }
        }
        "content_block_delta" => {
            let Ok(parsed) = serde_json::from_str::<Value>(data) else {
                return malformed(data);
            };
            let index = parsed["index"].as_u64().unwrap_or(0) as usize;
            let delta = &parsed["delta"];

            match delta["type"].as_str() {
                Some("text_delta") => match delta["text"].as_str() {
                    Some(text) => vec![DecodedEvent::Chunk(CompletionChunk::text(text, 0))],
                    None => vec![],
                },
                Some("input_json_delta") => match delta["partial_json"].as_str() {
                    Some(partial) => vec![DecodedEvent::Chunk(CompletionChunk::Content {
                        role: None,
                        text: None,
                        tool_call: Some(ToolCallDelta {
                            index,
                            id: None,
                            name: None,
                            arguments: Some(partial.to_string()),
                        }),
                        finish_reason: None,
                        idx: 0,
                    })],
                    None => vec![],
                },
                _ => vec![],
            }
        }
        "message_delta" => {
            let Ok(parsed) = serde_json::from_str::<Value>(data) else {
                return malformed(data);
            };
            match parsed["delta"]["stop_reason"].as_str() {
                Some(reason) => vec![DecodedEvent::Chunk(CompletionChunk::finish(
                    FinishReason::from_wire(reason),
                    0,
                ))],
                None => vec![],
            }
        }
        "message_stop" => vec![DecodedEvent::Stop],
        "error" => vec![DecodedEvent::Chunk(normalize_error(200, data, 0))],
        // content_block_stop carries nothing the canonical model needs;
        // ping is keep-alive
        _ => vec![],
    }
}

fn malformed(data: &str) -> Vec<DecodedEvent> {
    vec![DecodedEvent::Chunk(CompletionChunk::error(
        format!("malformed stream event: {}", data),
        0,
        0,
    ))]
}

// Anthropic wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}
