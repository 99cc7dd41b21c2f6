// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Aggregating-router streaming chat adapter
//!
//! The router speaks the OpenAI-compatible wire format but fronts many
//! model providers. Its error envelopes may be doubly wrapped: the routed
//! provider's own error arrives as a JSON string under
//! `error.metadata.raw`, which the normalizer unwraps.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::Result;
use crate::llm::message::ChatMessage;
use crate::llm::provider::{validate_params, ChatClient, ChatParams, ChunkStream};
use crate::llm::providers::openai::stream_openai_wire;

const ROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const SUPPORTED_MODELS: &[&str] = &[
    "anthropic/claude-sonnet-4",
    "anthropic/claude-3.5-sonnet",
    "anthropic/claude-3.5-haiku",
    "openai/gpt-4o",
    "openai/gpt-4o-mini",
    "google/gemini-2.0-flash-exp:free",
    "deepseek/deepseek-chat",
    "meta-llama/llama-3.3-70b-instruct",
    "qwen/qwen-2.5-coder-32b-instruct",
];

/// Aggregating-router provider client
pub struct RouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    app_name: Option<String>,
}

impl RouterClient {
    /// Create a new client against the public router endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ROUTER_API_URL.to_string(),
            app_name: Some("Sidecar".to_string()),
        }
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            app_name: Some("Sidecar".to_string()),
        }
    }

    /// Set the application name reported to the router
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
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
impl ChatClient for RouterClient {
    fn name(&self) -> &str {
        "router"
    }

    fn supported_models(&self) -> &'static [&'static str] {
        SUPPORTED_MODELS
    }

    fn supports_model(&self, model: &str) -> bool {
        // The router fronts hundreds of models in provider/model form;
        // the curated list is advisory, the format check is the gate
        self.supported_models().contains(&model) || model.contains('/')
    }

    async fn chat_completion(&self, params: ChatParams) -> Result<ChunkStream> {
        validate_params(self, &params)?;

        let body = self.build_request(&params);
        let mut request = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("Content-Type", "application/json");

        if let Some(ref name) = self.app_name {
            request = request.header("X-Title", name);
        }

        Ok(stream_openai_wire(request.json(&body)).await)
    }
}

// Router wire types (OpenAI-compatible)

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
