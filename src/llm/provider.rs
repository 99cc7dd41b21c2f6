// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! ChatClient trait and related types
//!
//! Defines the abstraction layer the streaming gateway presents over the
//! different upstream providers.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::{Result, SidecarError};
use crate::llm::chunk::CompletionChunk;
use crate::llm::message::ChatMessage;

/// A lazy, single-pass stream of canonical chunks.
///
/// Chunks arrive as upstream bytes arrive. Upstream failures are delivered
/// in-band as a terminal error chunk, never as a stream item error.
pub type ChunkStream = Pin<Box<dyn Stream<Item = CompletionChunk> + Send>>;

/// Main trait for provider-bound streaming chat clients
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Get the provider name (e.g., "anthropic", "openai")
    fn name(&self) -> &str;

    /// Models this client accepts, used for client-side validation
    /// before a request is issued
    fn supported_models(&self) -> &'static [&'static str];

    /// Check if a specific model is supported
    fn supports_model(&self, model: &str) -> bool {
        self.supported_models().contains(&model)
    }

    /// Streaming chat completion.
    ///
    /// Returns `Err` only for requests that are rejected before anything is
    /// sent upstream (unsupported model, non-streaming mode). Everything
    /// after that point is reported through the chunk stream.
    async fn chat_completion(&self, params: ChatParams) -> Result<ChunkStream>;
}

/// Parameters for a streaming chat completion
#[derive(Debug, Clone)]
pub struct ChatParams {
    /// Model to use
    pub model: String,

    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,

    /// Requested streaming mode; must be true (non-streaming is not
    /// offered by the gateway)
    pub stream: bool,

    /// Maximum tokens in response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl ChatParams {
    /// Create new params with defaults
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            max_tokens: 8192,
            temperature: 0.7,
        }
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Shared pre-flight validation used by every adapter
pub(crate) fn validate_params(client: &dyn ChatClient, params: &ChatParams) -> Result<()> {
    if !params.stream {
        return Err(SidecarError::InvalidInput(
            "non-streaming completion is not supported".to_string(),
        ));
    }
    if !client.supports_model(&params.model) {
        return Err(SidecarError::InvalidInput(format!(
            "model '{}' is not supported by provider '{}'",
            params.model,
            client.name()
        )));
    }
    Ok(())
}
