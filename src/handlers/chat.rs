// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat completion command handler
//!
//! Accepts `chat/completion` frames, drives a gateway stream to the end,
//! and returns the aggregated text. Upstream failures arrive as terminal
//! error chunks and become the error response for this one command.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::error::{ApiError, Result, SidecarError};
use crate::llm::factory::{ClientFactory, ClientOptions};
use crate::llm::message::ChatMessage;
use crate::llm::provider::ChatParams;
use crate::llm::CompletionChunk;
use crate::relay::{CommandHandler, RelayCommand};

/// Handles `chat/completion` relay commands
pub struct ChatCompletionHandler {
    settings: Arc<Settings>,
}

impl ChatCompletionHandler {
    pub const COMMAND: &'static str = "chat/completion";

    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    async fn run(&self, command: &RelayCommand) -> Result<Value> {
        let provider_name = command
            .field("provider")
            .and_then(Value::as_str)
            .unwrap_or(&self.settings.defaults.provider);
        let provider = provider_name.parse()?;

        let model = command
            .field("model")
            .and_then(Value::as_str)
            .unwrap_or(&self.settings.defaults.model)
            .to_string();

        let messages: Vec<ChatMessage> = match command.field("messages") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                SidecarError::InvalidInput(format!("malformed messages field: {}", e))
            })?,
            None => {
                return Err(SidecarError::InvalidInput(
                    "chat/completion requires a messages field".to_string(),
                ))
            }
        };

        let mut params = ChatParams::new(model, messages);
        if let Some(max_tokens) = command.field("maxTokens").and_then(Value::as_u64) {
            params = params.with_max_tokens(max_tokens as u32);
        }
        if let Some(temperature) = command.field("temperature").and_then(Value::as_f64) {
            params = params.with_temperature(temperature as f32);
        }

        let client = ClientFactory::build(provider, &ClientOptions::default(), &self.settings)?;
        let mut stream = client.chat_completion(params).await?;

        let mut text = String::new();
        let mut finish_reason = None;

        while let Some(chunk) = stream.next().await {
            match chunk {
                CompletionChunk::Content {
                    text: delta,
                    finish_reason: reason,
                    ..
                } => {
                    if let Some(delta) = delta {
                        text.push_str(&delta);
                    }
                    if let Some(reason) = reason {
                        finish_reason = Some(reason);
                        break;
                    }
                }
                CompletionChunk::Error {
                    message,
                    status_code,
                    ..
                } => {
                    return Err(ApiError::ServerError {
                        status: status_code,
                        message,
                    }
                    .into());
                }
            }
        }

        Ok(json!({
            "text": text,
            "finishReason": finish_reason,
        }))
    }
}

#[async_trait::async_trait]
impl CommandHandler for ChatCompletionHandler {
    async fn handle(&self, command: &RelayCommand) -> Option<Result<Value>> {
        if command.command != Self::COMMAND {
            return None;
        }
        Some(self.run(command).await)
    }
}
