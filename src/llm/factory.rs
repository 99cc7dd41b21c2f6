// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Client factory for the streaming gateway
//!
//! Builds a provider-bound client for a request; callers hold only the
//! `ChatClient` trait object.

use std::str::FromStr;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{Result, SidecarError};
use crate::llm::provider::ChatClient;
use crate::llm::providers::{AnthropicClient, OpenAiClient, RouterClient};

/// The closed set of upstream providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI-compatible endpoint
    OpenAi,
    /// Anthropic messages endpoint
    Anthropic,
    /// Aggregating router fronting many providers
    Router,
}

impl FromStr for Provider {
    type Err = SidecarError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "router" | "openrouter" => Ok(Provider::Router),
            other => Err(SidecarError::InvalidInput(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

impl Provider {
    /// All supported provider names
    pub fn supported() -> &'static [&'static str] {
        &["openai", "anthropic", "router"]
    }
}

/// Per-request overrides for client construction
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Override the provider's base URL
    pub base_url: Option<String>,
    /// Override the configured API key
    pub api_key: Option<String>,
}

/// Factory for provider-bound clients
pub struct ClientFactory;

impl ClientFactory {
    /// Build a client for `provider`, taking the API key and base URL
    /// from `options` first and `settings` second.
    pub fn build(
        provider: Provider,
        options: &ClientOptions,
        settings: &Settings,
    ) -> Result<Arc<dyn ChatClient>> {
        let name = match provider {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Router => "router",
        };

        let api_key = options
            .api_key
            .clone()
            .or_else(|| settings.api_key_for(name))
            .ok_or_else(|| {
                SidecarError::Config(format!(
                    "no API key for provider '{}'; set it in the config file or environment",
                    name
                ))
            })?;

        let base_url = options
            .base_url
            .clone()
            .or_else(|| settings.base_url_for(name));

        let client: Arc<dyn ChatClient> = match (provider, base_url) {
            (Provider::OpenAi, Some(url)) => Arc::new(OpenAiClient::with_base_url(api_key, url)),
            (Provider::OpenAi, None) => Arc::new(OpenAiClient::new(api_key)),
            (Provider::Anthropic, Some(url)) => {
                Arc::new(AnthropicClient::with_base_url(api_key, url))
            }
            (Provider::Anthropic, None) => Arc::new(AnthropicClient::new(api_key)),
            (Provider::Router, Some(url)) => Arc::new(RouterClient::with_base_url(api_key, url)),
            (Provider::Router, None) => Arc::new(RouterClient::new(api_key)),
        };

        Ok(client)
    }
}
