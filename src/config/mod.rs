// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Server configuration
//!
//! Settings are loaded from `<config_dir>/sidecar/config.toml`; a missing
//! file yields defaults. API keys can live in the file or be pulled from
//! the environment via per-provider `api_key_env` names.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SidecarError};

/// Default relay port the IDE client listens on
pub const DEFAULT_RELAY_PORT: u16 = 46571;

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Relay bridge settings
    pub relay: RelaySettings,

    /// Checkpoint storage settings
    pub storage: StorageSettings,

    /// Per-provider credentials and endpoints
    pub providers: ProvidersSettings,

    /// Defaults applied when a request leaves them unspecified
    pub defaults: DefaultsSettings,
}

/// Relay bridge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Well-known local port of the IDE client
    pub port: u16,
}

/// Checkpoint storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root directory holding all shadow repositories
    pub root: PathBuf,
}

/// Per-provider settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersSettings {
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub router: ProviderSettings,
}

/// Settings for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// API key stored directly in the config file
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    pub api_key_env: String,

    /// Custom base URL (compatible gateways, proxies)
    pub base_url: Option<String>,
}

/// Request defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsSettings {
    /// Provider used when a request names none
    pub provider: String,

    /// Model used when a request names none
    pub model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay: RelaySettings::default(),
            storage: StorageSettings::default(),
            providers: ProvidersSettings {
                openai: ProviderSettings {
                    api_key: None,
                    api_key_env: "OPENAI_API_KEY".to_string(),
                    base_url: None,
                },
                anthropic: ProviderSettings {
                    api_key: None,
                    api_key_env: "ANTHROPIC_API_KEY".to_string(),
                    base_url: None,
                },
                router: ProviderSettings {
                    api_key: None,
                    api_key_env: "OPENROUTER_API_KEY".to_string(),
                    base_url: None,
                },
            },
            defaults: DefaultsSettings::default(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_RELAY_PORT,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sidecar")
            .join("checkpoints");
        Self { root }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: String::new(),
            base_url: None,
        }
    }
}

impl Default for DefaultsSettings {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default config path; a missing file
    /// yields defaults.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SidecarError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&raw)?;
        Ok(settings)
    }

    /// Default config file location.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sidecar").join("config.toml"))
    }

    /// Resolve the API key for a provider: config file first, then the
    /// provider's environment variable.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        let p = self.provider_settings(provider)?;
        p.api_key
            .clone()
            .or_else(|| std::env::var(&p.api_key_env).ok().filter(|v| !v.is_empty()))
    }

    /// Resolve the base URL override for a provider, if any.
    pub fn base_url_for(&self, provider: &str) -> Option<String> {
        self.provider_settings(provider)?.base_url.clone()
    }

    fn provider_settings(&self, provider: &str) -> Option<&ProviderSettings> {
        match provider {
            "openai" => Some(&self.providers.openai),
            "anthropic" => Some(&self.providers.anthropic),
            "router" => Some(&self.providers.router),
            _ => None,
        }
    }
}
