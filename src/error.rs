// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Sidecar
//!
//! This module defines all error types used throughout the server.

use thiserror::Error;

/// Main error type for Sidecar operations
#[derive(Error, Debug)]
pub enum SidecarError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Relay transport errors (connection dropped, send failed)
    #[error("Relay transport error: {0}")]
    Relay(String),

    /// Malformed command frame
    #[error("Decode error: {0}")]
    Decode(String),

    /// No registered handler accepted the command
    #[error("Unhandled command: {0}")]
    UnhandledCommand(String),

    /// Shadow checkpoint errors, attributed to a task
    #[error("Checkpoint error for task {task_id}: {message}")]
    Checkpoint { task_id: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Underlying git errors from the shadow repository layer
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Context window exceeded
    #[error("Context too long: {current} tokens exceeds limit of {limit}")]
    ContextTooLong { current: u32, limit: u32 },

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Result type alias for Sidecar operations
pub type Result<T> = std::result::Result<T, SidecarError>;

impl SidecarError {
    /// Build a checkpoint error attributed to a task
    pub fn checkpoint(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        SidecarError::Checkpoint {
            task_id: task_id.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for SidecarError {
    fn from(err: toml::de::Error) -> Self {
        SidecarError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for SidecarError {
    fn from(err: toml::ser::Error) -> Self {
        SidecarError::Toml(err.to_string())
    }
}
