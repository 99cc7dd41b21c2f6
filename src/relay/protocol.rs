// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Relay wire format - correlated JSON frames over a duplex socket
//!
//! Inbound frames carry `{command, id, ...fields}`; outbound frames carry
//! `{command, id, data?}` on success or `{command, id, error}` on failure.
//! The `id` is generated by the sender and matches a response to its
//! originating request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Result, SidecarError};

/// An inbound command frame, correlated by `id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayCommand {
    /// Command name, e.g. "chat/completion"
    pub command: String,

    /// Sender-generated correlation id, unique per in-flight request
    pub id: String,

    /// Remaining command fields, passed through to the handler
    #[serde(flatten)]
    pub payload: HashMap<String, Value>,
}

impl RelayCommand {
    /// Look up a payload field by name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Look up a required string payload field
    pub fn str_field(&self, name: &str) -> Result<&str> {
        self.field(name).and_then(Value::as_str).ok_or_else(|| {
            SidecarError::InvalidInput(format!(
                "command '{}' is missing string field '{}'",
                self.command, name
            ))
        })
    }
}

/// An outbound response frame, correlated by `id`
///
/// Exactly one of `data` and `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayResponse {
    /// Command name of the originating request
    pub command: String,

    /// Correlation id of the originating request
    pub id: String,

    /// Success payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Human-readable failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    /// A success response carrying `data`
    pub fn success(command: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self {
            command: command.into(),
            id: id.into(),
            data: Some(data),
            error: None,
        }
    }

    /// An error response carrying a message
    pub fn error(
        command: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            id: id.into(),
            data: None,
            error: Some(message.into()),
        }
    }

    /// True if this response carries an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Decode one inbound frame.
///
/// On a malformed frame the error carries whatever `command` and `id`
/// could still be salvaged, so the peer can receive a correlated
/// decode-error response instead of silence.
pub fn decode_frame(raw: &str) -> std::result::Result<RelayCommand, DecodeFailure> {
    match serde_json::from_str::<RelayCommand>(raw) {
        Ok(cmd) => Ok(cmd),
        Err(e) => {
            let (command, id) = salvage_envelope(raw);
            let err = SidecarError::Decode(format!("malformed command frame: {}", e));
            Err(DecodeFailure {
                command,
                id,
                message: err.to_string(),
            })
        }
    }
}

/// A frame that could not be decoded into a [`RelayCommand`]
#[derive(Debug, Clone)]
pub struct DecodeFailure {
    /// Salvaged command name, if the frame was valid enough JSON to carry one
    pub command: Option<String>,

    /// Salvaged correlation id, if present
    pub id: Option<String>,

    /// What went wrong
    pub message: String,
}

impl DecodeFailure {
    /// Build the decode-error response for this frame, when the id could
    /// be salvaged. Without an id no correlated response is possible.
    pub fn to_response(&self) -> Option<RelayResponse> {
        let id = self.id.as_deref()?;
        let command = self.command.as_deref().unwrap_or("");
        Some(RelayResponse::error(command, id, self.message.clone()))
    }
}

fn salvage_envelope(raw: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return (None, None);
    };
    let command = value
        .get("command")
        .and_then(Value::as_str)
        .map(String::from);
    let id = value.get("id").and_then(Value::as_str).map(String::from);
    (command, id)
}
