// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Canonical completion chunk model
//!
//! Every provider adapter decodes its upstream wire format into this one
//! chunk shape. A stream terminates after the first error chunk, or after
//! a content chunk carrying a finish reason.

use serde::{Deserialize, Serialize};

use crate::llm::message::Role;

/// One unit of streamed model output, provider-independent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CompletionChunk {
    /// Incremental content for one choice
    Content {
        /// Role announced by the provider (usually only on the first chunk)
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<Role>,

        /// Delta text, if this chunk carries text
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,

        /// Tool-call fragment, if this chunk carries one
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_call: Option<ToolCallDelta>,

        /// Set on the final content chunk of a choice
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,

        /// Zero-based choice index this chunk belongs to
        idx: usize,
    },

    /// Terminal error chunk for one choice
    Error {
        /// Human-readable message, innermost provider message preferred
        message: String,

        /// HTTP-like status code; 0 when the failure never reached HTTP
        status_code: u16,

        /// Zero-based choice index the error applies to
        idx: usize,
    },
}

/// Why a choice stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of message
    Stop,
    /// Hit max tokens
    Length,
    /// Model requested a tool invocation
    ToolCalls,
    /// Content was filtered upstream
    ContentFilter,
}

/// Partial tool-call information inside a content chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    /// Position of the tool call within the choice
    pub index: usize,

    /// Tool-call id, present on the first fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tool name, present on the first fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Partial JSON for the tool arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl CompletionChunk {
    /// A plain text delta for the given choice
    pub fn text(text: impl Into<String>, idx: usize) -> Self {
        CompletionChunk::Content {
            role: None,
            text: Some(text.into()),
            tool_call: None,
            finish_reason: None,
            idx,
        }
    }

    /// A content chunk that only announces the assistant role
    pub fn role(role: Role, idx: usize) -> Self {
        CompletionChunk::Content {
            role: Some(role),
            text: None,
            tool_call: None,
            finish_reason: None,
            idx,
        }
    }

    /// The final content chunk of a choice
    pub fn finish(reason: FinishReason, idx: usize) -> Self {
        CompletionChunk::Content {
            role: None,
            text: None,
            tool_call: None,
            finish_reason: Some(reason),
            idx,
        }
    }

    /// A terminal error chunk
    pub fn error(message: impl Into<String>, status_code: u16, idx: usize) -> Self {
        CompletionChunk::Error {
            message: message.into(),
            status_code,
            idx,
        }
    }

    /// Whether this chunk terminates its stream
    pub fn is_terminal(&self) -> bool {
        match self {
            CompletionChunk::Error { .. } => true,
            CompletionChunk::Content { finish_reason, .. } => finish_reason.is_some(),
        }
    }
}

impl FinishReason {
    /// Map an OpenAI-style finish reason string
    pub fn from_wire(value: &str) -> Self {
        match value {
            "length" | "max_tokens" => FinishReason::Length,
            "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}
