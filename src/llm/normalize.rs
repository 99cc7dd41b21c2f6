// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Upstream error normalization
//!
//! Provider error bodies vary in shape and may be doubly wrapped: an
//! aggregating router embeds the routed provider's own error as a JSON
//! string under `error.metadata.raw`. Normalization parses the outer
//! envelope, unwraps any embedded error (bounded depth, never unbounded
//! recursion), prefers the innermost message, and maps known error codes
//! to HTTP-like status codes.

use serde_json::Value;

use crate::llm::chunk::CompletionChunk;

/// Maximum number of embedded envelopes to unwrap. A router wraps exactly
/// one provider error; anything deeper is a hostile payload.
const MAX_UNWRAP_DEPTH: usize = 2;

/// Normalize an upstream error body into a terminal error chunk.
///
/// `status` is the HTTP status the body arrived with (0 if the failure
/// never reached HTTP). `idx` is the choice index the error applies to.
/// The function is pure: the same inputs always yield the same chunk.
pub fn normalize_error(status: u16, body: &str, idx: usize) -> CompletionChunk {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            body.trim().to_string()
        };
        return CompletionChunk::error(message, fallback_status(status), idx);
    };

    let mut envelope = value;
    let mut unwrapped = false;

    for _ in 0..MAX_UNWRAP_DEPTH {
        match embedded_raw_error(&envelope) {
            Some(inner) => {
                envelope = inner;
                unwrapped = true;
            }
            None => break,
        }
    }

    let detail = envelope.get("error").unwrap_or(&envelope);

    let message = detail
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    let code = detail
        .get("code")
        .or_else(|| detail.get("type"))
        .and_then(Value::as_str);

    let status_code = code
        .and_then(status_for_code)
        .or_else(|| numeric_code(detail))
        .unwrap_or_else(|| {
            if unwrapped {
                // A routed provider rejected the request itself; the
                // router's transport status says nothing about it.
                400
            } else {
                fallback_status(status)
            }
        });

    CompletionChunk::error(message, status_code, idx)
}

/// Extract the router-embedded raw provider error, if any.
///
/// The router ships it as a JSON string under `error.metadata.raw`; it is
/// only taken when it parses and carries an error message of its own.
fn embedded_raw_error(envelope: &Value) -> Option<Value> {
    let raw = envelope
        .get("error")?
        .get("metadata")?
        .get("raw")?
        .as_str()?;

    let inner: Value = serde_json::from_str(raw).ok()?;
    let has_message = inner
        .get("error")
        .unwrap_or(&inner)
        .get("message")
        .and_then(Value::as_str)
        .is_some();

    has_message.then_some(inner)
}

/// Known error codes mapped to HTTP-like statuses.
fn status_for_code(code: &str) -> Option<u16> {
    match code {
        "model_not_found" | "model_deprecated" | "not_found_error" => Some(404),
        "invalid_request_error" | "context_length_exceeded" | "string_above_max_length" => {
            Some(400)
        }
        "authentication_error" | "invalid_api_key" => Some(401),
        "permission_error" | "permission_denied" => Some(403),
        "rate_limit_error" | "rate_limit_exceeded" => Some(429),
        "overloaded_error" => Some(529),
        _ => None,
    }
}

/// Routers sometimes carry a numeric `code` mirroring the HTTP status.
fn numeric_code(detail: &Value) -> Option<u16> {
    let code = detail.get("code")?.as_u64()?;
    u16::try_from(code).ok().filter(|c| (100..=599).contains(c))
}

fn fallback_status(status: u16) -> u16 {
    if (100..=599).contains(&status) {
        status
    } else if status == 0 {
        0
    } else {
        500
    }
}
