// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shared SSE buffering for the provider adapters.
//!
//! Upstream bytes arrive in arbitrary slices; these buffers reassemble
//! them into complete SSE lines or event blocks.

/// Accumulates bytes and yields complete `data:` payload lines.
///
/// Used by the OpenAI-compatible adapters, whose streams are a flat
/// sequence of `data: {...}` lines terminated by `data: [DONE]`.
#[derive(Default)]
pub(crate) struct SseLineBuffer {
    buf: String,
}

impl SseLineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every completed data payload.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim().to_string();
            self.buf.replace_range(..=pos, "");

            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data: ") {
                payloads.push(data.to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// Accumulates bytes and yields complete `event:`/`data:` blocks.
///
/// Used by the Anthropic adapter, whose stream is a sequence of blocks
/// separated by blank lines.
#[derive(Default)]
pub(crate) struct SseEventBuffer {
    buf: String,
}

/// One parsed SSE event block
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEventBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every completed event block.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(pos) = self.buf.find("\n\n") {
            let block = self.buf[..pos].to_string();
            self.buf.replace_range(..pos + 2, "");

            if let Some(event) = parse_event_block(&block) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_event_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data = None;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            event = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("data: ") {
            data = Some(rest.to_string());
        }
    }

    Some(SseEvent {
        event: event?,
        data: data?,
    })
}
