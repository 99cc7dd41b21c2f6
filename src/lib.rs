// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Sidecar - local background server for IDE-integrated agents.
//!
//! This crate exposes the runtime behind the `sidecar` binary:
//! - `relay`: correlated command/response bridge to the IDE client
//! - `llm`: provider-agnostic streaming chat-completion gateway
//! - `checkpoint`: per-task shadow repositories for workspace snapshots
//! - `handlers`: the built-in relay commands wiring the above together

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod relay;

pub use error::{Result, SidecarError};
