// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider adapter implementations

pub mod anthropic;
mod common;
pub mod openai;
pub mod router;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use router::RouterClient;
