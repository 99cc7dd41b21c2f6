// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM streaming gateway
//!
//! One uniform streaming chat-completion surface over heterogeneous
//! upstream providers, with all output normalized into canonical chunks.

pub mod chunk;
pub mod factory;
pub mod message;
pub mod normalize;
pub mod provider;
pub mod providers;

pub use chunk::*;
pub use factory::{ClientFactory, ClientOptions, Provider};
pub use message::*;
pub use provider::*;
