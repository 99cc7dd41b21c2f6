// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in relay command handlers

pub mod chat;
pub mod checkpoint;

use std::sync::Arc;

pub use chat::ChatCompletionHandler;
pub use checkpoint::{CheckpointCreateHandler, CheckpointRestoreHandler};

use crate::checkpoint::CheckpointService;
use crate::config::Settings;
use crate::relay::RelayBridge;

/// Register the built-in handlers on a bridge
pub async fn register_builtin(
    bridge: &RelayBridge,
    settings: Arc<Settings>,
    checkpoints: Arc<CheckpointService>,
) {
    bridge
        .register_handler(Arc::new(ChatCompletionHandler::new(settings)))
        .await;
    bridge
        .register_handler(Arc::new(CheckpointCreateHandler::new(Arc::clone(
            &checkpoints,
        ))))
        .await;
    bridge
        .register_handler(Arc::new(CheckpointRestoreHandler::new(checkpoints)))
        .await;
}
