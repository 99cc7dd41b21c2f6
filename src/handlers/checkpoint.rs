// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Checkpoint command handlers
//!
//! `checkpoint/create` snapshots a workspace and returns the resulting
//! checkpoint value; `checkpoint/restore` takes such a value back and
//! resets the workspace to it.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::checkpoint::{Checkpoint, CheckpointService};
use crate::error::{Result, SidecarError};
use crate::relay::{CommandHandler, RelayCommand};

/// Handles `checkpoint/create` relay commands
pub struct CheckpointCreateHandler {
    service: Arc<CheckpointService>,
}

impl CheckpointCreateHandler {
    pub const COMMAND: &'static str = "checkpoint/create";

    pub fn new(service: Arc<CheckpointService>) -> Self {
        Self { service }
    }

    async fn run(&self, command: &RelayCommand) -> Result<Value> {
        let project_root = PathBuf::from(command.str_field("projectRoot")?);
        let task_id = command.str_field("taskId")?;
        let message = command
            .field("message")
            .and_then(Value::as_str)
            .unwrap_or("checkpoint");

        let checkpoint = self
            .service
            .create_checkpoint(&project_root, task_id, message)
            .await?;
        Ok(serde_json::to_value(checkpoint)?)
    }
}

#[async_trait::async_trait]
impl CommandHandler for CheckpointCreateHandler {
    async fn handle(&self, command: &RelayCommand) -> Option<Result<Value>> {
        if command.command != Self::COMMAND {
            return None;
        }
        Some(self.run(command).await)
    }
}

/// Handles `checkpoint/restore` relay commands
pub struct CheckpointRestoreHandler {
    service: Arc<CheckpointService>,
}

impl CheckpointRestoreHandler {
    pub const COMMAND: &'static str = "checkpoint/restore";

    pub fn new(service: Arc<CheckpointService>) -> Self {
        Self { service }
    }

    async fn run(&self, command: &RelayCommand) -> Result<Value> {
        let checkpoint: Checkpoint = match command.field("checkpoint") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                SidecarError::InvalidInput(format!("malformed checkpoint field: {}", e))
            })?,
            None => {
                return Err(SidecarError::InvalidInput(
                    "checkpoint/restore requires a checkpoint field".to_string(),
                ))
            }
        };

        self.service.restore(&checkpoint).await?;
        Ok(json!({ "restored": checkpoint.id }))
    }
}

#[async_trait::async_trait]
impl CommandHandler for CheckpointRestoreHandler {
    async fn handle(&self, command: &RelayCommand) -> Option<Result<Value>> {
        if command.command != Self::COMMAND {
            return None;
        }
        Some(self.run(command).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn command(name: &str, payload: Value) -> RelayCommand {
        let map: HashMap<String, Value> = serde_json::from_value(payload).unwrap();
        RelayCommand {
            command: name.to_string(),
            id: "1".to_string(),
            payload: map,
        }
    }

    #[tokio::test]
    async fn test_create_then_restore_via_handlers() {
        let storage = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let file = workspace.path().join("f.txt");
        std::fs::write(&file, "original").unwrap();

        let service = Arc::new(CheckpointService::new(storage.path()));
        let create = CheckpointCreateHandler::new(Arc::clone(&service));
        let restore = CheckpointRestoreHandler::new(service);

        let created = create
            .handle(&command(
                "checkpoint/create",
                json!({
                    "projectRoot": workspace.path(),
                    "taskId": "task-1",
                    "message": "before edit",
                }),
            ))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created["taskId"], "task-1");
        assert!(created["id"].as_str().unwrap().len() == 40);

        std::fs::write(&file, "mutated").unwrap();

        let restored = restore
            .handle(&command(
                "checkpoint/restore",
                json!({ "checkpoint": created }),
            ))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(restored["restored"], created["id"]);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
    }

    #[tokio::test]
    async fn test_create_missing_fields() {
        let storage = TempDir::new().unwrap();
        let service = Arc::new(CheckpointService::new(storage.path()));
        let create = CheckpointCreateHandler::new(service);

        let result = create
            .handle(&command("checkpoint/create", json!({"taskId": "t"})))
            .await
            .unwrap();
        assert!(result.unwrap_err().to_string().contains("projectRoot"));
    }

    #[tokio::test]
    async fn test_restore_missing_checkpoint_field() {
        let storage = TempDir::new().unwrap();
        let service = Arc::new(CheckpointService::new(storage.path()));
        let restore = CheckpointRestoreHandler::new(service);

        let result = restore
            .handle(&command("checkpoint/restore", json!({})))
            .await
            .unwrap();
        assert!(result.unwrap_err().to_string().contains("checkpoint"));
    }

    #[tokio::test]
    async fn test_handlers_decline_other_commands() {
        let storage = TempDir::new().unwrap();
        let service = Arc::new(CheckpointService::new(storage.path()));
        let create = CheckpointCreateHandler::new(Arc::clone(&service));
        let restore = CheckpointRestoreHandler::new(service);

        assert!(create.handle(&command("other", json!({}))).await.is_none());
        assert!(restore.handle(&command("other", json!({}))).await.is_none());
    }
}
