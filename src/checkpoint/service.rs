// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Checkpoint service - snapshot and restore workspace state per task
//!
//! Serializes shadow-repository work per task id with lazily-created
//! mutexes; tasks with different ids proceed fully in parallel. The git
//! work itself runs on the blocking pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::shadow::ShadowRepository;
use crate::error::{Result, SidecarError};

/// An immutable snapshot of workspace state inside a shadow repository
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Snapshot identifier inside the shadow repository
    pub id: String,

    /// Human-readable message supplied by the caller
    pub message: String,

    /// Workspace the snapshot was taken of
    pub project_root: PathBuf,

    /// Task the shadow repository belongs to
    pub task_id: String,

    /// When the snapshot was created
    pub created_at: DateTime<Utc>,
}

/// Creates and restores checkpoints, one shadow repository per task
pub struct CheckpointService {
    storage_root: PathBuf,
    task_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CheckpointService {
    /// Create a service storing shadow repositories under `storage_root`
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            task_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot the full current state of `project_root` for `task_id`.
    ///
    /// The shadow repository is created on first use and reused for every
    /// later checkpoint of the same task; prior snapshots are never
    /// rewritten.
    pub async fn create_checkpoint(
        &self,
        project_root: &Path,
        task_id: &str,
        message: &str,
    ) -> Result<Checkpoint> {
        let lock = self.lock_for(task_id).await;
        let _guard = lock.lock().await;

        let storage_root = self.storage_root.clone();
        let root = project_root.to_path_buf();
        let task = task_id.to_string();
        let msg = message.to_string();

        let id = tokio::task::spawn_blocking(move || -> Result<String> {
            let shadow = ShadowRepository::open_or_create(&storage_root, &task, &root)?;
            shadow.snapshot(&msg)
        })
        .await
        .map_err(|e| SidecarError::checkpoint(task_id, format!("checkpoint task failed: {}", e)))?
        .map_err(|e| attribute(e, task_id))?;

        tracing::debug!("created checkpoint {} for task {}", id, task_id);

        Ok(Checkpoint {
            id,
            message: message.to_string(),
            project_root: project_root.to_path_buf(),
            task_id: task_id.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Reset the workspace to the state recorded at `checkpoint`.
    ///
    /// The checkpoint's project root must match the shadow repository's
    /// bound workspace; a mismatch fails fast without touching any files.
    pub async fn restore(&self, checkpoint: &Checkpoint) -> Result<()> {
        let lock = self.lock_for(&checkpoint.task_id).await;
        let _guard = lock.lock().await;

        let storage_root = self.storage_root.clone();
        let root = checkpoint.project_root.clone();
        let task = checkpoint.task_id.clone();
        let id = checkpoint.id.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let shadow = ShadowRepository::open_or_create(&storage_root, &task, &root)?;
            shadow.restore(&id)
        })
        .await
        .map_err(|e| {
            SidecarError::checkpoint(&checkpoint.task_id, format!("restore task failed: {}", e))
        })?
        .map_err(|e| attribute(e, &checkpoint.task_id))?;

        tracing::debug!(
            "restored checkpoint {} for task {}",
            checkpoint.id,
            checkpoint.task_id
        );
        Ok(())
    }

    /// Where shadow repositories are stored
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    async fn lock_for(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.task_locks.lock().await;
        Arc::clone(
            locks
                .entry(task_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

fn attribute(err: SidecarError, task_id: &str) -> SidecarError {
    match err {
        already @ SidecarError::Checkpoint { .. } => already,
        other => SidecarError::checkpoint(task_id, other.to_string()),
    }
}
