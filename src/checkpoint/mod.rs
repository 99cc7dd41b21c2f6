// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shadow checkpoint service
//!
//! Out-of-band snapshots of a workspace, kept in hidden per-task
//! repositories so the user's own version control is never touched.

pub mod service;
pub mod shadow;

pub use service::{Checkpoint, CheckpointService};
pub use shadow::ShadowRepository;
