// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command relay bridge
//!
//! Correlated command/response frames over a persistent local socket,
//! dispatched through an ordered handler chain.

pub mod bridge;
pub mod protocol;

pub use bridge::{CommandHandler, FnHandler, RelayBridge};
pub use protocol::{decode_frame, DecodeFailure, RelayCommand, RelayResponse};
