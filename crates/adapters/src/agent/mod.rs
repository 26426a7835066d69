// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent conversation-log adapters

pub mod tail;

pub use tail::{spawn_tail, AgentLogEvent, TailConfig};
