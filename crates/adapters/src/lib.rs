// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the issue layer (`bd`), agent session
//! logs, tmux sessions, git, and process listing.

pub mod agent;
pub mod beads;
mod env;
pub mod git;
pub mod proc;
pub mod session;
pub mod subprocess;

pub use agent::{spawn_tail, AgentLogEvent, TailConfig};
pub use beads::{AgentBeadState, BdCli, BeadsAdapter, BeadsError};
pub use proc::{find_zombie_sql_servers, list_processes, ProcessInfo};
pub use session::{NoOpSessionAdapter, SessionAdapter, SessionError, TmuxAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use beads::{BeadsCall, FakeBeads};
#[cfg(any(test, feature = "test-support"))]
pub use session::{FakeSession, FakeSessionAdapter, SessionCall};
