// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Gas Town Daemon (gtd) library: patrol scheduling and the patrol
//! catalog. The `gtd` binary wires this to the real store and issue
//! layer; the `gt` CLI reuses the doctor for one-shot runs.

pub mod env;
pub mod lifecycle;
pub mod patrol;

pub use lifecycle::{Config, LifecycleError};
pub use patrol::{Patrol, PatrolError, PatrolScheduler};
