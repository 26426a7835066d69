// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! gt-engine: molecule lifecycle tracking, polecat spawning, and batch
//! dispatch.

pub mod dispatch;
mod env;
pub mod molecule;
pub mod names;
pub mod spawn;
pub mod town;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use dispatch::{
    render_options, BatchDispatcher, BatchOptions, DispatchError, DispatchSummary,
};
pub use molecule::{slug_for_title, MoleculeHandle, MoleculeTracker, STEP_SLUGS};
pub use names::NamePool;
pub use spawn::{
    BranchOps, ConvoyRef, GitWorktrees, SpawnError, SpawnOptions, SpawnOutcome, SpawnPipeline,
    StoreBranches, WorktreeOps,
};
pub use town::{RigInfo, TownContext};
