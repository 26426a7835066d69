// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! gt-store: typed access to the versioned SQL store and the history
//! compaction that keeps it small.

pub mod client;
pub mod compact;
pub mod error;
pub mod maintain;

pub use client::{PoolPurpose, StoreClient, StoreConfig, StoreSession};
pub use compact::{
    flatten, surgical, CompactionError, CompactionOutcome, CompactionStore, BRANCH_COMPACT_BASE,
    BRANCH_COMPACT_WORK,
};
pub use error::{is_concurrent_write_message, StoreError};
pub use maintain::{
    DbOutcome, DbPlan, MaintainOptions, MaintainPlan, MaintainReport, StoreOps, WispPurge,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use compact::fake::FakeCompactionStore;
#[cfg(any(test, feature = "test-support"))]
pub use maintain::fake::{FakeStoreOps, FakeWispPurge};
