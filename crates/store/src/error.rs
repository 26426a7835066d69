// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy: concurrent-write, timeout, other.

use std::time::Duration;
use thiserror::Error;

/// Message fragments the store emits when a write raced the rebase graph.
///
/// The store does not yet expose structured error codes for these, so the
/// classification is a substring rule. It lives here, in one place, so a
/// future upgrade to structured codes touches nothing else.
const CONCURRENT_WRITE_MARKERS: &[&str] = &[
    "rebase execution failed",
    "concurrency abort",
    "graph",
    "cannot rebase",
];

/// Case-insensitive check whether an error message indicates a concurrent
/// write racing an in-flight rebase.
pub fn is_concurrent_write_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONCURRENT_WRITE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Errors from store queries. The client never retries; callers decide
/// based on the kind.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("concurrent write during {operation}: {message}")]
    ConcurrentWrite { operation: String, message: String },
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    #[error("{operation} failed: {message}")]
    Other { operation: String, message: String },
}

impl StoreError {
    /// Classify a query failure into the taxonomy.
    pub fn from_query(operation: &str, err: sqlx::Error) -> Self {
        let message = err.to_string();
        if is_concurrent_write_message(&message) {
            StoreError::ConcurrentWrite {
                operation: operation.to_string(),
                message,
            }
        } else {
            StoreError::Other {
                operation: operation.to_string(),
                message,
            }
        }
    }

    pub fn other(operation: &str, message: impl Into<String>) -> Self {
        StoreError::Other {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn is_concurrent_write(&self) -> bool {
        matches!(self, StoreError::ConcurrentWrite { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
