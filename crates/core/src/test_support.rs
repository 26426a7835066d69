// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (behind the `test-support` feature).
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::bead::{Bead, BeadId, BeadStatus};

/// Builder for beads in tests.
#[derive(Debug, Clone)]
pub struct BeadBuilder {
    bead: Bead,
}

impl BeadBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            bead: Bead {
                id: BeadId::new(id),
                title: "test bead".to_string(),
                status: BeadStatus::Open,
                priority: 2,
                description: String::new(),
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.bead.title = title.into();
        self
    }

    pub fn status(mut self, status: BeadStatus) -> Self {
        self.bead.status = status;
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.bead.priority = priority;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.bead.description = description.into();
        self
    }

    pub fn build(self) -> Bead {
        self.bead
    }
}

/// Shorthand for a default open bead.
pub fn bead(id: impl Into<String>) -> Bead {
    BeadBuilder::new(id).build()
}
