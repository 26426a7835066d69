// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gt-core: Core library for the Gas Town (gt) orchestrator

pub mod attachment;
pub mod bead;
pub mod config;
pub mod duration;
pub mod error;
pub mod identity;
pub mod mail_limit;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use attachment::{AttachmentField, AttachmentFields};
pub use bead::{priority_score, Bead, BeadId, BeadStatus, PRIORITY_MAX};
pub use config::{
    CompactionMode, DaemonConfig, PatrolSettings, CONFIG_FILE_TYPE, PATROL_COMPACTOR,
    PATROL_DEACON, PATROL_DOCTOR, PATROL_DOLT_BACKUP, PATROL_JSONL_BACKUP, PATROL_REAPER,
    PATROL_REFINERY, PATROL_SCHEDULED_MAINTENANCE, PATROL_WITNESS,
};
pub use duration::parse_duration;
pub use error::CoreError;
pub use identity::{AgentIdentity, Role};
pub use mail_limit::{MailLimiter, MailPolicy};
