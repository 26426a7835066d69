// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attachment fields embedded in a bead description.
//!
//! Dispatch state (molecule root, convoy, dispatcher identity, merge
//! handling, spawn args) rides along in the description as `gt:` prefixed
//! lines so the issue layer needs no schema changes. Every mutation is a
//! read-modify-write over the whole description: [`upsert`] rewrites only
//! its own line and preserves all other text, so concurrent editors of
//! different fields cannot clobber each other's writes.

use std::fmt;

/// Line prefix marking an attachment field inside a description.
const FIELD_PREFIX: &str = "gt:";

/// Keys of the attachment block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentField {
    AttachedMolecule,
    Convoy,
    Dispatcher,
    MergeStrategy,
    NoMerge,
    Args,
}

impl AttachmentField {
    pub const ALL: [AttachmentField; 6] = [
        AttachmentField::AttachedMolecule,
        AttachmentField::Convoy,
        AttachmentField::Dispatcher,
        AttachmentField::MergeStrategy,
        AttachmentField::NoMerge,
        AttachmentField::Args,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AttachmentField::AttachedMolecule => "attached-molecule",
            AttachmentField::Convoy => "convoy",
            AttachmentField::Dispatcher => "dispatcher",
            AttachmentField::MergeStrategy => "merge-strategy",
            AttachmentField::NoMerge => "no-merge",
            AttachmentField::Args => "args",
        }
    }
}

impl fmt::Display for AttachmentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Parsed view of a description's attachment block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentFields {
    pub attached_molecule: Option<String>,
    pub convoy: Option<String>,
    pub dispatcher: Option<String>,
    pub merge_strategy: Option<String>,
    pub no_merge: bool,
    pub args: Option<String>,
}

impl AttachmentFields {
    /// Parse the attachment fields out of a description. Unknown `gt:`
    /// keys are ignored (forward compat); later lines win over earlier
    /// duplicates.
    pub fn parse(description: &str) -> Self {
        let mut fields = Self::default();
        for line in description.lines() {
            let Some((key, value)) = split_field_line(line) else {
                continue;
            };
            match key {
                "attached-molecule" => fields.attached_molecule = Some(value.to_string()),
                "convoy" => fields.convoy = Some(value.to_string()),
                "dispatcher" => fields.dispatcher = Some(value.to_string()),
                "merge-strategy" => fields.merge_strategy = Some(value.to_string()),
                "no-merge" => fields.no_merge = value == "true",
                "args" => fields.args = Some(value.to_string()),
                _ => {}
            }
        }
        fields
    }
}

/// Split a `gt:key: value` line into `(key, value)`.
fn split_field_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start().strip_prefix(FIELD_PREFIX)?;
    let (key, value) = rest.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Read a single field's value out of a description.
pub fn get(description: &str, field: AttachmentField) -> Option<String> {
    let mut found = None;
    for line in description.lines() {
        if let Some((key, value)) = split_field_line(line) {
            if key == field.key() {
                found = Some(value.to_string());
            }
        }
    }
    found
}

/// Set a field in the description, returning the rewritten text.
///
/// Replaces the field's existing line in place, or appends a new line at
/// the end. All other lines pass through byte-for-byte.
pub fn upsert(description: &str, field: AttachmentField, value: &str) -> String {
    let new_line = format!("{}{}: {}", FIELD_PREFIX, field.key(), value);
    let mut out = Vec::new();
    let mut replaced = false;
    for line in description.lines() {
        match split_field_line(line) {
            Some((key, _)) if key == field.key() => {
                // Replace only the first occurrence; drop duplicates so a
                // clear/upsert cycle cannot accumulate stale lines.
                if !replaced {
                    out.push(new_line.clone());
                    replaced = true;
                }
            }
            _ => out.push(line.to_string()),
        }
    }
    if !replaced {
        if let Some(last) = out.last() {
            if !last.is_empty() && split_field_line(last).is_none() {
                out.push(String::new());
            }
        }
        out.push(new_line);
    }
    out.join("\n")
}

/// Remove a field's line(s) from the description.
pub fn clear(description: &str, field: AttachmentField) -> String {
    description
        .lines()
        .filter(|line| !matches!(split_field_line(line), Some((key, _)) if key == field.key()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "attachment_tests.rs"]
mod tests;
