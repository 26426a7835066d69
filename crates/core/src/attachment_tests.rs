// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn upsert_appends_after_blank_separator() {
    let desc = "Fix the scheduler race.";
    let updated = upsert(desc, AttachmentField::Convoy, "hq-cv123");
    assert_eq!(updated, "Fix the scheduler race.\n\ngt:convoy: hq-cv123");
}

#[test]
fn upsert_replaces_in_place() {
    let desc = "Fix it.\n\ngt:convoy: hq-old\ngt:args: --force";
    let updated = upsert(desc, AttachmentField::Convoy, "hq-new");
    assert_eq!(updated, "Fix it.\n\ngt:convoy: hq-new\ngt:args: --force");
}

#[test]
fn upsert_preserves_unrelated_text_and_fields() {
    let desc = "Line one.\nLine two with gt: in prose but no key.\n\ngt:dispatcher: mayor";
    let updated = upsert(desc, AttachmentField::AttachedMolecule, "gt-mol1");
    assert!(updated.contains("Line one."));
    assert!(updated.contains("Line two with gt: in prose but no key."));
    assert!(updated.contains("gt:dispatcher: mayor"));
    assert!(updated.contains("gt:attached-molecule: gt-mol1"));
}

// Invariant: two writers touching different fields must both survive a
// read-modify-write cycle, regardless of order.
#[test]
fn independent_field_updates_merge() {
    let base = "Original description.";
    let after_a = upsert(base, AttachmentField::Convoy, "hq-cv1");
    let after_b = upsert(&after_a, AttachmentField::Dispatcher, "mayor/ace");
    let fields = AttachmentFields::parse(&after_b);
    assert_eq!(fields.convoy.as_deref(), Some("hq-cv1"));
    assert_eq!(fields.dispatcher.as_deref(), Some("mayor/ace"));
    assert!(after_b.starts_with("Original description."));
}

#[test]
fn clear_removes_only_target_field() {
    let desc = "Body.\n\ngt:convoy: hq-cv1\ngt:no-merge: true";
    let cleared = clear(desc, AttachmentField::Convoy);
    let fields = AttachmentFields::parse(&cleared);
    assert_eq!(fields.convoy, None);
    assert!(fields.no_merge);
    assert!(cleared.contains("Body."));
}

#[test]
fn parse_last_duplicate_wins() {
    let desc = "gt:convoy: first\ngt:convoy: second";
    let fields = AttachmentFields::parse(desc);
    assert_eq!(fields.convoy.as_deref(), Some("second"));
}

#[test]
fn upsert_collapses_duplicates() {
    let desc = "gt:convoy: first\ngt:convoy: second";
    let updated = upsert(desc, AttachmentField::Convoy, "third");
    assert_eq!(updated, "gt:convoy: third");
}

#[test]
fn no_merge_parses_boolean() {
    assert!(AttachmentFields::parse("gt:no-merge: true").no_merge);
    assert!(!AttachmentFields::parse("gt:no-merge: false").no_merge);
    assert!(!AttachmentFields::parse("no fields at all").no_merge);
}

#[test]
fn get_reads_single_field() {
    let desc = "Title text\n\ngt:args: --base main --force";
    assert_eq!(
        get(desc, AttachmentField::Args).as_deref(),
        Some("--base main --force")
    );
    assert_eq!(get(desc, AttachmentField::Convoy), None);
}

#[test]
fn empty_description_round_trips() {
    let updated = upsert("", AttachmentField::NoMerge, "true");
    assert_eq!(updated, "gt:no-merge: true");
    assert!(AttachmentFields::parse(&updated).no_merge);
}
