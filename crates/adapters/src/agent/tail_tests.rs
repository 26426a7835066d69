// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use tempfile::TempDir;
use yare::parameterized;

// --- parse_line ---

#[test]
fn text_blocks_become_text_events() {
    let events = parse_line(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello"},{"type":"text","text":"world"}]}}"#,
    );
    assert_eq!(
        events,
        vec![
            AgentLogEvent::Text { text: "hello".to_string() },
            AgentLogEvent::Text { text: "world".to_string() },
        ]
    );
}

#[test]
fn all_block_kinds_map_to_events() {
    let events = parse_line(
        r#"{"type":"assistant","message":{"content":[
            {"type":"text","text":"a"},
            {"type":"thinking","thinking":"hmm"},
            {"type":"tool_use","name":"Bash","input":{"command":"ls"}},
            {"type":"tool_result","content":"ok"}
        ]}}"#,
    );
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[1], AgentLogEvent::Thinking { text } if text == "hmm"));
    assert!(matches!(&events[2], AgentLogEvent::ToolUse { name, .. } if name == "Bash"));
    assert!(matches!(&events[3], AgentLogEvent::ToolResult { content } if content == "ok"));
}

#[test]
fn empty_payload_blocks_are_skipped() {
    let events = parse_line(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":""},{"type":"thinking","thinking":""}]}}"#,
    );
    assert!(events.is_empty());
}

// Property: an assistant message with k content blocks and non-zero usage
// emits exactly one usage event, not k.
#[test]
fn usage_emitted_once_per_message() {
    let events = parse_line(
        r#"{"type":"assistant","message":{
            "content":[{"type":"text","text":"a"},{"type":"text","text":"b"},{"type":"text","text":"c"}],
            "usage":{"input_tokens":10,"output_tokens":20,"cache_read_input_tokens":0,"cache_creation_input_tokens":0}
        }}"#,
    );
    let usage_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, AgentLogEvent::Usage { .. }))
        .collect();
    assert_eq!(usage_events.len(), 1);
    assert!(matches!(
        usage_events[0],
        AgentLogEvent::Usage { input_tokens: 10, output_tokens: 20, .. }
    ));
}

#[test]
fn all_zero_usage_emits_nothing() {
    let events = parse_line(
        r#"{"type":"assistant","message":{"content":[],"usage":{"input_tokens":0,"output_tokens":0,"cache_read_input_tokens":0,"cache_creation_input_tokens":0}}}"#,
    );
    assert!(events.is_empty());
}

#[test]
fn user_messages_never_emit_usage() {
    let events = parse_line(
        r#"{"type":"user","message":{"content":[{"type":"tool_result","content":"done"}],"usage":{"output_tokens":5}}}"#,
    );
    assert_eq!(
        events,
        vec![AgentLogEvent::ToolResult { content: "done".to_string() }]
    );
}

#[parameterized(
    malformed = { "{not json" },
    unknown_type = { r#"{"type":"summary","message":{"content":[{"type":"text","text":"x"}]}}"# },
    no_message = { r#"{"type":"assistant"}"# },
    string_content = { r#"{"type":"user","message":{"content":"plain string"}}"# },
)]
fn dropped_lines_emit_nothing(line: &str) {
    assert!(parse_line(line).is_empty());
}

// --- project_dir_name ---

#[parameterized(
    unix = { "/home/ace/rigs/gastown", "-home-ace-rigs-gastown" },
    windows = { "C:\\Users\\ace\\rigs\\gastown", "-Users-ace-rigs-gastown" },
    relative = { "rigs/gastown", "rigs-gastown" },
)]
fn project_dir_name_normalizes(input: &str, expected: &str) {
    assert_eq!(project_dir_name(Path::new(input)), expected);
}

// --- read_new_events offset handling ---

#[test]
fn partial_lines_wait_for_terminator() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("s.jsonl");
    std::fs::write(
        &log,
        "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"one\"}]}}\n{\"type\":\"assistant\",\"mess",
    )
    .unwrap();

    let (events, offset) = read_new_events(&log, 0);
    assert_eq!(events.len(), 1, "complete line parsed");

    // Finish the partial line; re-read resumes at the stored offset.
    let mut f = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
    write!(
        f,
        "age\":{{\"content\":[{{\"type\":\"text\",\"text\":\"two\"}}]}}}}\n"
    )
    .unwrap();
    drop(f);

    let (events, _) = read_new_events(&log, offset);
    assert_eq!(
        events,
        vec![AgentLogEvent::Text { text: "two".to_string() }]
    );
}

#[test]
fn truncated_file_restarts_from_zero() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("s.jsonl");
    std::fs::write(&log, "{\"type\":\"user\",\"message\":{\"content\":[{\"type\":\"tool_result\",\"content\":\"a\"}]}}\n").unwrap();
    let (_, offset) = read_new_events(&log, 0);
    assert!(offset > 0);

    std::fs::write(&log, "{\"type\":\"user\",\"message\":{\"content\":[{\"type\":\"tool_result\",\"content\":\"b\"}]}}\n").unwrap();
    let (events, _) = read_new_events(&log, offset.max(1000));
    assert_eq!(
        events,
        vec![AgentLogEvent::ToolResult { content: "b".to_string() }]
    );
}

// --- tail loop ---

fn write_line(path: &Path, line: &str) {
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    writeln!(f, "{}", line).unwrap();
}

fn text_line(text: &str) -> String {
    format!(
        r#"{{"type":"assistant","message":{{"content":[{{"type":"text","text":"{}"}}]}}}}"#,
        text
    )
}

#[tokio::test]
#[serial_test::serial]
async fn tailer_streams_appended_lines() {
    std::env::set_var("GT_TAIL_POLL_MS", "10");
    let root = TempDir::new().unwrap();
    let project = root.path().join(project_dir_name(Path::new("/work/rig")));
    std::fs::create_dir_all(&project).unwrap();
    let log = project.join("session-1.jsonl");
    write_line(&log, &text_line("first"));

    let cancel = CancellationToken::new();
    let mut rx = spawn_tail(
        TailConfig {
            work_dir: PathBuf::from("/work/rig"),
            logs_root: Some(root.path().to_path_buf()),
            since_epoch_ms: 0,
        },
        cancel.clone(),
    );

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, AgentLogEvent::Text { text: "first".to_string() });

    write_line(&log, &text_line("second"));
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, AgentLogEvent::Text { text: "second".to_string() });

    cancel.cancel();
    let closed = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
    assert_eq!(closed.unwrap(), None, "cancellation closes the channel");
    std::env::remove_var("GT_TAIL_POLL_MS");
}

#[tokio::test]
#[serial_test::serial]
async fn tailer_switches_to_newer_session_log() {
    std::env::set_var("GT_TAIL_POLL_MS", "10");
    let root = TempDir::new().unwrap();
    let project = root.path().join(project_dir_name(Path::new("/work/rig")));
    std::fs::create_dir_all(&project).unwrap();
    let log1 = project.join("session-1.jsonl");
    write_line(&log1, &text_line("from-one"));

    let cancel = CancellationToken::new();
    let mut rx = spawn_tail(
        TailConfig {
            work_dir: PathBuf::from("/work/rig"),
            logs_root: Some(root.path().to_path_buf()),
            since_epoch_ms: 0,
        },
        cancel.clone(),
    );

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, AgentLogEvent::Text { text: "from-one".to_string() });

    // A newer session appears; filesystem mtime granularity can be
    // coarse, so nudge the clock forward before writing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let log2 = project.join("session-2.jsonl");
    write_line(&log2, &text_line("from-two"));
    let newer = std::time::SystemTime::now() + Duration::from_secs(2);
    let _ = filetime_set(&log2, newer);

    let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, AgentLogEvent::Text { text: "from-two".to_string() });

    cancel.cancel();
    std::env::remove_var("GT_TAIL_POLL_MS");
}

/// Bump a file's mtime without an extra dev-dependency.
fn filetime_set(path: &Path, to: std::time::SystemTime) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new().append(true).open(path)?;
    file.set_modified(to)
}

#[tokio::test]
#[serial_test::serial]
async fn tailer_waits_for_file_to_appear() {
    std::env::set_var("GT_TAIL_POLL_MS", "10");
    let root = TempDir::new().unwrap();
    let project = root.path().join(project_dir_name(Path::new("/work/rig")));
    std::fs::create_dir_all(&project).unwrap();

    let cancel = CancellationToken::new();
    let mut rx = spawn_tail(
        TailConfig {
            work_dir: PathBuf::from("/work/rig"),
            logs_root: Some(root.path().to_path_buf()),
            since_epoch_ms: 0,
        },
        cancel.clone(),
    );

    // Nothing yet
    tokio::time::sleep(Duration::from_millis(50)).await;
    let log = project.join("late.jsonl");
    write_line(&log, &text_line("late-arrival"));

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, AgentLogEvent::Text { text: "late-arrival".to_string() });

    cancel.cancel();
    std::env::remove_var("GT_TAIL_POLL_MS");
}
