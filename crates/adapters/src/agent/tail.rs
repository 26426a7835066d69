// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lazy event stream over an agent's JSONL conversation log.
//!
//! The tailer polls (500 ms contract, no inotify), carries unterminated
//! line fragments by not advancing its offset past them, and switches
//! files when a newer session log appears in the same project directory.
//! Malformed lines and unknown record types are silently dropped.

use crate::env;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A structured event extracted from the conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentLogEvent {
    Text {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolUse {
        name: String,
        input: Value,
    },
    ToolResult {
        content: String,
    },
    /// Token accounting. Emitted at most once per assistant message,
    /// regardless of how many content blocks the message carries.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        cache_read_input_tokens: u64,
        cache_creation_input_tokens: u64,
    },
}

/// Where and from when to tail.
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// The agent's working directory; hashed into the log dir name.
    pub work_dir: PathBuf,
    /// Root of the agent's native log tree. Defaults to
    /// `~/.claude/projects`.
    pub logs_root: Option<PathBuf>,
    /// Only consider log files modified at or after this time.
    /// Zero means any file qualifies.
    pub since_epoch_ms: u64,
}

impl TailConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            logs_root: None,
            since_epoch_ms: 0,
        }
    }
}

/// Start tailing. Events arrive on the returned channel; cancellation
/// exits at the next poll and closes the channel.
pub fn spawn_tail(
    config: TailConfig,
    cancel: CancellationToken,
) -> mpsc::Receiver<AgentLogEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(tail_loop(config, cancel, tx));
    rx
}

/// Convert a work-dir path to the agent's log directory name:
/// forward-slash normalized, drive prefix stripped, separators replaced
/// with dashes. Cross-platform by construction.
pub fn project_dir_name(path: &Path) -> String {
    let mut name = path.to_string_lossy().replace('\\', "/");
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        name = name[2..].to_string();
    }
    name.replace('/', "-")
}

fn project_log_dir(config: &TailConfig) -> PathBuf {
    let root = config.logs_root.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".claude")
            .join("projects")
    });
    root.join(project_dir_name(&config.work_dir))
}

fn epoch_ms_to_time(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

/// Newest `.jsonl` in `dir` with mtime at or after `since`. Ignores the
/// mtime floor entirely when `since` is `None`.
fn select_log_file(dir: &Path, since: Option<SystemTime>) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "jsonl"))
        .filter_map(|e| {
            let mtime = e.metadata().ok()?.modified().ok()?;
            Some((e.path(), mtime))
        })
        .filter(|(_, mtime)| since.map(|floor| *mtime >= floor).unwrap_or(true))
        .max_by_key(|(_, mtime)| *mtime)
        .map(|(path, _)| path)
}

async fn tail_loop(
    config: TailConfig,
    cancel: CancellationToken,
    tx: mpsc::Sender<AgentLogEvent>,
) {
    let dir = project_log_dir(&config);
    let poll = env::tail_poll_ms();
    let wait_budget = env::tail_wait_for_file();
    let mut since = (config.since_epoch_ms > 0).then(|| epoch_ms_to_time(config.since_epoch_ms));

    'select_file: loop {
        // WaitingForFile: poll for a qualifying log, resetting the mtime
        // floor when the wait budget runs out so an agent restart after a
        // long gap still gets picked up.
        let mut waited = Duration::ZERO;
        let current = loop {
            if cancel.is_cancelled() {
                return;
            }
            if let Some(path) = select_log_file(&dir, since) {
                break path;
            }
            if waited >= wait_budget {
                tracing::debug!(dir = %dir.display(), "no session log yet, resetting mtime floor");
                since = Some(SystemTime::now().checked_sub(poll).unwrap_or(UNIX_EPOCH));
                waited = Duration::ZERO;
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(poll) => waited += poll,
            }
        };
        tracing::debug!(file = %current.display(), "tailing session log");

        // Tailing: drain new complete lines, then look for rotation.
        let mut offset: u64 = 0;
        loop {
            let (events, new_offset) = read_new_events(&current, offset);
            offset = new_offset;
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }

            // Switching: a newer log in the project dir replaces this one.
            if let Some(newer) = select_log_file(&dir, None) {
                if newer != current && is_newer_than(&newer, &current) {
                    tracing::debug!(from = %current.display(), to = %newer.display(), "newer session log, switching");
                    continue 'select_file;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }
}

fn is_newer_than(a: &Path, b: &Path) -> bool {
    let mtime = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (mtime(a), mtime(b)) {
        (Some(ma), Some(mb)) => ma > mb,
        _ => false,
    }
}

/// Parse complete lines appended since `offset`. The offset only advances
/// past newline-terminated lines, so a partial tail fragment is re-read
/// on the next poll once its terminator arrives.
fn read_new_events(path: &Path, offset: u64) -> (Vec<AgentLogEvent>, u64) {
    let Ok(file) = File::open(path) else {
        return (Vec::new(), offset);
    };
    let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut offset = offset;
    if file_len < offset {
        // Truncated underneath us; start over.
        offset = 0;
    }

    let mut reader = BufReader::new(file);
    if reader.seek(SeekFrom::Start(offset)).is_err() {
        return (Vec::new(), offset);
    }

    let mut events = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if !line.ends_with('\n') {
                    break;
                }
                offset += n as u64;
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    events.extend(parse_line(trimmed));
                }
            }
        }
    }

    (events, offset)
}

fn get_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(|v| v.as_str())
}

/// Events for one JSONL record. Unknown types and malformed JSON yield
/// nothing.
pub fn parse_line(line: &str) -> Vec<AgentLogEvent> {
    let Ok(json) = serde_json::from_str::<Value>(line) else {
        return Vec::new();
    };
    let record_type = get_str(&json, "type");
    if !matches!(record_type, Some("assistant") | Some("user")) {
        return Vec::new();
    }
    let Some(message) = json.get("message") else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(blocks) = message.get("content").and_then(|c| c.as_array()) {
        for block in blocks {
            match get_str(block, "type") {
                Some("text") => {
                    if let Some(text) = get_str(block, "text").filter(|t| !t.is_empty()) {
                        events.push(AgentLogEvent::Text {
                            text: text.to_string(),
                        });
                    }
                }
                Some("thinking") => {
                    if let Some(text) = get_str(block, "thinking").filter(|t| !t.is_empty()) {
                        events.push(AgentLogEvent::Thinking {
                            text: text.to_string(),
                        });
                    }
                }
                Some("tool_use") => {
                    if let Some(name) = get_str(block, "name").filter(|n| !n.is_empty()) {
                        events.push(AgentLogEvent::ToolUse {
                            name: name.to_string(),
                            input: block.get("input").cloned().unwrap_or(Value::Null),
                        });
                    }
                }
                Some("tool_result") => {
                    if let Some(content) = get_str(block, "content").filter(|c| !c.is_empty()) {
                        events.push(AgentLogEvent::ToolResult {
                            content: content.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    // One usage event per assistant message, never per block.
    if record_type == Some("assistant") {
        if let Some(usage) = message.get("usage") {
            let counter = |key: &str| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
            let input_tokens = counter("input_tokens");
            let output_tokens = counter("output_tokens");
            let cache_read_input_tokens = counter("cache_read_input_tokens");
            let cache_creation_input_tokens = counter("cache_creation_input_tokens");
            if input_tokens + output_tokens + cache_read_input_tokens + cache_creation_input_tokens
                > 0
            {
                events.push(AgentLogEvent::Usage {
                    input_tokens,
                    output_tokens,
                    cache_read_input_tokens,
                    cache_creation_input_tokens,
                });
            }
        }
    }

    events
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
