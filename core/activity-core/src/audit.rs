//! Append-only audit log of hook events.
//!
//! One compact JSON object per line. Lines are only ever added at the end;
//! nothing in this crate rewrites or truncates the file, so any earlier
//! snapshot of it stays a byte-prefix of the current contents.
//!
//! Each append serializes the full line in memory first and hands it to a
//! single `write_all` on an `O_APPEND` handle while holding an exclusive
//! advisory lock on the log, so concurrent hook processes never interleave
//! their lines and a serialization failure writes nothing at all. A write cut
//! short by the filesystem (disk full, I/O error) can still leave a torn last
//! line; [`AuditLog::read_all`] skips it.
//!
//! The lock is waited on for a bounded time only. If it is still held at the
//! deadline the append fails and the record is dropped.

use chrono::{DateTime, Utc};
use fs_err as fs;
use fs_err::OpenOptions;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::RecordLimits;
use crate::error::{HookError, Result};
use crate::event::{EventKind, HookEvent};
use crate::lock::{lock_exclusive_within, DEFAULT_LOCK_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Assigned by the recorder, never taken from the payload.
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    /// Tool name for tool invocations, session type for session events.
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub prompt_truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_pid: Option<u32>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl AuditRecord {
    pub fn from_event(event: &HookEvent, limits: RecordLimits, now: DateTime<Utc>) -> Self {
        match event {
            HookEvent::ToolInvocation {
                tool_name,
                description,
                prompt,
            } => {
                let (prompt, prompt_truncated) = match prompt {
                    Some(prompt) => {
                        let (excerpt, cut) = truncate_chars(prompt, limits.prompt_excerpt_chars);
                        (Some(excerpt), cut)
                    }
                    None => (None, false),
                };
                AuditRecord {
                    timestamp: now,
                    event: EventKind::ToolInvocation,
                    subject: tool_name.clone(),
                    description: description
                        .as_deref()
                        .map(|d| truncate_chars(d, limits.description_max_chars).0),
                    prompt,
                    prompt_truncated,
                    session_id: None,
                    host_pid: None,
                }
            }
            HookEvent::SessionStart {
                session_id,
                session_type,
            }
            | HookEvent::SessionStop {
                session_id,
                session_type,
            } => AuditRecord {
                timestamp: now,
                event: event.kind(),
                subject: session_type.clone(),
                description: None,
                prompt: None,
                prompt_truncated: false,
                session_id: Some(session_id.clone()),
                host_pid: None,
            },
        }
    }

    pub fn with_host_pid(mut self, pid: Option<u32>) -> Self {
        self.host_pid = pid;
        self
    }
}

/// Cuts `text` to at most `max_chars` characters without splitting one.
/// Returns the excerpt and whether anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (text[..byte_index].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// Handle on the audit log file. Holds no file descriptor between calls.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    lock_timeout: Duration,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AuditLog {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Sets how long an append waits for another writer's lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single line, creating the file and its parent
    /// directory on first use.
    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| HookError::json("Failed to serialize audit record", e))?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HookError::io("Failed to create audit log directory", e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HookError::io("Failed to open audit log", e))?;

        lock_exclusive_within(file.file(), &self.path, self.lock_timeout)?;
        let written = file
            .write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| HookError::io("Failed to append audit record", e));
        let _ = fs2::FileExt::unlock(file.file());
        written
    }

    /// Reads every parseable record. Lines that fail to parse (a torn tail
    /// after a crash, or foreign content) are skipped.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HookError::io("Failed to read audit log", e)),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping unparseable audit line");
                    None
                }
            })
            .collect())
    }
}
