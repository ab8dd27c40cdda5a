//! Event handler for host hooks.
//!
//! Reads one JSON document from stdin, appends an audit record, and keeps the
//! active-session registry in step with subagent start/stop events.
//!
//! Every failure (unreadable stdin, malformed JSON, filesystem trouble) comes
//! back as an `Err` and `main` drops it; the host always sees exit 0.

use activity_core::{
    hook_disabled, HookConfig, HookError, HookInput, HookPaths, Outcome, Recorder,
};
use chrono::Utc;
use std::io::{self, Read};

pub fn run() -> Result<Outcome, HookError> {
    // Read to completion either way so the host never sees a broken pipe.
    let mut input = String::new();
    let read = io::stdin().read_to_string(&mut input);

    if hook_disabled() {
        return Ok(Outcome::Ignored);
    }
    read.map_err(|e| HookError::io("Failed to read stdin", e))?;

    let paths = HookPaths::resolve()?;
    handle_payload(&input, &paths)
}

fn handle_payload(input: &str, paths: &HookPaths) -> Result<Outcome, HookError> {
    if input.trim().is_empty() {
        return Ok(Outcome::Ignored);
    }

    let hook_input: HookInput = serde_json::from_str(input)
        .map_err(|e| HookError::json("Failed to parse hook input", e))?;

    let config = HookConfig::load_or_default(&paths.config);
    let paths = paths.clone().with_overrides(&config);
    let recorder = Recorder::new(&paths, &config).with_host_pid(get_ppid());

    let outcome = recorder.record(&hook_input, Utc::now())?;
    tracing::debug!(
        outcome = ?outcome,
        audit_log = %paths.audit_log.display(),
        "Hook event handled"
    );
    Ok(outcome)
}

fn get_ppid() -> Option<u32> {
    #[cfg(unix)]
    {
        // SAFETY: getppid() is a simple syscall that returns the parent process ID.
        // It has no failure modes and always returns a valid PID (1 if parent exited).
        #[allow(unsafe_code)]
        Some(unsafe { libc::getppid() } as u32)
    }
    #[cfg(not(unix))]
    {
        None
    }
}
