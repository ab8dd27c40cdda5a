//! Turns one hook payload into an audit line and, for session events, a
//! registry transition.
//!
//! ```text
//! tool_invocation → append record
//! session_start   → append record, register(id, type, now)
//! session_stop    → append record, unregister(id)
//! anything else   → nothing
//! ```

use chrono::{DateTime, Utc};

use crate::audit::{AuditLog, AuditRecord};
use crate::config::{HookConfig, HookPaths, RecordLimits};
use crate::error::Result;
use crate::event::{EventKind, HookEvent, HookInput};
use crate::registry::{ActiveSession, RegistryChange, SessionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Unknown or incomplete payload; nothing was written.
    Ignored,
    Recorded {
        kind: EventKind,
        registry: Option<RegistryChange>,
    },
}

#[derive(Debug, Clone)]
pub struct Recorder {
    log: AuditLog,
    registry: SessionRegistry,
    limits: RecordLimits,
    host_pid: Option<u32>,
}

impl Recorder {
    pub fn new(paths: &HookPaths, config: &HookConfig) -> Self {
        Recorder {
            log: AuditLog::new(&paths.audit_log).with_lock_timeout(config.lock_timeout()),
            registry: SessionRegistry::new(&paths.registry)
                .with_lock_timeout(config.lock_timeout()),
            limits: config.limits(),
            host_pid: None,
        }
    }

    /// Stamps records with the pid of the process that spawned the hook.
    pub fn with_host_pid(mut self, pid: Option<u32>) -> Self {
        self.host_pid = pid;
        self
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.log
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn record(&self, input: &HookInput, now: DateTime<Utc>) -> Result<Outcome> {
        let Some(event) = input.to_event() else {
            tracing::debug!(
                kind = ?input.kind,
                hook_event_name = ?input.hook_event_name,
                "Ignoring unrecognized or incomplete event"
            );
            return Ok(Outcome::Ignored);
        };
        self.record_event(&event, now)
    }

    pub fn record_event(&self, event: &HookEvent, now: DateTime<Utc>) -> Result<Outcome> {
        let record = AuditRecord::from_event(event, self.limits, now).with_host_pid(self.host_pid);
        let appended = self.log.append(&record);
        if let Err(err) = &appended {
            tracing::warn!(error = %err, event = ?event.kind(), "Audit append failed");
        }

        // Registry transitions run even when the append failed.
        let registry = match event {
            HookEvent::ToolInvocation { .. } => None,
            HookEvent::SessionStart {
                session_id,
                session_type,
            } => Some(
                self.registry
                    .register(ActiveSession::new(session_id, session_type, now))?,
            ),
            HookEvent::SessionStop { session_id, .. } => {
                Some(self.registry.unregister(session_id)?)
            }
        };

        appended?;
        Ok(Outcome::Recorded {
            kind: event.kind(),
            registry,
        })
    }
}
