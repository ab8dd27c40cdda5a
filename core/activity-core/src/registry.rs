//! File-backed registry of active background sessions.
//!
//! Every hook invocation is its own process, so the registry is shared state
//! between processes that have nothing in common but the filesystem. Mutations
//! go through [`SessionRegistry::update`], which:
//!
//! 1. takes an exclusive advisory lock on `<registry>.lock`,
//! 2. reads the current document,
//! 3. applies the transition in memory,
//! 4. writes the new document to a temp file and renames it into place
//!    (skipped when the transition changed nothing),
//! 5. releases the lock.
//!
//! Lock acquisition is bounded; a registry held longer than the timeout makes
//! the transition fail with [`HookError::Lock`] rather than wait.
//!
//! The lock sits on a sidecar file because the rename swaps the registry's
//! inode; a lock on the registry itself would be lost on every write.
//! Readers that don't lock (external tooling, [`SessionRegistry::snapshot`])
//! always see either the old or the new document, never a partial one.
//!
//! # File Format
//!
//! ```json
//! [
//!   { "id": "a1", "type": "sw-engineer", "started_at": "2024-05-01T12:00:00Z" }
//! ]
//! ```
//!
//! Entries whose stop event never arrives stay until an operator prunes them.

use chrono::{DateTime, Utc};
use fs_err as fs;
use fs_err::OpenOptions;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::error::{HookError, Result};
use crate::lock::{lock_exclusive_within, DEFAULT_LOCK_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: String,
    #[serde(rename = "type")]
    pub session_type: String,
    pub started_at: DateTime<Utc>,
}

impl ActiveSession {
    pub fn new(
        id: impl Into<String>,
        session_type: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        ActiveSession {
            id: id.into(),
            session_type: session_type.into(),
            started_at,
        }
    }
}

/// What a register/unregister call did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryChange {
    Added,
    AlreadyPresent,
    Removed,
    NotFound,
}

impl RegistryChange {
    pub fn is_mutation(self) -> bool {
        matches!(self, RegistryChange::Added | RegistryChange::Removed)
    }
}

#[derive(Debug, Clone)]
pub struct SessionRegistry {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        SessionRegistry {
            path,
            lock_path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Sets how long a transition waits for another writer's lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Adds `session` unless an entry with the same id already exists.
    pub fn register(&self, session: ActiveSession) -> Result<RegistryChange> {
        self.update(|sessions| {
            if sessions.iter().any(|s| s.id == session.id) {
                RegistryChange::AlreadyPresent
            } else {
                sessions.push(session);
                RegistryChange::Added
            }
        })
    }

    /// Removes the entry with `id`. Unknown ids are a no-op.
    pub fn unregister(&self, id: &str) -> Result<RegistryChange> {
        if !self.path.exists() {
            return Ok(RegistryChange::NotFound);
        }
        self.update(|sessions| {
            let before = sessions.len();
            sessions.retain(|s| s.id != id);
            if sessions.len() < before {
                RegistryChange::Removed
            } else {
                RegistryChange::NotFound
            }
        })
    }

    /// Drops entries that started before `cutoff` and returns them.
    ///
    /// Only operators call this; the hook itself never expires entries.
    pub fn prune_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ActiveSession>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut pruned = Vec::new();
        self.update(|sessions| {
            let (stale, live): (Vec<_>, Vec<_>) =
                sessions.drain(..).partition(|s| s.started_at < cutoff);
            *sessions = live;
            let change = if stale.is_empty() {
                RegistryChange::NotFound
            } else {
                RegistryChange::Removed
            };
            pruned = stale;
            change
        })?;
        Ok(pruned)
    }

    /// Reads the current set without locking.
    ///
    /// Missing, empty, or corrupt documents read as an empty set.
    pub fn snapshot(&self) -> Result<Vec<ActiveSession>> {
        read_sessions(&self.path)
    }

    /// Runs `transition` against the registry while holding the exclusive lock.
    /// The document is rewritten only when the transition reports a mutation.
    pub fn update<F>(&self, transition: F) -> Result<RegistryChange>
    where
        F: FnOnce(&mut Vec<ActiveSession>) -> RegistryChange,
    {
        let _lock = RegistryLock::acquire(&self.lock_path, self.lock_timeout)?;

        let mut sessions = read_sessions(&self.path)?;
        let change = transition(&mut sessions);

        if change.is_mutation() {
            write_sessions(&self.path, &sessions)?;
        }

        tracing::debug!(
            registry = %self.path.display(),
            change = ?change,
            active = sessions.len(),
            "Registry updated"
        );
        Ok(change)
    }
}

/// Exclusive advisory lock, released when dropped.
struct RegistryLock {
    file: fs::File,
}

impl RegistryLock {
    fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HookError::io("Failed to create registry directory", e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .map_err(|e| HookError::io("Failed to open registry lock", e))?;

        lock_exclusive_within(file.file(), lock_path, timeout)?;
        Ok(RegistryLock { file })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(self.file.file());
    }
}

fn read_sessions(path: &Path) -> Result<Vec<ActiveSession>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HookError::io("Failed to read registry", e)),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Vec<ActiveSession>>(&content) {
        Ok(sessions) => Ok(sessions),
        Err(err) => {
            tracing::warn!(
                error = %err,
                registry = %path.display(),
                "Failed to parse registry, treating as empty"
            );
            Ok(Vec::new())
        }
    }
}

fn write_sessions(path: &Path, sessions: &[ActiveSession]) -> Result<()> {
    let content = serde_json::to_string_pretty(sessions)
        .map_err(|e| HookError::json("Failed to serialize registry", e))?;

    let parent_dir = path.parent().ok_or_else(|| {
        HookError::io(
            "Registry path has no parent directory",
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    let mut temp_file = NamedTempFile::new_in(parent_dir)
        .map_err(|e| HookError::io("Failed to create temp registry file", e))?;
    temp_file
        .write_all(content.as_bytes())
        .and_then(|_| temp_file.flush())
        .map_err(|e| HookError::io("Failed to write temp registry file", e))?;
    temp_file
        .persist(path)
        .map_err(|e| HookError::io("Failed to replace registry file", e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn registry_in(dir: &Path) -> SessionRegistry {
        SessionRegistry::new(dir.join("active-sessions.json"))
    }

    fn session(id: &str) -> ActiveSession {
        ActiveSession::new(id, "sw-engineer", Utc::now())
    }

    #[test]
    fn test_lock_path_is_sidecar() {
        let registry = SessionRegistry::new("/data/active-sessions.json");
        assert_eq!(
            registry.lock_path(),
            Path::new("/data/active-sessions.json.lock")
        );
    }

    #[test]
    fn test_register_is_idempotent() {
        let temp = tempdir().unwrap();
        let registry = registry_in(temp.path());

        assert_eq!(registry.register(session("a1")).unwrap(), RegistryChange::Added);
        assert_eq!(
            registry.register(session("a1")).unwrap(),
            RegistryChange::AlreadyPresent
        );

        let sessions = registry.snapshot().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "a1");
    }

    #[test]
    fn test_duplicate_start_keeps_original_entry() {
        let temp = tempdir().unwrap();
        let registry = registry_in(temp.path());
        let first = ActiveSession::new("a1", "sw-engineer", Utc::now() - Duration::minutes(5));
        registry.register(first.clone()).unwrap();

        registry
            .register(ActiveSession::new("a1", "qa", Utc::now()))
            .unwrap();

        assert_eq!(registry.snapshot().unwrap(), vec![first]);
    }

    #[test]
    fn test_register_then_unregister_leaves_registry_empty() {
        let temp = tempdir().unwrap();
        let registry = registry_in(temp.path());

        registry.register(session("a1")).unwrap();
        assert_eq!(registry.unregister("a1").unwrap(), RegistryChange::Removed);

        assert!(registry.snapshot().unwrap().is_empty());
        let content = fs::read_to_string(registry.path()).unwrap();
        assert_eq!(content.trim(), "[]");
    }

    #[test]
    fn test_unregister_unknown_id_leaves_file_untouched() {
        let temp = tempdir().unwrap();
        let registry = registry_in(temp.path());
        registry.register(session("a1")).unwrap();
        let before = fs::read(registry.path()).unwrap();

        assert_eq!(
            registry.unregister("ghost-id").unwrap(),
            RegistryChange::NotFound
        );

        assert_eq!(fs::read(registry.path()).unwrap(), before);
    }

    #[test]
    fn test_unregister_without_registry_creates_nothing() {
        let temp = tempdir().unwrap();
        let registry = registry_in(temp.path());

        assert_eq!(
            registry.unregister("ghost-id").unwrap(),
            RegistryChange::NotFound
        );
        assert!(!registry.path().exists());
    }

    #[test]
    fn test_register_creates_parent_directory() {
        let temp = tempdir().unwrap();
        let registry = SessionRegistry::new(temp.path().join("state/nested/active.json"));

        registry.register(session("a1")).unwrap();

        assert_eq!(registry.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_registry_reads_as_empty() {
        let temp = tempdir().unwrap();
        let registry = registry_in(temp.path());
        fs::write(registry.path(), "{not an array").unwrap();

        assert!(registry.snapshot().unwrap().is_empty());
        assert_eq!(registry.register(session("a1")).unwrap(), RegistryChange::Added);
        assert_eq!(registry.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_persisted_format_is_an_array_of_records() {
        let temp = tempdir().unwrap();
        let registry = registry_in(temp.path());
        registry.register(session("a1")).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(registry.path()).unwrap()).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["id"], "a1");
        assert_eq!(entries[0]["type"], "sw-engineer");
        assert!(entries[0]["started_at"].is_string());
    }

    #[test]
    fn test_prune_removes_only_old_entries() {
        let temp = tempdir().unwrap();
        let registry = registry_in(temp.path());
        let old = ActiveSession::new("old", "qa", Utc::now() - Duration::hours(3));
        let fresh = ActiveSession::new("fresh", "qa", Utc::now());
        registry.register(old.clone()).unwrap();
        registry.register(fresh.clone()).unwrap();

        let pruned = registry
            .prune_started_before(Utc::now() - Duration::hours(1))
            .unwrap();

        assert_eq!(pruned, vec![old]);
        assert_eq!(registry.snapshot().unwrap(), vec![fresh]);
    }

    #[test]
    fn test_transition_gives_up_when_lock_is_held() {
        let temp = tempdir().unwrap();
        let registry =
            registry_in(temp.path()).with_lock_timeout(std::time::Duration::from_millis(50));
        registry.register(session("a1")).unwrap();
        let before = fs::read(registry.path()).unwrap();

        let holder = std::fs::File::open(registry.lock_path()).unwrap();
        fs2::FileExt::lock_exclusive(&holder).unwrap();

        let started = std::time::Instant::now();
        let result = registry.register(session("a2"));

        assert!(matches!(result, Err(HookError::Lock { .. })));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(fs::read(registry.path()).unwrap(), before);
    }

    #[test]
    fn test_concurrent_registers_lose_no_updates() {
        let temp = tempdir().unwrap();
        let path = Arc::new(temp.path().join("active-sessions.json"));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    // Separate handle per thread, like separate processes.
                    let registry = SessionRegistry::new(path.as_path())
                        .with_lock_timeout(std::time::Duration::from_secs(10));
                    registry.register(session(&format!("agent-{}", i))).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let registry = SessionRegistry::new(path.as_path());
        let mut ids: Vec<_> = registry
            .snapshot()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        ids.sort();
        let mut expected: Vec<_> = (0..16).map(|i| format!("agent-{}", i)).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_concurrent_mixed_transitions_converge() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("active-sessions.json");
        let registry = SessionRegistry::new(&path);
        for i in 0..8 {
            registry.register(session(&format!("stop-{}", i))).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .flat_map(|i| {
                let start_path = path.clone();
                let stop_path = path.clone();
                [
                    thread::spawn(move || {
                        SessionRegistry::new(start_path)
                            .with_lock_timeout(std::time::Duration::from_secs(10))
                            .register(session(&format!("start-{}", i)))
                            .unwrap();
                    }),
                    thread::spawn(move || {
                        SessionRegistry::new(stop_path)
                            .with_lock_timeout(std::time::Duration::from_secs(10))
                            .unregister(&format!("stop-{}", i))
                            .unwrap();
                    }),
                ]
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sessions = registry.snapshot().unwrap();
        assert_eq!(sessions.len(), 8);
        assert!(sessions.iter().all(|s| s.id.starts_with("start-")));
    }
}
