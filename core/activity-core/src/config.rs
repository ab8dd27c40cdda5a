//! Paths and configuration for the activity hook.
//!
//! Everything lives under one base directory:
//!
//! ```text
//! ~/.claude/activity/            (or $ACTIVITY_HOOK_HOME)
//! ├── activity.jsonl             append-only audit log
//! ├── active-sessions.json       active-session registry
//! ├── active-sessions.json.lock  registry lock (never holds data)
//! ├── config.toml                optional overrides
//! └── logs/                      hook diagnostics
//! ```
//!
//! Config problems never stop the hook: a missing file means defaults, a broken
//! one means defaults plus a warning.

use fs_err as fs;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HookError, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT;

pub const HOME_ENV: &str = "ACTIVITY_HOOK_HOME";
pub const DISABLED_ENV: &str = "ACTIVITY_HOOK_DISABLED";

const DEFAULT_RELATIVE_BASE: &str = ".claude/activity";
const AUDIT_LOG_FILE: &str = "activity.jsonl";
const REGISTRY_FILE: &str = "active-sessions.json";
const CONFIG_FILE: &str = "config.toml";
const LOG_DIR: &str = "logs";

pub const DEFAULT_PROMPT_EXCERPT_CHARS: usize = 500;
pub const DEFAULT_DESCRIPTION_MAX_CHARS: usize = 200;

/// Returns true for the usual "on" spellings of a boolean env var.
pub fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

/// Returns true if `ACTIVITY_HOOK_DISABLED` asks the hook to do nothing.
pub fn hook_disabled() -> bool {
    env_flag(DISABLED_ENV)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookPaths {
    pub base: PathBuf,
    pub audit_log: PathBuf,
    pub registry: PathBuf,
    pub config: PathBuf,
    pub log_dir: PathBuf,
}

impl HookPaths {
    /// Resolves the base directory from `ACTIVITY_HOOK_HOME`, falling back to
    /// `~/.claude/activity`.
    pub fn resolve() -> Result<Self> {
        if let Some(base) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::from_base(PathBuf::from(base)));
        }
        let home = dirs::home_dir().ok_or(HookError::HomeDirNotFound)?;
        Ok(Self::from_base(home.join(DEFAULT_RELATIVE_BASE)))
    }

    pub fn from_base(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        HookPaths {
            audit_log: base.join(AUDIT_LOG_FILE),
            registry: base.join(REGISTRY_FILE),
            config: base.join(CONFIG_FILE),
            log_dir: base.join(LOG_DIR),
            base,
        }
    }

    /// Applies path overrides from the config file.
    pub fn with_overrides(mut self, config: &HookConfig) -> Self {
        if let Some(path) = &config.audit_log {
            self.audit_log = resolve_against(&self.base, path);
        }
        if let Some(path) = &config.registry {
            self.registry = resolve_against(&self.base, path);
        }
        self
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Truncation bounds applied when turning events into audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLimits {
    pub prompt_excerpt_chars: usize,
    pub description_max_chars: usize,
}

impl Default for RecordLimits {
    fn default() -> Self {
        RecordLimits {
            prompt_excerpt_chars: DEFAULT_PROMPT_EXCERPT_CHARS,
            description_max_chars: DEFAULT_DESCRIPTION_MAX_CHARS,
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "prompt_excerpt_chars",
    "description_max_chars",
    "lock_timeout_ms",
    "audit_log",
    "registry",
];

/// Settings read from `config.toml`.
///
/// Unknown keys are logged and ignored so a typo in one entry doesn't throw
/// away the ones that parsed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HookConfig {
    #[serde(default = "default_prompt_excerpt_chars")]
    pub prompt_excerpt_chars: usize,
    #[serde(default = "default_description_max_chars")]
    pub description_max_chars: usize,
    /// How long an append or registry transition waits for another process's lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
    #[serde(default)]
    pub registry: Option<PathBuf>,
}

fn default_prompt_excerpt_chars() -> usize {
    DEFAULT_PROMPT_EXCERPT_CHARS
}

fn default_description_max_chars() -> usize {
    DEFAULT_DESCRIPTION_MAX_CHARS
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

impl Default for HookConfig {
    fn default() -> Self {
        HookConfig {
            prompt_excerpt_chars: DEFAULT_PROMPT_EXCERPT_CHARS,
            description_max_chars: DEFAULT_DESCRIPTION_MAX_CHARS,
            lock_timeout_ms: default_lock_timeout_ms(),
            audit_log: None,
            registry: None,
        }
    }
}

impl HookConfig {
    pub fn limits(&self) -> RecordLimits {
        RecordLimits {
            prompt_excerpt_chars: self.prompt_excerpt_chars,
            description_max_chars: self.description_max_chars,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Reads `config.toml`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(HookConfig::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| HookError::io(format!("Failed to read config {}", path.display()), e))?;
        let table = toml::from_str::<toml::Table>(&content).map_err(|e| HookError::Config {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        for key in table.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
            tracing::warn!(key = %key, config = %path.display(), "Ignoring unknown config key");
        }

        toml::Value::Table(table).try_into::<HookConfig>().map_err(|e| HookError::Config {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    /// Like [`HookConfig::load`], but never fails.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load hook config; using defaults");
                HookConfig::default()
            }
        }
    }
}
