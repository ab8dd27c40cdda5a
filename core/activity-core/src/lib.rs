//! # activity-core
//!
//! Recording side of the agent lifecycle hooks: an append-only audit log of
//! tool and subagent events, plus a registry of background sessions that are
//! currently running.
//!
//! ## Design Principles
//!
//! - **Synchronous**: each hook invocation is a short-lived process; no async runtime.
//! - **Files are the only shared state**: concurrent hook processes coordinate
//!   through advisory locks, never through memory.
//! - **Graceful degradation**: missing or corrupt files read as empty, not as errors.
//! - **Never blocks the host**: every operation returns a [`Result`] and the
//!   binary decides to drop failures at its boundary.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use activity_core::{HookConfig, HookPaths, Recorder};
//!
//! let paths = HookPaths::resolve()?;
//! let config = HookConfig::load_or_default(&paths.config);
//! let recorder = Recorder::new(&paths.clone().with_overrides(&config), &config);
//! recorder.record(&serde_json::from_str(payload)?, chrono::Utc::now())?;
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod event;
mod lock;
pub mod recorder;
pub mod registry;

pub use audit::{truncate_chars, AuditLog, AuditRecord};
pub use config::{hook_disabled, HookConfig, HookPaths, RecordLimits};
pub use error::{HookError, Result};
pub use event::{EventKind, HookEvent, HookInput, ToolInput};
pub use lock::DEFAULT_LOCK_TIMEOUT;
pub use recorder::{Outcome, Recorder};
pub use registry::{ActiveSession, RegistryChange, SessionRegistry};
