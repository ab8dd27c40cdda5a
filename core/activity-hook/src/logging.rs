//! Diagnostics for the hook process.
//!
//! Output goes to a daily-rolling file under `<base>/logs/`, never to stdout
//! or stderr, since the host may show either to the user. When the directory
//! can't be created the hook runs without diagnostics. A disabled hook
//! writes nothing, diagnostics included.

use activity_core::config::env_flag;
use activity_core::{hook_disabled, HookPaths};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "ACTIVITY_HOOK_DEBUG";
const FILTER_ENV: &str = "ACTIVITY_HOOK_LOG";

pub fn init() -> Option<WorkerGuard> {
    if hook_disabled() {
        return None;
    }
    let paths = HookPaths::resolve().ok()?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("hook")
        .filename_suffix("log")
        .build(&paths.log_dir)
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}

fn filter() -> EnvFilter {
    if env_flag(DEBUG_ENV) {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}
