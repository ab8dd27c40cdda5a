//! Bounded acquisition of exclusive advisory file locks.
//!
//! A blocking `flock` would wait on whoever holds the file, including a stalled
//! hook or an unrelated tool, and the host would wait with it. Instead we poll
//! `try_lock_exclusive` with a short exponential backoff and give up once the
//! deadline passes.

use std::fs::File;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{HookError, Result};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

const INITIAL_BACKOFF: Duration = Duration::from_millis(2);
const MAX_BACKOFF: Duration = Duration::from_millis(25);

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Takes an exclusive lock on `file`, waiting at most `timeout`.
///
/// Returns [`HookError::Lock`] when the lock is still held at the deadline.
pub(crate) fn lock_exclusive_within(file: &File, path: &Path, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match fs2::FileExt::try_lock_exclusive(file) {
            Ok(()) => return Ok(()),
            Err(err) if is_contended(&err) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(HookError::Lock {
                        path: path.to_path_buf(),
                        source: io::Error::new(
                            io::ErrorKind::WouldBlock,
                            format!("still held after {}ms", timeout.as_millis()),
                        ),
                    });
                }
                thread::sleep(backoff.min(deadline - now));
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(source) => {
                return Err(HookError::Lock {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}
