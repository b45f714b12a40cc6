use std::fs;
use std::path::{Path, PathBuf};

use crate::log_warn;

/// A lock guard that releases the lock file on drop.
#[must_use = "lock is released when LockGuard is dropped"]
pub struct LockGuard {
    lock: fslock::LockFile,
    pid_path: PathBuf,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("pid_path", &self.pid_path).finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.lock.unlock() {
            log_warn!("Warning: Failed to release lock: {}", e);
        }
        if let Err(e) = fs::remove_file(&self.pid_path) {
            log_warn!("Warning: Failed to remove PID file {}: {}", self.pid_path.display(), e);
        }
    }
}

/// Attempts to acquire the single-instance workflow-forge lock.
///
/// Creates `runtime_dir` if it doesn't exist. Acquires the file lock first
/// (atomic mutual exclusion), then writes a PID file for diagnostics. On
/// contention, checks the PID file to provide actionable error messages
/// about the holding process.
///
/// Returns a `LockGuard` that automatically releases on drop.
pub fn try_acquire(runtime_dir: &Path) -> Result<LockGuard, String> {
    fs::create_dir_all(runtime_dir)
        .map_err(|e| format!("Failed to create {}: {}", runtime_dir.display(), e))?;

    let lock_path = runtime_dir.join("workflow-forge.lock");
    let pid_path = runtime_dir.join("workflow-forge.pid");

    let mut lock = fslock::LockFile::open(&lock_path)
        .map_err(|e| format!("Failed to open lock file {}: {}", lock_path.display(), e))?;

    let acquired = lock.try_lock().map_err(|e| format!("Failed to acquire lock: {}", e))?;

    if !acquired {
        let holder_info = fs::read_to_string(&pid_path).ok().and_then(|s| s.trim().parse::<i32>().ok());

        return match holder_info {
            Some(pid) if is_pid_alive(pid) => {
                Err(format!("Another workflow-forge instance is running (PID {})", pid))
            }
            Some(pid) => Err(format!(
                "Lock file is held but recorded PID {} is not alive. \
                 Remove {} and {} to recover",
                pid,
                lock_path.display(),
                pid_path.display()
            )),
            None => Err(format!(
                "Another workflow-forge instance holds the lock. \
                 If this is stale, remove {}",
                lock_path.display()
            )),
        };
    }

    fs::write(&pid_path, std::process::id().to_string())
        .map_err(|e| format!("Failed to write PID file: {}", e))?;

    Ok(LockGuard { lock, pid_path })
}

/// Checks whether `pid` is alive via `/proc/<pid>` (Linux-only, matches the
/// runtime's only supported target).
fn is_pid_alive(pid: i32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        let pid = std::process::id() as i32;
        assert!(is_pid_alive(pid));
    }

    #[test]
    fn nonexistent_pid_is_not_alive() {
        assert!(!is_pid_alive(99_999_999));
    }

    #[test]
    fn acquire_and_release_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let runtime_dir = dir.path().join(".workflow-forge");
        let guard = try_acquire(&runtime_dir).unwrap();
        drop(guard);
        // Released — should be able to reacquire.
        let guard2 = try_acquire(&runtime_dir).unwrap();
        drop(guard2);
    }

    #[test]
    fn contended_lock_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime_dir = dir.path().join(".workflow-forge");
        let _guard = try_acquire(&runtime_dir).unwrap();
        let err = try_acquire(&runtime_dir).unwrap_err();
        assert!(err.contains("running") || err.contains("holds the lock"));
    }
}
