//! File-system-mediated reader/writer lock, keyed by a cache entry's
//! directory. This is the subsystem the whole design exists to get right:
//! no kernel `flock` (this must work across hosts sharing only a
//! filesystem), just lock files, a liveness probe, and an own-lock-skip
//! rule that turns "read then write" into a safe in-process upgrade.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{FileDbError, Result};
use crate::tools::pid;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Read,
    Write,
}

impl Role {
    fn token(self) -> &'static str {
        match self {
            Role::Read => "read_lock",
            Role::Write => "write_lock",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: i32,
    pid_create_time: f64,
}

impl LockInfo {
    fn current_process() -> Result<Self> {
        let owner_pid = std::process::id() as i32;
        let pid_create_time = pid::pid_create_time(owner_pid)?;
        Ok(LockInfo {
            pid: owner_pid,
            pid_create_time,
        })
    }

    fn is_own(&self, own: &LockInfo) -> bool {
        self.pid == own.pid && (self.pid_create_time - own.pid_create_time).abs() < f64::EPSILON
    }

    fn is_live(&self) -> bool {
        pid::pid_alive(self.pid) && matches_create_time(self.pid, self.pid_create_time)
    }
}

fn matches_create_time(pid: i32, recorded: f64) -> bool {
    match pid::pid_create_time(pid) {
        Ok(current) => (current - recorded).abs() < 1.0, // tolerate sub-second drift
        Err(_) => false, // process vanished between the alive-check and here
    }
}

fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Write our own lock file for `role` into `directory`, returning its path
/// and the [`LockInfo`] it contains.
fn write_own_lock(directory: &Path, role: Role, own: &LockInfo) -> Result<PathBuf> {
    fs::create_dir_all(directory)?;

    let filename = format!(
        "{}_{}_{}_{}",
        role.token(),
        own.pid,
        own.pid_create_time,
        now_timestamp()
    );
    let path = directory.join(filename);

    let body = serde_json::to_vec(own).map_err(|e| FileDbError::Other(e.into()))?;
    fs::write(&path, body)?;

    Ok(path)
}

/// Enumerate sibling lock files in `directory` whose name starts with one
/// of `prefixes`, excluding `own_path` itself.
fn sibling_locks(directory: &Path, prefixes: &[&str], own_path: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path == own_path {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if prefixes.iter().any(|prefix| name.starts_with(prefix)) {
            found.push(path);
        }
    }

    Ok(found)
}

/// Check every sibling lock in `conflicts` against `own`; on the first
/// live, non-own holder, return `FileLocked`. Siblings whose JSON body is
/// unreadable or malformed (a lock file mid-write) are treated as stale,
/// matching the liveness probe's lazy, best-effort semantics.
fn check_conflicts(cache_path: &Path, conflicts: &[PathBuf], own: &LockInfo) -> Result<()> {
    for lock_path in conflicts {
        let body = match fs::read(lock_path) {
            Ok(body) => body,
            Err(_) => continue, // vanished or unreadable; treat as stale
        };
        let info: LockInfo = match serde_json::from_slice(&body) {
            Ok(info) => info,
            Err(_) => continue,
        };

        if info.is_own(own) {
            continue;
        }

        if info.is_live() {
            return Err(FileDbError::FileLocked {
                pid: info.pid,
                path: cache_path.to_path_buf(),
                lock_path: lock_path.clone(),
            });
        }

        debug!(
            "ignoring stale lock {:?} (pid {} no longer matches recorded creation time)",
            lock_path, info.pid
        );
    }

    Ok(())
}

fn remove_lock_file(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove lock file {:?}: {}", path, err);
        }
    }
}

/// A held read lock on a cache path's directory. Released on drop.
pub struct ReadLockGuard {
    lock_path: PathBuf,
}

impl Drop for ReadLockGuard {
    fn drop(&mut self) {
        remove_lock_file(&self.lock_path);
    }
}

/// A held write lock on a cache path's directory. Released on drop.
pub struct WriteLockGuard {
    lock_path: PathBuf,
}

impl Drop for WriteLockGuard {
    fn drop(&mut self) {
        remove_lock_file(&self.lock_path);
    }
}

/// Acquire a read lock on `cache_path`'s parent directory.
///
/// Multiple concurrent readers are permitted iff no live writer holds the
/// directory. Conflicts only with `write_lock*` siblings; other readers
/// never block each other.
pub fn read_lock(cache_path: &Path) -> Result<ReadLockGuard> {
    let directory = cache_path.parent().ok_or_else(|| {
        FileDbError::InvalidArgument(format!("cache path {:?} has no parent directory", cache_path))
    })?;

    let own = LockInfo::current_process()?;
    let lock_path = write_own_lock(directory, Role::Read, &own)?;

    let conflicts = sibling_locks(directory, &["write_lock"], &lock_path)?;
    if let Err(err) = check_conflicts(cache_path, &conflicts, &own) {
        remove_lock_file(&lock_path);
        return Err(err);
    }

    debug!("acquired read lock {:?}", lock_path);
    Ok(ReadLockGuard { lock_path })
}

/// Acquire a write lock on `cache_path`'s parent directory.
///
/// Excludes all other writers and all readers. A write lock taken while
/// already holding a read lock in the same process (the read-then-write
/// upgrade the façade's read path uses) succeeds, because the own-lock
/// skip rule ignores the outer read lock.
pub fn write_lock(cache_path: &Path) -> Result<WriteLockGuard> {
    let directory = cache_path.parent().ok_or_else(|| {
        FileDbError::InvalidArgument(format!("cache path {:?} has no parent directory", cache_path))
    })?;

    let own = LockInfo::current_process()?;
    let lock_path = write_own_lock(directory, Role::Write, &own)?;

    let conflicts = sibling_locks(directory, &["write_lock", "read_lock"], &lock_path)?;
    if let Err(err) = check_conflicts(cache_path, &conflicts, &own) {
        remove_lock_file(&lock_path);
        return Err(err);
    }

    debug!("acquired write lock {:?}", lock_path);
    Ok(WriteLockGuard { lock_path })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_path_in(dir: &Path) -> PathBuf {
        dir.join("data")
    }

    #[test]
    fn single_process_read_then_write_upgrades() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = cache_path_in(dir.path());

        let read_guard = read_lock(&cache_path).unwrap();
        let write_guard = write_lock(&cache_path).unwrap();
        drop(write_guard);
        drop(read_guard);
    }

    #[test]
    fn multiple_readers_in_one_process_do_not_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = cache_path_in(dir.path());

        let g1 = read_lock(&cache_path).unwrap();
        let g2 = read_lock(&cache_path).unwrap();
        drop(g2);
        drop(g1);
    }

    #[test]
    fn lock_files_are_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = cache_path_in(dir.path());

        {
            let _guard = write_lock(&cache_path).unwrap();
            let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
            assert_eq!(entries.len(), 1);
        }

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 0);
    }

    #[test]
    fn stale_lock_from_a_dead_pid_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = cache_path_in(dir.path());
        fs::create_dir_all(dir.path()).unwrap();

        let stale = LockInfo {
            pid: i32::MAX - 1,
            pid_create_time: 12345.0,
        };
        let stale_path = dir.path().join("write_lock_2147483646_12345_1.0");
        fs::write(&stale_path, serde_json::to_vec(&stale).unwrap()).unwrap();

        // A live reader should proceed despite the stale writer lock.
        let _guard = read_lock(&cache_path).unwrap();
    }

    #[test]
    fn a_live_conflicting_writer_blocks_a_reader() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = cache_path_in(dir.path());
        fs::create_dir_all(dir.path()).unwrap();

        // Simulate another live process (use our own pid/create_time, but
        // a lock file that our own-lock-skip rule won't recognize because
        // pid differs -- use a real but distinct live pid: the test
        // harness's own pid with wrong create_time won't match, so fall
        // back to pid 1 (init), which is always live on a standard Linux
        // host, and whatever create_time /proc reports for it.
        let other_pid = 1;
        let other_create_time = match pid::pid_create_time(other_pid) {
            Ok(t) => t,
            Err(_) => return, // not running as a process that can see pid 1; skip
        };

        let other = LockInfo {
            pid: other_pid,
            pid_create_time: other_create_time,
        };
        let other_path = dir
            .path()
            .join(format!("write_lock_{}_{}_1.0", other_pid, other_create_time));
        fs::write(&other_path, serde_json::to_vec(&other).unwrap()).unwrap();

        let result = read_lock(&cache_path);
        assert!(matches!(result, Err(FileDbError::FileLocked { .. })));
    }
}
