//! Cross-process exercises for the reader/writer lock. The PID-liveness
//! probe the own-lock-skip design rests on has no in-process equivalent —
//! two threads in one process always share a pid — so these scenarios
//! re-exec this same test binary as child processes, switched into their
//! role by an environment variable, and check what the parent observes.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use filedb::lock;

const ROLE_ENV: &str = "FILEDB_LOCK_TEST_ROLE";
const PATH_ENV: &str = "FILEDB_LOCK_TEST_PATH";
const COUNTER_ENV: &str = "FILEDB_LOCK_TEST_COUNTER";

fn cache_path(dir: &Path) -> PathBuf {
    dir.join("data")
}

fn respawn_self(test_name: &str) -> Command {
    let exe = env::current_exe().expect("current_exe");
    let mut cmd = Command::new(exe);
    cmd.args(["--exact", test_name, "--nocapture"]);
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd
}

fn role() -> Option<String> {
    env::var(ROLE_ENV).ok()
}

// S5: concurrently reading processes never block one another.
#[test]
fn s5_concurrent_readers_do_not_block_across_processes() {
    if role().as_deref() == Some("reader") {
        let dir = PathBuf::from(env::var(PATH_ENV).unwrap());
        let _guard = lock::read_lock(&cache_path(&dir)).expect("reader must not be blocked");
        thread::sleep(Duration::from_millis(300));
        return;
    }

    let dir = tempfile::tempdir().unwrap();

    let mut children = Vec::new();
    for _ in 0..4 {
        let child = respawn_self("s5_concurrent_readers_do_not_block_across_processes")
            .env(ROLE_ENV, "reader")
            .env(PATH_ENV, dir.path())
            .spawn()
            .expect("spawn reader child");
        children.push(child);
    }

    for mut child in children {
        let status = child.wait().expect("wait for reader child");
        assert!(
            status.success(),
            "a concurrent reader was unexpectedly blocked"
        );
    }
}

// S6: writers exclude every other holder. A shared counter incremented only
// under a write lock, read-modify-sleep-write to widen any race window,
// must land on exactly the number of increments attempted if mutual
// exclusion really held.
#[test]
fn s6_writers_exclude_each_other_across_processes() {
    const WRITERS: u64 = 8;
    const INCREMENTS_PER_WRITER: u64 = 15;

    if role().as_deref() == Some("writer") {
        let dir = PathBuf::from(env::var(PATH_ENV).unwrap());
        let counter_path = PathBuf::from(env::var(COUNTER_ENV).unwrap());

        for _ in 0..INCREMENTS_PER_WRITER {
            let _guard = lock::write_lock(&cache_path(&dir)).expect("writer must acquire lock");
            let current: u64 = fs::read_to_string(&counter_path)
                .unwrap()
                .trim()
                .parse()
                .unwrap();
            thread::sleep(Duration::from_millis(2));
            fs::write(&counter_path, (current + 1).to_string()).unwrap();
        }
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let counter_path = dir.path().join("counter");
    fs::write(&counter_path, "0").unwrap();

    let mut children = Vec::new();
    for _ in 0..WRITERS {
        let child = respawn_self("s6_writers_exclude_each_other_across_processes")
            .env(ROLE_ENV, "writer")
            .env(PATH_ENV, dir.path())
            .env(COUNTER_ENV, &counter_path)
            .spawn()
            .expect("spawn writer child");
        children.push(child);
    }

    for mut child in children {
        let status = child.wait().expect("wait for writer child");
        assert!(status.success(), "a writer child failed to acquire its lock");
    }

    let final_count: u64 = fs::read_to_string(&counter_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(final_count, WRITERS * INCREMENTS_PER_WRITER);
    assert!(
        final_count > 100,
        "test is only meaningful with more than 100 increments"
    );
}

// S7: a lock file left behind by a process that vanished without releasing
// it must be recognized as stale, not block a later acquisition.
#[test]
fn s7_crash_recovery_ignores_a_dead_holders_lock() {
    if role().as_deref() == Some("crasher") {
        let dir = PathBuf::from(env::var(PATH_ENV).unwrap());
        // Acquire the lock, then vanish without running Drop: `exit` skips
        // destructors entirely, leaving the lock file exactly as a real
        // crash would.
        let _guard = lock::write_lock(&cache_path(&dir)).expect("crasher must acquire lock");
        std::process::exit(0);
    }

    let dir = tempfile::tempdir().unwrap();

    let status = respawn_self("s7_crash_recovery_ignores_a_dead_holders_lock")
        .env(ROLE_ENV, "crasher")
        .env(PATH_ENV, dir.path())
        .status()
        .expect("run crasher child");
    assert!(status.success());

    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "expected the crasher's orphaned lock file");

    let _guard = lock::write_lock(&cache_path(dir.path()))
        .expect("a dead holder's lock must not block a live acquisition");
}
