use std::path::PathBuf;
use std::time::{Duration as StdDuration, SystemTime};

use blpin_core::guard::{GuardError, SingleInstanceGuard};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_marker(path: &std::path::Path, created_at: OffsetDateTime) {
    let body = serde_json::json!({
        "owner_id": Uuid::new_v4(),
        "pid": 4242,
        "created_at": created_at.format(&time::format_description::well_known::Rfc3339).unwrap(),
    });
    std::fs::write(path, serde_json::to_vec(&body).unwrap()).expect("write marker");
}

#[test]
fn second_acquire_without_release_is_already_running() {
    let dir = unique_temp_dir("blpin-guard-double");
    let _cleanup = CleanupDir(dir.clone());
    let guard = SingleInstanceGuard::new(dir.join("setup.lock"));

    let first = guard.acquire().expect("first acquire");
    let second = guard.acquire();
    assert!(matches!(second, Err(GuardError::AlreadyRunning { .. })), "{second:?}");
    assert!(guard.is_held());
    drop(first);
    assert!(!guard.is_held());
}

#[test]
fn stale_marker_is_replaced() {
    let dir = unique_temp_dir("blpin-guard-stale");
    let _cleanup = CleanupDir(dir.clone());
    let path = dir.join("setup.lock");
    write_marker(&path, OffsetDateTime::now_utc() - Duration::hours(25));

    let guard = SingleInstanceGuard::new(&path);
    assert!(!guard.is_held());
    let mut held = guard.acquire().expect("stale marker should be taken over");
    assert!(path.exists());
    assert!(guard.is_held());
    held.release();
    assert!(!path.exists());
}

#[test]
fn fresh_foreign_marker_blocks_acquire() {
    let dir = unique_temp_dir("blpin-guard-fresh");
    let _cleanup = CleanupDir(dir.clone());
    let path = dir.join("setup.lock");
    write_marker(&path, OffsetDateTime::now_utc() - Duration::hours(23));

    let guard = SingleInstanceGuard::new(&path);
    assert!(matches!(guard.acquire(), Err(GuardError::AlreadyRunning { .. })));
    assert!(path.exists(), "foreign marker must be left in place");
}

#[test]
fn acquire_release_acquire_leaves_no_residue() {
    let dir = unique_temp_dir("blpin-guard-roundtrip");
    let _cleanup = CleanupDir(dir.clone());
    let guard = SingleInstanceGuard::new(dir.join("nested").join("setup.lock"));

    for _ in 0..3 {
        let mut held = guard.acquire().expect("acquire");
        held.release();
        held.release();
        assert!(held.is_released());
        assert!(!guard.path().exists());
    }
}

#[test]
fn release_does_not_remove_a_successor_marker() {
    let dir = unique_temp_dir("blpin-guard-successor");
    let _cleanup = CleanupDir(dir.clone());
    let guard = SingleInstanceGuard::new(dir.join("setup.lock"));

    let mut old = guard.acquire().expect("acquire");
    let later = OffsetDateTime::now_utc() + Duration::hours(25);
    let successor = guard.acquire_at(later).expect("takeover after staleness");

    old.release();
    assert!(guard.path().exists(), "successor marker must survive");
    drop(successor);
    assert!(!guard.path().exists());
}

#[test]
fn unreadable_marker_uses_file_age() {
    let dir = unique_temp_dir("blpin-guard-corrupt");
    let _cleanup = CleanupDir(dir.clone());
    let path = dir.join("setup.lock");
    std::fs::write(&path, b"not json").unwrap();

    let guard = SingleInstanceGuard::new(&path);
    assert!(matches!(guard.acquire(), Err(GuardError::AlreadyRunning { .. })));

    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() - StdDuration::from_secs(25 * 3600))
        .unwrap();
    drop(file);
    let held = guard.acquire().expect("old unreadable marker counts as stale");
    drop(held);
    assert!(!path.exists());
}

#[test]
fn marker_dated_in_the_future_does_not_block() {
    let dir = unique_temp_dir("blpin-guard-future");
    let _cleanup = CleanupDir(dir.clone());
    let path = dir.join("setup.lock");
    write_marker(&path, OffsetDateTime::now_utc() + Duration::days(30));

    let guard = SingleInstanceGuard::new(&path);
    assert!(!guard.is_held());
    let held = guard
        .acquire_at(OffsetDateTime::now_utc() + Duration::hours(25))
        .expect("future-dated marker counts as stale");
    drop(held);
    assert!(!path.exists());

    write_marker(&path, OffsetDateTime::now_utc() + Duration::minutes(5));
    let held = guard.acquire().expect("marker from a clock running ahead");
    assert!(guard.is_held());
    drop(held);
}

struct CleanupDir(PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
