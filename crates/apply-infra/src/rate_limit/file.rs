//! File-lock window store - one JSON file per key under an exclusive lock.
//!
//! Used when no shared cache is available. Increments on the same key are
//! serialized by the OS file lock, so several gateway processes on one host
//! can share counters. Distinct keys use distinct files and never contend.
//!
//! Expired record files are swept from the directory at most once every
//! five minutes. The sweep only removes a file while holding its lock,
//! and an update that finds its file was swept underneath it starts over.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use apply_core::domain::{StoreOutcome, WindowRecord, window_delta};
use apply_core::ports::{Clock, WindowStore, WindowStoreError};

const BACKEND: &str = "file";
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Minimum time between two sweeps of expired record files.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// File-backed fixed-window counters.
pub struct FileWindowStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
    next_sweep: Mutex<DateTime<Utc>>,
}

impl FileWindowStore {
    /// Create the store, creating `dir` if needed.
    pub fn new(
        dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        lock_timeout: Duration,
    ) -> Result<Self, WindowStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::info!(dir = %dir.display(), "Using file window store");

        let next_sweep = Mutex::new(clock.now() + window_delta(SWEEP_INTERVAL));
        Ok(Self {
            dir,
            clock,
            lock_timeout,
            next_sweep,
        })
    }

    /// Claim the sweep if one is due. Only one caller per interval wins.
    fn sweep_due(&self) -> bool {
        let now = self.clock.now();
        let mut next_sweep = self.next_sweep.lock().unwrap_or_else(PoisonError::into_inner);
        if now < *next_sweep {
            return false;
        }
        *next_sweep = now + window_delta(SWEEP_INTERVAL);
        true
    }

    /// Remove every record file whose window has ended.
    async fn sweep_expired(&self) -> usize {
        let dir = self.dir.clone();
        let now = self.clock.now();

        match tokio::task::spawn_blocking(move || sweep_dir(&dir, now)).await {
            Ok(Ok(removed)) => {
                tracing::debug!(removed, "Swept expired rate-limit records");
                removed
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Rate-limit record sweep failed");
                0
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rate-limit record sweep task failed");
                0
            }
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl WindowStore for FileWindowStore {
    async fn increment_and_check(&self, key: &str, limit: u64, window: Duration) -> StoreOutcome {
        if self.sweep_due() {
            self.sweep_expired().await;
        }

        let path = self.path_for(key);
        let clock = self.clock.clone();
        let lock_timeout = self.lock_timeout;

        let task =
            tokio::task::spawn_blocking(move || update_record(&path, clock.as_ref(), window, lock_timeout));

        match task.await {
            Ok(Ok(record)) => StoreOutcome::Decided(record.decide(limit)),
            Ok(Err(e)) => e.into_degraded(BACKEND),
            Err(e) => WindowStoreError::Operation(e.to_string()).into_degraded(BACKEND),
        }
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

/// Read-modify-write one record while holding the file's exclusive lock.
fn update_record(
    path: &Path,
    clock: &dyn Clock,
    window: Duration,
    lock_timeout: Duration,
) -> Result<WindowRecord, WindowStoreError> {
    let mut file = loop {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        lock_exclusive(&file, lock_timeout)?;
        if !is_unlinked(&file, path)? {
            break file;
        }
        // Swept between open and lock; dropping the handle releases the lock.
    };

    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    // A missing, empty or corrupt record counts as absent.
    let current = serde_json::from_str::<WindowRecord>(&contents).ok();

    let record = WindowRecord::advance(current, clock.now(), window);
    let json =
        serde_json::to_vec(&record).map_err(|e| WindowStoreError::Operation(e.to_string()))?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&json)?;
    file.flush()?;
    file.unlock()?;

    Ok(record)
}

/// Remove expired, corrupt and empty record files, skipping locked ones.
fn sweep_dir(dir: &Path, now: DateTime<Utc>) -> Result<usize, WindowStoreError> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        match remove_if_expired(&path, now) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "Skipping record file"),
        }
    }
    Ok(removed)
}

fn remove_if_expired(path: &Path, now: DateTime<Utc>) -> std::io::Result<bool> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    match file.try_lock() {
        Ok(()) => {}
        Err(TryLockError::WouldBlock) => return Ok(false),
        Err(TryLockError::Error(e)) => return Err(e),
    }

    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let expired = serde_json::from_str::<WindowRecord>(&contents)
        .map_or(true, |record| record.is_expired(now));
    if expired {
        std::fs::remove_file(path)?;
    }
    file.unlock()?;

    Ok(expired)
}

/// Whether `path` no longer names the file behind `file`.
#[cfg(unix)]
fn is_unlinked(file: &File, path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(current) => Ok(current.dev() != held.dev() || current.ino() != held.ino()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn is_unlinked(_file: &File, _path: &Path) -> std::io::Result<bool> {
    Ok(false)
}

fn lock_exclusive(file: &File, timeout: Duration) -> Result<(), WindowStoreError> {
    let deadline = Instant::now() + timeout;
    loop {
        match file.try_lock() {
            Ok(()) => return Ok(()),
            Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                std::thread::sleep(LOCK_POLL_INTERVAL);
            }
            Err(TryLockError::WouldBlock) => return Err(WindowStoreError::LockTimeout(timeout)),
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::testing::ManualClock;

    const WINDOW: Duration = Duration::from_secs(60);

    fn store(dir: &Path, clock: Arc<ManualClock>) -> FileWindowStore {
        FileWindowStore::new(dir, clock, Duration::from_secs(5)).unwrap()
    }

    fn count(outcome: StoreOutcome) -> (bool, u64) {
        match outcome {
            StoreOutcome::Decided(decision) => (decision.allowed, decision.count),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_limit_and_window_reset() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let store = store(tmp.path(), clock.clone());

        assert_eq!(count(store.increment_and_check("k", 2, WINDOW).await), (true, 1));
        assert_eq!(count(store.increment_and_check("k", 2, WINDOW).await), (true, 2));
        assert_eq!(count(store.increment_and_check("k", 2, WINDOW).await), (false, 3));

        clock.advance(WINDOW);
        assert_eq!(count(store.increment_and_check("k", 2, WINDOW).await), (true, 1));
    }

    #[tokio::test]
    async fn test_record_is_persisted_as_json() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path(), Arc::new(ManualClock::new()));
        store.increment_and_check("abc123", 5, WINDOW).await;
        store.increment_and_check("abc123", 5, WINDOW).await;

        let raw = std::fs::read_to_string(tmp.path().join("abc123.json")).unwrap();
        let record: WindowRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.count, 2);
        assert!(raw.contains("resetAt"));
    }

    #[tokio::test]
    async fn test_counters_survive_a_new_store_instance() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        store(tmp.path(), clock.clone())
            .increment_and_check("k", 5, WINDOW)
            .await;

        let reopened = store(tmp.path(), clock);
        assert_eq!(count(reopened.increment_and_check("k", 5, WINDOW).await), (true, 2));
    }

    #[tokio::test]
    async fn test_corrupt_record_counts_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("k.json"), b"{not json").unwrap();
        let store = store(tmp.path(), Arc::new(ManualClock::new()));
        assert_eq!(count(store.increment_and_check("k", 5, WINDOW).await), (true, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_lose_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(store(tmp.path(), Arc::new(ManualClock::new())));
        let n = 64;

        let tasks = (0..n).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.increment_and_check("shared", 1_000, WINDOW).await })
        });
        let mut counts: Vec<u64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| count(joined.unwrap()).1)
            .collect();

        counts.sort_unstable();
        assert_eq!(counts, (1..=n).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_unusable_directory_fails_open() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("gone");
        let store = store(&dir, Arc::new(ManualClock::new()));
        std::fs::remove_dir_all(&dir).unwrap();

        let outcome = store.increment_and_check("k", 1, WINDOW).await;
        assert!(outcome.is_allowed());
        assert!(matches!(outcome, StoreOutcome::Degraded { backend: "file", .. }));
    }

    #[test]
    fn test_lock_timeout_is_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("held.json");
        let holder = File::create(&path).unwrap();
        holder.lock().unwrap();

        let clock = ManualClock::new();
        let result = update_record(&path, &clock, WINDOW, Duration::from_millis(50));
        assert!(matches!(result, Err(WindowStoreError::LockTimeout(_))));
    }

    #[tokio::test]
    async fn test_expired_records_are_swept() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let store = store(tmp.path(), clock.clone());

        for i in 0..50 {
            store.increment_and_check(&format!("old-{i}"), 5, WINDOW).await;
        }
        clock.advance(Duration::from_secs(3600));
        for i in 0..10 {
            store.increment_and_check(&format!("new-{i}"), 5, WINDOW).await;
        }

        let files = std::fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(files, 10);
    }

    #[tokio::test]
    async fn test_sweep_waits_for_its_interval() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let store = store(tmp.path(), clock.clone());

        store.increment_and_check("a", 5, WINDOW).await;
        clock.advance(WINDOW * 2);
        store.increment_and_check("b", 5, WINDOW).await;
        assert!(tmp.path().join("a.json").exists());

        clock.advance(SWEEP_INTERVAL);
        store.increment_and_check("c", 5, WINDOW).await;
        assert!(!tmp.path().join("a.json").exists());
        assert!(!tmp.path().join("b.json").exists());
        assert_eq!(count(store.increment_and_check("c", 5, WINDOW).await), (true, 2));
    }

    #[test]
    fn test_sweep_skips_locked_and_live_records() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let stale = serde_json::to_vec(&WindowRecord::open(clock.now(), WINDOW)).unwrap();
        std::fs::write(tmp.path().join("held.json"), &stale).unwrap();
        std::fs::write(tmp.path().join("stale.json"), &stale).unwrap();
        std::fs::write(tmp.path().join("corrupt.json"), b"{not json").unwrap();

        clock.advance(WINDOW * 2);
        let live = serde_json::to_vec(&WindowRecord::open(clock.now(), WINDOW)).unwrap();
        std::fs::write(tmp.path().join("live.json"), &live).unwrap();

        let holder = File::open(tmp.path().join("held.json")).unwrap();
        holder.lock().unwrap();

        assert_eq!(sweep_dir(tmp.path(), clock.now()).unwrap(), 2);
        assert!(tmp.path().join("held.json").exists());
        assert!(tmp.path().join("live.json").exists());
        assert!(!tmp.path().join("stale.json").exists());
        assert!(!tmp.path().join("corrupt.json").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_detects_record_swept_after_open() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("k.json");
        let file = File::create(&path).unwrap();
        assert!(!is_unlinked(&file, &path).unwrap());

        std::fs::remove_file(&path).unwrap();
        assert!(is_unlinked(&file, &path).unwrap());

        File::create(&path).unwrap();
        assert!(is_unlinked(&file, &path).unwrap());
    }
}
