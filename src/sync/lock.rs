//! Advisory lock files for sync runs.
//!
//! A lock file names its holder (`pid=<pid> at=<rfc3339>`). The file is
//! written under a temporary name and linked into place, so a lock file
//! never exists without its holder line. A lock whose process is gone, or
//! that is older than [`STALE_AFTER_SECS`], is left over from a crashed run and
//! is taken over.

use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use sysinfo::{Pid, System};

use crate::error::{Error, Result};
use crate::identity::DocumentId;

/// Seconds after which a held lock is considered abandoned.
pub const STALE_AFTER_SECS: i64 = 60 * 60;

static NEXT_TMP: AtomicUsize = AtomicUsize::new(0);

/// Who holds a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHolder {
    /// Process id
    pub pid: u32,
    /// When the lock was taken
    pub at: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            at: Utc::now(),
        }
    }

    /// Parse a `pid=<pid> at=<rfc3339>` line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut pid = None;
        let mut at = None;
        for field in line.split_whitespace() {
            match field.split_once('=') {
                Some(("pid", v)) => pid = v.parse::<u32>().ok(),
                Some(("at", v)) => at = DateTime::parse_from_rfc3339(v).ok().map(|t| t.with_timezone(&Utc)),
                _ => {}
            }
        }
        Some(Self { pid: pid?, at: at? })
    }

    /// Whether the holding process is still running and the lock is recent.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if now - self.at > Duration::seconds(STALE_AFTER_SECS) {
            return false;
        }
        if self.pid == std::process::id() {
            return true;
        }
        let mut system = System::new();
        system.refresh_process(Pid::from_u32(self.pid))
    }
}

/// A held lock file, removed on drop.
#[derive(Debug)]
pub struct SyncLock {
    path: PathBuf,
}

impl SyncLock {
    /// Take the lock file at `path`. Returns `None` when a live run holds it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if Self::link(path)? {
            return Ok(Some(Self::held(path)));
        }

        match fs::read_to_string(path) {
            Ok(content) => {
                let holder = LockHolder::parse(content.trim());
                if let Some(h) = holder.filter(|h| h.is_live(Utc::now())) {
                    log::debug!("{} held by pid {} since {}", path.display(), h.pid, h.at);
                    return Ok(None);
                }
                log::warn!("Taking over stale lock {} ({})", path.display(), content.trim());
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            // released in between
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // another run may win the takeover race
        Ok(Self::link(path)?.then(|| Self::held(path)))
    }

    /// Create `path` holding the current process's line; false when it exists.
    fn link(path: &Path) -> Result<bool> {
        let holder = LockHolder::current();
        let n = NEXT_TMP.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("lock.{}.{}", holder.pid, n));
        fs::write(&tmp, format!("pid={} at={}\n", holder.pid, holder.at.to_rfc3339()))?;
        let linked = fs::hard_link(&tmp, path);
        fs::remove_file(&tmp)?;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn held(path: &Path) -> Self {
        log::debug!("Acquired {}", path.display());
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Lock one document (`<locks>/<id>.lock`), failing with [`Error::Locked`].
    pub fn for_document(locks_dir: impl AsRef<Path>, id: DocumentId) -> Result<Self> {
        let path = locks_dir.as_ref().join(format!("{}.lock", id));
        Self::try_acquire(&path)?.ok_or(Error::Locked(id))
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_fails_until_release() {
        let dir = TempDir::new().unwrap();
        let first = SyncLock::for_document(dir.path(), DocumentId(3)).unwrap();
        assert!(first.path().ends_with("0003.lock"));
        let content = fs::read_to_string(first.path()).unwrap();
        assert_eq!(LockHolder::parse(content.trim()).map(|h| h.pid), Some(std::process::id()));

        let err = SyncLock::for_document(dir.path(), DocumentId(3)).unwrap_err();
        assert!(matches!(err, Error::Locked(DocumentId(3))));
        assert!(SyncLock::for_document(dir.path(), DocumentId(4)).is_ok());

        drop(first);
        assert!(SyncLock::for_document(dir.path(), DocumentId(3)).is_ok());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_leftover_locks_are_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0005.lock");
        let now = Utc::now().to_rfc3339();

        // holder process no longer exists
        fs::write(&path, format!("pid={} at={}\n", u32::MAX - 1, now)).unwrap();
        let lock = SyncLock::for_document(dir.path(), DocumentId(5)).unwrap();
        drop(lock);

        // unreadable holder line
        fs::write(&path, "").unwrap();
        let lock = SyncLock::for_document(dir.path(), DocumentId(5)).unwrap();
        drop(lock);

        // running process, but abandoned long ago
        fs::write(&path, format!("pid={} at=2001-01-01T00:00:00+00:00\n", std::process::id())).unwrap();
        assert!(SyncLock::for_document(dir.path(), DocumentId(5)).is_ok());
    }

    #[test]
    fn test_holder_line_parsing() {
        let holder = LockHolder::parse("pid=42 at=2024-03-01T10:00:00+00:00").unwrap();
        assert_eq!(holder.pid, 42);
        assert!(!holder.is_live(holder.at + Duration::hours(2)));
        assert_eq!(LockHolder::parse("pid=42"), None);
        assert_eq!(LockHolder::parse("garbage"), None);
    }
}
