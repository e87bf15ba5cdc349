//! Exclusive-create lockfiles with atomic commit/rollback, grounded on
//! Git's `lockfile.h`: acquire `<path>.lock` with an exclusive create, write
//! the new content, then either atomically rename it over `path` (commit)
//! or delete it (rollback). A lock dropped without either call rolls back.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
    thread,
    time::Duration,
};

use crate::errors::GitError;

const LOCK_SUFFIX: &str = ".lock";

fn registry() -> &'static Mutex<Vec<PathBuf>> {
    static REGISTRY: OnceLock<Mutex<Vec<PathBuf>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

/// Process-wide record of every lockfile currently held, so a caller can
/// roll back outstanding locks from its own shutdown/panic path.
///
/// The C original relies on `atexit(3)` and a signal handler walking a
/// linked list of `struct lock_file`; Rust has no portable signal-safe
/// equivalent, so this crate exposes `drain_all()` for the host to call
/// explicitly instead (documented as a deliberate deviation in DESIGN.md).
pub struct LockRegistry;

impl LockRegistry {
    fn register(path: &Path) {
        registry().lock().unwrap().push(path.to_path_buf());
    }

    fn unregister(path: &Path) {
        let mut guard = registry().lock().unwrap();
        if let Some(pos) = guard.iter().position(|p| p == path) {
            guard.remove(pos);
        }
    }

    /// Remove every lockfile this process still holds.
    pub fn drain_all() {
        let mut guard = registry().lock().unwrap();
        for path in guard.drain(..) {
            let _ = fs::remove_file(&path);
        }
    }
}

/// A held lock on `path`'s `.lock` sibling. `commit()` renames the lockfile
/// over `path`; `rollback()` (or a bare drop) removes it, leaving `path`
/// untouched.
pub struct LockFile {
    lock_path: PathBuf,
    target_path: PathBuf,
    file: Option<File>,
    resolved: bool,
}

impl LockFile {
    /// Try once to acquire the lock.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, GitError> {
        Self::acquire_timeout(path, 0)
    }

    /// Try to acquire the lock, retrying with quadratic backoff for up to
    /// `timeout_ms` milliseconds. `0` tries exactly once; a negative value
    /// retries indefinitely.
    pub fn acquire_timeout(path: impl Into<PathBuf>, timeout_ms: i64) -> Result<Self, GitError> {
        let target_path = path.into();
        let mut lock_name = target_path.as_os_str().to_owned();
        lock_name.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_name);

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(GitError::Io)?;
        }

        let mut waited_ms: i64 = 0;
        let mut backoff_ms: i64 = 1;
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(file) => {
                    LockRegistry::register(&lock_path);
                    return Ok(LockFile {
                        lock_path,
                        target_path,
                        file: Some(file),
                        resolved: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if timeout_ms == 0 || (timeout_ms > 0 && waited_ms >= timeout_ms) {
                        tracing::warn!("giving up on lock {}: already held", lock_path.display());
                        return Err(GitError::Locked(format!(
                            "{} is already locked",
                            lock_path.display()
                        )));
                    }
                    thread::sleep(Duration::from_millis(backoff_ms as u64));
                    waited_ms += backoff_ms;
                    backoff_ms = (backoff_ms * 2).min(1000);
                }
                Err(e) => return Err(GitError::Io(e)),
            }
        }
    }

    /// Write to the still-open lockfile.
    pub fn write_all(&mut self, data: &[u8]) -> Result<(), GitError> {
        self.file
            .as_mut()
            .ok_or_else(|| GitError::Invariant("lockfile already closed".to_string()))?
            .write_all(data)
            .map_err(GitError::Io)
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Close the file and atomically rename the lockfile over its target.
    pub fn commit(mut self) -> Result<(), GitError> {
        self.file.take();
        fs::rename(&self.lock_path, &self.target_path).map_err(GitError::Io)?;
        self.resolved = true;
        LockRegistry::unregister(&self.lock_path);
        Ok(())
    }

    /// Close the file and remove the lockfile, leaving the target alone.
    pub fn rollback(mut self) {
        self.file.take();
        let _ = fs::remove_file(&self.lock_path);
        self.resolved = true;
        LockRegistry::unregister(&self.lock_path);
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.resolved {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
            LockRegistry::unregister(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_renames_lock_over_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("HEAD");

        let mut lock = LockFile::acquire(&target).unwrap();
        lock.write_all(b"ref: refs/heads/main\n").unwrap();
        lock.commit().unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "ref: refs/heads/main\n");
        assert!(!dir.path().join("HEAD.lock").exists());
    }

    #[test]
    fn rollback_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("HEAD");
        fs::write(&target, "ref: refs/heads/old\n").unwrap();

        let mut lock = LockFile::acquire(&target).unwrap();
        lock.write_all(b"ref: refs/heads/new\n").unwrap();
        lock.rollback();

        assert_eq!(fs::read_to_string(&target).unwrap(), "ref: refs/heads/old\n");
        assert!(!dir.path().join("HEAD.lock").exists());
    }

    #[test]
    fn dropped_lock_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("HEAD");
        {
            let mut lock = LockFile::acquire(&target).unwrap();
            lock.write_all(b"ref: refs/heads/main\n").unwrap();
        }
        assert!(!dir.path().join("HEAD.lock").exists());
        assert!(!target.exists());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("HEAD");
        let _lock = LockFile::acquire(&target).unwrap();
        let err = LockFile::acquire(&target).unwrap_err();
        assert!(matches!(err, GitError::Locked(_)));
    }
}
