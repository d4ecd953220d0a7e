//! Per-endpoint uniqueness lock.
//!
//! Exactly one running daemon may exist per endpoint identity. The lock is
//! an advisory exclusive lock (`fs2`) on a named file derived from the
//! endpoint id, acquired at startup and released when the lock guard drops
//! at shutdown. The holder's pid is written into the file for diagnostics.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

/// Errors from lock acquisition.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("endpoint '{0}' already has a running daemon")]
    AlreadyRunning(String),

    #[error("lock I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Path of the lock file for an endpoint.
pub fn lock_path(lock_dir: &Path, endpoint_id: &str) -> PathBuf {
    lock_dir.join(format!("smsgated-{endpoint_id}.lock"))
}

/// Guard holding the exclusive per-endpoint lock.
///
/// Dropping the guard releases the lock and removes the lock file
/// best-effort.
#[derive(Debug)]
pub struct EndpointLock {
    file: File,
    path: PathBuf,
    endpoint_id: String,
}

impl EndpointLock {
    /// Acquire the lock for an endpoint, refusing if another process holds it.
    pub fn acquire(lock_dir: &Path, endpoint_id: &str) -> Result<Self, LockError> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_path(lock_dir, endpoint_id);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(LockError::AlreadyRunning(endpoint_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        // Record our pid for operator diagnostics and `smsgated stop`
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        debug!(endpoint = %endpoint_id, path = %path.display(), "endpoint lock acquired");
        Ok(Self {
            file,
            path,
            endpoint_id: endpoint_id.to_string(),
        })
    }

    /// The endpoint this lock belongs to.
    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    /// Read the pid of the daemon currently holding the lock for an
    /// endpoint, or `None` when no process holds it.
    pub fn holder_pid(lock_dir: &Path, endpoint_id: &str) -> Result<Option<i32>, LockError> {
        let path = lock_path(lock_dir, endpoint_id);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // If we can take the lock ourselves, nobody is running
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = fs2::FileExt::unlock(&file);
                return Ok(None);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e.into()),
        }

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(contents.trim().parse::<i32>().ok())
    }
}

impl Drop for EndpointLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!(endpoint = %self.endpoint_id, error = %e, "failed to release endpoint lock");
        }
        let _ = fs::remove_file(&self.path);
        debug!(endpoint = %self.endpoint_id, "endpoint lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::TempDir::new().unwrap();

        let lock = EndpointLock::acquire(dir.path(), "gw1").unwrap();
        assert_eq!(lock.endpoint_id(), "gw1");
        assert!(lock_path(dir.path(), "gw1").exists());

        drop(lock);
        assert!(!lock_path(dir.path(), "gw1").exists());
    }

    #[test]
    fn test_duplicate_acquire_is_refused() {
        // flock is per open file description, so a second open in the same
        // process conflicts just like a second process would
        let dir = tempfile::TempDir::new().unwrap();

        let first = EndpointLock::acquire(dir.path(), "gw2").unwrap();
        let err = EndpointLock::acquire(dir.path(), "gw2").unwrap_err();
        assert!(matches!(err, LockError::AlreadyRunning(id) if id == "gw2"));

        drop(first);
        let second = EndpointLock::acquire(dir.path(), "gw2").unwrap();
        drop(second);
    }

    #[test]
    fn test_holder_pid_while_held() {
        let dir = tempfile::TempDir::new().unwrap();
        let _lock = EndpointLock::acquire(dir.path(), "gw4").unwrap();

        let pid = EndpointLock::holder_pid(dir.path(), "gw4").unwrap();
        assert_eq!(pid, Some(std::process::id() as i32));
    }

    #[test]
    fn test_distinct_endpoints_do_not_conflict() {
        let dir = tempfile::TempDir::new().unwrap();

        let a = EndpointLock::acquire(dir.path(), "gw-a").unwrap();
        let b = EndpointLock::acquire(dir.path(), "gw-b").unwrap();
        drop(a);
        drop(b);
    }

    #[test]
    fn test_holder_pid_without_lock_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(EndpointLock::holder_pid(dir.path(), "ghost").unwrap(), None);
    }

    #[test]
    fn test_holder_pid_after_release_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock = EndpointLock::acquire(dir.path(), "gw3").unwrap();
        drop(lock);
        assert_eq!(EndpointLock::holder_pid(dir.path(), "gw3").unwrap(), None);
    }
}
