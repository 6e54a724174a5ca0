//! Optional advisory file lock for callers that need to serialize
//! concurrent `run_mutations` calls against the same home directory (e.g.
//! two `poe-code` invocations racing on the same machine). Not wired into
//! the default `run_mutations` path -- the spec leaves single-process
//! cooperative scheduling as the baseline and names this lock as an
//! opt-in hook, mirroring the advisory lock this tool's teacher takes
//! around its own state file before a mutating section.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct LockTimeout {
    pub path: PathBuf,
    pub waited: Duration,
}

impl std::fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timed out after {:?} waiting for lock on {}", self.waited, self.path.display())
    }
}

impl std::error::Error for LockTimeout {}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).write(true).open(path)
}

/// Block (via short sleeps, never a `std::thread` spin loop longer than
/// `POLL_INTERVAL`) until an exclusive advisory lock on `lock_path` is
/// acquired or `timeout` elapses, then run `body`, releasing the lock
/// whether `body` succeeds or fails.
pub fn with_file_lock<T, E>(
    lock_path: &Path,
    timeout: Duration,
    body: impl FnOnce() -> Result<T, E>,
) -> Result<T, LockError<E>> {
    let file = open_lock_file(lock_path).map_err(LockError::Io)?;
    let started = Instant::now();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => break,
            Err(_) if started.elapsed() < timeout => std::thread::sleep(POLL_INTERVAL),
            Err(_) => {
                return Err(LockError::Timeout(LockTimeout {
                    path: lock_path.to_path_buf(),
                    waited: started.elapsed(),
                }));
            }
        }
    }

    let result = body();
    let _ = FileExt::unlock(&file);
    result.map_err(LockError::Body)
}

#[derive(Debug)]
pub enum LockError<E> {
    Io(io::Error),
    Timeout(LockTimeout),
    Body(E),
}

impl<E: std::fmt::Display> std::fmt::Display for LockError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::Io(source) => write!(f, "failed to open lock file: {}", source),
            LockError::Timeout(source) => write!(f, "{}", source),
            LockError::Body(source) => write!(f, "{}", source),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for LockError<E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn runs_body_and_releases_lock() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("poe-code.lock");
        let result: Result<i32, LockError<()>> =
            with_file_lock(&lock_path, Duration::from_secs(1), || Ok(42));
        assert_eq!(result.unwrap(), 42);

        // A second acquisition must succeed promptly now that the first
        // call released its lock.
        let second: Result<i32, LockError<()>> =
            with_file_lock(&lock_path, Duration::from_secs(1), || Ok(7));
        assert_eq!(second.unwrap(), 7);
    }

    #[test]
    fn propagates_the_body_error() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("poe-code.lock");
        let result: Result<i32, LockError<&'static str>> =
            with_file_lock(&lock_path, Duration::from_secs(1), || Err("boom"));
        assert!(matches!(result, Err(LockError::Body("boom"))));
    }

    #[test]
    fn times_out_when_the_lock_is_already_held() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("poe-code.lock");
        let holder = open_lock_file(&lock_path).unwrap();
        holder.lock_exclusive().unwrap();

        let result: Result<(), LockError<()>> =
            with_file_lock(&lock_path, Duration::from_millis(150), || Ok(()));
        assert!(matches!(result, Err(LockError::Timeout(_))));
    }
}
