use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Advisory lock errors for per-identifier sync locks.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    IoError(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::IoError(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => {
                write!(
                    f,
                    "{}: lock timed out after {:?} at {}",
                    self.code().code(),
                    waited,
                    path.display()
                )
            }
            Self::IoError(err) => write!(f, "{}: {}", self.code().code(), err),
        }
    }
}

impl std::error::Error for LockError {}

#[derive(Debug)]
struct FileGuard {
    file: File,
    path: PathBuf,
}

impl FileGuard {
    fn acquire_exclusive(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if file.try_lock_exclusive().is_ok() {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    fn release(self) {
        let _ = self.file.unlock();
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// RAII guard making this process the only writer for one identifier.
///
/// Held for a whole reconciliation run. Locks for different identifiers are
/// independent files and never contend.
#[derive(Debug)]
pub struct IdentifierLock {
    guard: FileGuard,
    identifier: String,
}

impl IdentifierLock {
    /// Acquire the exclusive lock for `identifier` under `locks_dir`, waiting
    /// at most `timeout`.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if another holder keeps it past `timeout`.
    pub fn acquire(
        locks_dir: &Path,
        identifier: &str,
        timeout: Duration,
    ) -> Result<Self, LockError> {
        let path = lock_path(locks_dir, identifier);
        Ok(Self {
            guard: FileGuard::acquire_exclusive(&path, timeout)?,
            identifier: identifier.to_string(),
        })
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        self.guard.release();
    }

    /// Return the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Lock file path for `identifier`. Bytes outside `[A-Za-z0-9._-]` are
/// percent-encoded, so distinct identifiers never share a lock file.
#[must_use]
pub fn lock_path(locks_dir: &Path, identifier: &str) -> PathBuf {
    let mut name = String::with_capacity(identifier.len() + 5);
    for byte in identifier.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name.push_str(".lock");
    locks_dir.join(name)
}
