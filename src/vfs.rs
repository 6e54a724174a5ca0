//! Virtual filesystem abstraction: the mutation engine never touches
//! `std::fs` directly, so the same engine logic runs against a real disk or
//! an in-memory fixture in tests.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct VfsError {
    pub path: PathBuf,
    pub kind: VfsErrorKind,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VfsErrorKind {
    NotFound,
    NotADirectory,
    DirectoryNotEmpty,
    Other(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        VfsError { path: path.into(), kind: VfsErrorKind::NotFound }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, VfsErrorKind::NotFound)
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            VfsErrorKind::NotFound => write!(f, "not found: {}", self.path.display()),
            VfsErrorKind::NotADirectory => write!(f, "not a directory: {}", self.path.display()),
            VfsErrorKind::DirectoryNotEmpty => write!(f, "directory not empty: {}", self.path.display()),
            VfsErrorKind::Other(message) => write!(f, "{}: {}", self.path.display(), message),
        }
    }
}

impl Error for VfsError {}

fn map_io_error(path: &Path, err: std::io::Error) -> VfsError {
    let kind = match err.kind() {
        std::io::ErrorKind::NotFound => VfsErrorKind::NotFound,
        _ => VfsErrorKind::Other(err.to_string()),
    };
    VfsError { path: path.to_path_buf(), kind }
}

#[derive(Debug, Clone, Default)]
pub struct Stat {
    pub mode: Option<u32>,
    pub is_dir: bool,
}

/// Minimal async filesystem interface per the spec: `readFile`, `writeFile`,
/// `mkdir`, `unlink`, `rm`, `stat`, `readdir`, `chmod`. Every operation
/// yields (the concurrency model requires a real `.await` suspension point
/// at I/O boundaries, never inside parse/serialize/merge/prune).
#[async_trait::async_trait]
pub trait Vfs: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String, VfsError>;
    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), VfsError>;
    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), VfsError>;
    async fn unlink(&self, path: &Path) -> Result<(), VfsError>;
    async fn rm(&self, path: &Path, recursive: bool) -> Result<(), VfsError>;
    async fn stat(&self, path: &Path) -> Result<Stat, VfsError>;
    async fn readdir(&self, path: &Path) -> Result<Vec<String>, VfsError>;
    async fn chmod(&self, path: &Path, mode: u32) -> Result<(), VfsError>;

    /// `readFile` turned into `None` on ENOENT, per the spec's ENOENT-aware
    /// helper contract.
    async fn try_read_file(&self, path: &Path) -> Result<Option<String>, VfsError> {
        match self.read_file(path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool, VfsError> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Real-disk implementation backed by `tokio::fs`.
pub struct StdFs;

#[async_trait::async_trait]
impl Vfs for StdFs {
    async fn read_file(&self, path: &Path) -> Result<String, VfsError> {
        tokio::fs::read_to_string(path).await.map_err(|err| map_io_error(path, err))
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), VfsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && tokio::fs::metadata(parent).await.is_err() {
                return Err(VfsError::not_found(parent));
            }
        }
        tokio::fs::write(path, contents).await.map_err(|err| map_io_error(path, err))
    }

    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), VfsError> {
        let result = if recursive {
            tokio::fs::create_dir_all(path).await
        } else {
            tokio::fs::create_dir(path).await
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(map_io_error(path, err)),
        }
    }

    async fn unlink(&self, path: &Path) -> Result<(), VfsError> {
        tokio::fs::remove_file(path).await.map_err(|err| map_io_error(path, err))
    }

    async fn rm(&self, path: &Path, recursive: bool) -> Result<(), VfsError> {
        let meta = tokio::fs::metadata(path).await.map_err(|err| map_io_error(path, err))?;
        if meta.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(path).await.map_err(|err| map_io_error(path, err))
            } else {
                tokio::fs::remove_dir(path).await.map_err(|err| map_io_error(path, err))
            }
        } else {
            tokio::fs::remove_file(path).await.map_err(|err| map_io_error(path, err))
        }
    }

    async fn stat(&self, path: &Path) -> Result<Stat, VfsError> {
        let meta = tokio::fs::metadata(path).await.map_err(|err| map_io_error(path, err))?;
        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            Some(meta.permissions().mode() & 0o777)
        };
        #[cfg(not(unix))]
        let mode = None;
        Ok(Stat { mode, is_dir: meta.is_dir() })
    }

    async fn readdir(&self, path: &Path) -> Result<Vec<String>, VfsError> {
        let mut entries = tokio::fs::read_dir(path).await.map_err(|err| map_io_error(path, err))?;
        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
                Ok(None) => break,
                Err(err) => return Err(map_io_error(path, err)),
            }
        }
        Ok(names)
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<(), VfsError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .await
                .map_err(|err| map_io_error(path, err))
        }
        #[cfg(not(unix))]
        {
            let _ = mode;
            Ok(())
        }
    }
}

/// In-memory fixture used by the mutation engine's own test suite and by
/// provider manifest tests, mirroring this codebase's habit of testing
/// subprocess-adjacent logic against recorded fixtures rather than real I/O.
#[derive(Default)]
pub struct MemFs {
    inner: std::sync::Mutex<MemFsState>,
}

#[derive(Default)]
struct MemFsState {
    files: BTreeMap<PathBuf, String>,
    dirs: std::collections::BTreeSet<PathBuf>,
    modes: BTreeMap<PathBuf, u32>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.inner.lock().unwrap().files.insert(path.into(), contents.into());
        self
    }

    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        self.inner.lock().unwrap().dirs.insert(path.into());
        self
    }
}

fn is_under(path: &Path, dir: &Path) -> bool {
    path.parent().map(|parent| parent == dir).unwrap_or(false)
}

#[async_trait::async_trait]
impl Vfs for MemFs {
    async fn read_file(&self, path: &Path) -> Result<String, VfsError> {
        let state = self.inner.lock().unwrap();
        state.files.get(path).cloned().ok_or_else(|| VfsError::not_found(path))
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), VfsError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !state.dirs.contains(parent) && parent != Path::new("/") {
                let parent_known = state.files.keys().any(|f| f.starts_with(parent)) || state.dirs.contains(parent);
                if !parent_known {
                    return Err(VfsError::not_found(parent));
                }
            }
        }
        state.files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn mkdir(&self, path: &Path, _recursive: bool) -> Result<(), VfsError> {
        let mut state = self.inner.lock().unwrap();
        state.dirs.insert(path.to_path_buf());
        Ok(())
    }

    async fn unlink(&self, path: &Path) -> Result<(), VfsError> {
        let mut state = self.inner.lock().unwrap();
        if state.files.remove(path).is_some() {
            state.modes.remove(path);
            Ok(())
        } else {
            Err(VfsError::not_found(path))
        }
    }

    async fn rm(&self, path: &Path, recursive: bool) -> Result<(), VfsError> {
        let mut state = self.inner.lock().unwrap();
        if state.files.remove(path).is_some() {
            return Ok(());
        }
        if state.dirs.remove(path) {
            if recursive {
                let to_remove: Vec<PathBuf> =
                    state.files.keys().filter(|f| f.starts_with(path)).cloned().collect();
                for f in to_remove {
                    state.files.remove(&f);
                }
            }
            return Ok(());
        }
        Err(VfsError::not_found(path))
    }

    async fn stat(&self, path: &Path) -> Result<Stat, VfsError> {
        let state = self.inner.lock().unwrap();
        if state.files.contains_key(path) {
            return Ok(Stat { mode: state.modes.get(path).copied(), is_dir: false });
        }
        if state.dirs.contains(path) {
            return Ok(Stat { mode: None, is_dir: true });
        }
        Err(VfsError::not_found(path))
    }

    async fn readdir(&self, path: &Path) -> Result<Vec<String>, VfsError> {
        let state = self.inner.lock().unwrap();
        if !state.dirs.contains(path) {
            return Err(VfsError::not_found(path));
        }
        let mut names: Vec<String> = state
            .files
            .keys()
            .filter(|f| is_under(f, path))
            .filter_map(|f| f.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<(), VfsError> {
        let mut state = self.inner.lock().unwrap();
        if !state.files.contains_key(path) {
            return Err(VfsError::not_found(path));
        }
        state.modes.insert(path.to_path_buf(), mode);
        Ok(())
    }
}
