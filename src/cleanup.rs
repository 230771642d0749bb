use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Tracks staged files to delete when the process is done with them.
///
/// Deletion is advisory: a file that is already gone, or still mapped by
/// another process, is left alone without reporting an error.
#[derive(Debug, Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for deletion. Registering the same path twice is a no-op.
    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every registered file and forget it.
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Cleaned up {:?}", path),
                Err(e) => debug!("Left {:?} in place: {}", path, e),
            }
        }
    }
}

/// Type alias for shared cleanup context
pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

/// Create a new shared cleanup context
pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Lock a shared context, recovering the data from a poisoned lock.
pub(crate) fn lock(ctx: &SharedCleanupContext) -> MutexGuard<'_, CleanupContext> {
    ctx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// RAII guard that deletes every registered file when dropped.
///
/// Hold it for the lifetime of the program (e.g. in `main`) to get
/// delete-on-exit behavior.
#[must_use = "cleanup runs when the guard is dropped"]
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
}

impl CleanupGuard {
    pub fn new(ctx: SharedCleanupContext) -> Self {
        Self { ctx }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        lock(&self.ctx).cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cleanup_context_add_remove() {
        let mut ctx = CleanupContext::new();
        let path = PathBuf::from("/tmp/NativeGuide-user/libguide.so");

        ctx.add(path.clone());
        ctx.add(path.clone());
        assert_eq!(ctx.paths().len(), 1);

        ctx.remove(&path);
        assert!(ctx.paths().is_empty());
    }

    #[test]
    fn test_cleanup_removes_files() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("libguide.so");
        fs::write(&file_path, "payload").unwrap();

        let mut ctx = CleanupContext::new();
        ctx.add(file_path.clone());

        ctx.cleanup();
        assert!(!file_path.exists());
        assert!(ctx.paths().is_empty());
    }

    #[test]
    fn test_cleanup_ignores_missing_files() {
        let dir = tempdir().unwrap();
        let mut ctx = CleanupContext::new();
        ctx.add(dir.path().join("already-gone.so"));

        // Must not panic
        ctx.cleanup();
        assert!(ctx.paths().is_empty());
    }

    #[test]
    fn test_cleanup_guard_runs_on_drop() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("guide.dll");
        fs::write(&file_path, "payload").unwrap();

        let ctx = new_shared();
        lock(&ctx).add(file_path.clone());

        {
            let _guard = CleanupGuard::new(Arc::clone(&ctx));
            assert!(file_path.exists());
        }

        assert!(!file_path.exists());
        assert!(lock(&ctx).paths().is_empty());
    }
}
