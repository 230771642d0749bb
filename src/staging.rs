//! The per-user staging directory and the in-process library search path.

use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::config::GuideConfig;
use crate::error::{GuideError, Result};
use crate::runtime::Runtime;

/// Replace anything that is not safe in a single path component.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// `<temp-root>/<prefix>-<user>`, deterministic for a given user and config.
pub fn staging_dir_path<R: Runtime>(runtime: &R, config: &GuideConfig) -> PathBuf {
    let root = config
        .temp_root
        .clone()
        .unwrap_or_else(|| runtime.temp_dir());
    let user = runtime.user_name().unwrap_or_default();
    root.join(format!(
        "{}-{}",
        sanitize_component(&config.prefix),
        sanitize_component(&user)
    ))
}

/// Make sure `path` is a directory owned by the current user, creating it if
/// nothing is there.
///
/// New directories are private to their owner. The staging root is usually a
/// shared temp directory, so an existing directory is only reused when the
/// current user owns it; anything else could have been planted to serve
/// libraries this process would then load. Losing a creation race against
/// another process is fine under the same condition.
#[tracing::instrument(skip(runtime))]
pub fn establish<R: Runtime>(runtime: &R, path: &Path) -> Result<()> {
    if runtime.exists(path) {
        if !runtime.is_dir(path) {
            return Err(GuideError::setup(
                path,
                "staging location occupied by non-directory",
            ));
        }
        ensure_owned(runtime, path)?;
        debug!("Reusing staging directory {:?}", path);
        return Ok(());
    }

    match runtime.create_dir(path) {
        Ok(()) => {
            info!("Created staging directory {:?}", path);
            Ok(())
        }
        Err(e) if runtime.is_dir(path) => {
            debug!("Staging directory {:?} appeared concurrently: {:#}", path, e);
            ensure_owned(runtime, path)
        }
        Err(e) => Err(GuideError::setup(path, format!("{:#}", e))),
    }
}

fn ensure_owned<R: Runtime>(runtime: &R, path: &Path) -> Result<()> {
    match runtime.is_owned_by_current_user(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(GuideError::setup(
            path,
            "staging directory owned by another user",
        )),
        Err(e) => Err(GuideError::setup(path, format!("{:#}", e))),
    }
}

/// Directories searched when a library is loaded by name rather than path.
///
/// This lives inside the process; the environment's loader variables are
/// never modified.
#[derive(Debug, Default, Clone)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Append `dir` unless it is already present. Returns whether it was added.
    pub fn add(&mut self, dir: PathBuf) -> bool {
        if self.dirs.contains(&dir) {
            return false;
        }
        self.dirs.push(dir);
        true
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// First directory, in insertion order, holding a file called `file_name`.
    pub fn find<R: Runtime>(&self, runtime: &R, file_name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(file_name))
            .find(|candidate| runtime.is_file(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    fn dir() -> PathBuf {
        PathBuf::from("/tmp/NativeGuide-user")
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("alice"), "alice");
        assert_eq!(sanitize_component("DOMAIN\\bob"), "DOMAIN_bob");
        assert_eq!(sanitize_component("../../etc"), ".._.._etc");
        assert_eq!(sanitize_component(".."), "unknown");
        assert_eq!(sanitize_component("  "), "unknown");
        assert_eq!(sanitize_component("jean pierre"), "jean_pierre");
    }

    #[test]
    fn test_staging_dir_path() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_temp_dir()
            .returning(|| PathBuf::from("/tmp"));
        runtime
            .expect_user_name()
            .returning(|| Some("user".to_string()));

        let path = staging_dir_path(&runtime, &GuideConfig::default());
        assert_eq!(path, PathBuf::from("/tmp/NativeGuide-user"));

        let config = GuideConfig::default()
            .with_prefix("MyApp")
            .with_temp_root("/var/tmp");
        let path = staging_dir_path(&runtime, &config);
        assert_eq!(path, PathBuf::from("/var/tmp/MyApp-user"));
    }

    #[test]
    fn test_staging_dir_path_without_user() {
        let mut runtime = MockRuntime::new();
        runtime.expect_user_name().returning(|| None);

        let config = GuideConfig::default().with_temp_root("/tmp");
        let path = staging_dir_path(&runtime, &config);
        assert_eq!(path, PathBuf::from("/tmp/NativeGuide-unknown"));
    }

    #[test]
    fn test_establish_creates_missing_dir() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().with(eq(dir())).returning(|_| false);
        runtime
            .expect_create_dir()
            .with(eq(dir()))
            .times(1)
            .returning(|_| Ok(()));

        establish(&runtime, &dir()).unwrap();
    }

    #[test]
    fn test_establish_reuses_existing_dir() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime.expect_is_dir().returning(|_| true);
        runtime
            .expect_is_owned_by_current_user()
            .with(eq(dir()))
            .times(1)
            .returning(|_| Ok(true));
        // No create_dir expectation

        establish(&runtime, &dir()).unwrap();
    }

    #[test]
    fn test_establish_rejects_foreign_dir() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime.expect_is_dir().returning(|_| true);
        runtime
            .expect_is_owned_by_current_user()
            .returning(|_| Ok(false));
        runtime.expect_create_dir().never();

        let err = establish(&runtime, &dir()).unwrap_err();
        match err {
            GuideError::Setup { path, reason } => {
                assert_eq!(path, dir());
                assert!(reason.contains("owned by another user"));
            }
            other => panic!("expected setup error, got {:?}", other),
        }
    }

    #[test]
    fn test_establish_ownership_unreadable() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime.expect_is_dir().returning(|_| true);
        runtime
            .expect_is_owned_by_current_user()
            .returning(|_| Err(anyhow::anyhow!("Failed to read metadata")));

        let err = establish(&runtime, &dir()).unwrap_err();
        assert!(matches!(err, GuideError::Setup { .. }));
        assert!(err.to_string().contains("Failed to read metadata"));
    }

    #[test]
    fn test_establish_rejects_regular_file() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime.expect_is_dir().returning(|_| false);

        let err = establish(&runtime, &dir()).unwrap_err();
        match err {
            GuideError::Setup { path, reason } => {
                assert_eq!(path, dir());
                assert!(reason.contains("non-directory"));
            }
            other => panic!("expected setup error, got {:?}", other),
        }
    }

    #[test]
    fn test_establish_tolerates_concurrent_creation() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_create_dir()
            .returning(|_| Err(anyhow::anyhow!("File exists")));
        runtime.expect_is_dir().returning(|_| true);
        runtime
            .expect_is_owned_by_current_user()
            .returning(|_| Ok(true));

        establish(&runtime, &dir()).unwrap();
    }

    #[test]
    fn test_establish_race_won_by_other_user() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_create_dir()
            .returning(|_| Err(anyhow::anyhow!("File exists")));
        runtime.expect_is_dir().returning(|_| true);
        runtime
            .expect_is_owned_by_current_user()
            .returning(|_| Ok(false));

        assert!(matches!(
            establish(&runtime, &dir()),
            Err(GuideError::Setup { .. })
        ));
    }

    #[test]
    fn test_establish_unusable_root() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_create_dir()
            .returning(|_| Err(anyhow::anyhow!("Permission denied")));
        runtime.expect_is_dir().returning(|_| false);

        let err = establish(&runtime, &dir()).unwrap_err();
        assert!(err.to_string().contains("Permission denied"));
    }

    #[test]
    fn test_establish_on_disk() {
        let root = tempdir().unwrap();
        let staging = root.path().join("NativeGuide-user");

        establish(&RealRuntime, &staging).unwrap();
        assert!(staging.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&staging).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }
        establish(&RealRuntime, &staging).unwrap();

        let occupied = root.path().join("NativeGuide-other");
        fs::write(&occupied, b"not a directory").unwrap();
        assert!(matches!(
            establish(&RealRuntime, &occupied),
            Err(GuideError::Setup { .. })
        ));
    }

    #[test]
    fn test_search_path() {
        let root = tempdir().unwrap();
        let first = root.path().join("first");
        let second = root.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(second.join("libguide.so"), b"elf").unwrap();

        let mut search = SearchPath::default();
        assert!(search.add(first.clone()));
        assert!(search.add(second.clone()));
        assert!(!search.add(first.clone()));
        assert_eq!(search.dirs().len(), 2);

        assert_eq!(
            search.find(&RealRuntime, "libguide.so"),
            Some(second.join("libguide.so"))
        );
        assert_eq!(search.find(&RealRuntime, "guide.dll"), None);
    }
}
