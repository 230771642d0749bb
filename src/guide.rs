//! The loader facade tying detection, staging and materialization together.

use anyhow::anyhow;
use log::{debug, info};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::cleanup::{self, CleanupGuard, SharedCleanupContext};
use crate::config::GuideConfig;
use crate::error::{GuideError, Result};
use crate::manifest::Manifest;
use crate::materialize::{Materializer, StagedLibrary};
use crate::platform::PlatformTag;
use crate::resource::ResourceSource;
use crate::runtime::{NativeLibrary, RealRuntime, Runtime};
use crate::staging::{self, SearchPath};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct Staging {
    dir: Option<PathBuf>,
    search_path: SearchPath,
}

/// Everything computed at most once per process: the detected platform, the
/// staging directory with its search path entry, the libraries loaded so far
/// and the files registered for cleanup.
#[derive(Default)]
pub struct GuideState {
    platform: OnceLock<PlatformTag>,
    staging: Mutex<Staging>,
    loaded: Mutex<HashMap<PathBuf, Arc<NativeLibrary>>>,
    cleanup: SharedCleanupContext,
}

static PROCESS_STATE: OnceLock<Arc<GuideState>> = OnceLock::new();

impl GuideState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state shared by every guide built with [`NativeGuide::new`].
    pub fn process() -> Arc<GuideState> {
        Arc::clone(PROCESS_STATE.get_or_init(|| Arc::new(GuideState::new())))
    }

    fn detect<R: Runtime>(&self, runtime: &R, config: &GuideConfig) -> PlatformTag {
        *self.platform.get_or_init(|| {
            let os_name = config.os_name.clone().unwrap_or_else(|| runtime.os_name());
            let arch = config.arch.clone().unwrap_or_else(|| runtime.arch());
            let tag = PlatformTag::from_os_arch(&os_name, &arch);
            info!("Detected platform {} (os={:?}, arch={:?})", tag, os_name, arch);
            tag
        })
    }
}

/// Stages and loads the native library matching the running platform.
///
/// ```no_run
/// use nativeguide::{NativeGuide, PlatformTag, StaticResources};
///
/// # fn main() -> nativeguide::Result<()> {
/// let resources = StaticResources::new(&[
///     ("/linux64/libexample.so", b"...".as_slice()),
///     ("/windows64/example.dll", b"...".as_slice()),
/// ]);
/// let guide = NativeGuide::new(resources)?;
/// let _cleanup = guide.cleanup_on_drop();
///
/// guide.load(PlatformTag::Linux64, "/linux64/libexample.so")?;
/// guide.load(PlatformTag::Windows64, "/windows64/example.dll")?;
/// # Ok(())
/// # }
/// ```
pub struct NativeGuide<R: Runtime = RealRuntime> {
    runtime: R,
    config: GuideConfig,
    resources: Box<dyn ResourceSource>,
    state: Arc<GuideState>,
}

impl NativeGuide<RealRuntime> {
    /// A guide on the real host, configured from the environment and sharing
    /// the process-wide state.
    pub fn new(resources: impl ResourceSource + 'static) -> Result<Self> {
        let config = GuideConfig::from_env(&RealRuntime)?;
        Ok(Self::with_state(
            RealRuntime,
            config,
            resources,
            GuideState::process(),
        ))
    }
}

impl<R: Runtime> NativeGuide<R> {
    /// A guide with its own state, independent of the process-wide one.
    pub fn with_runtime(
        runtime: R,
        config: GuideConfig,
        resources: impl ResourceSource + 'static,
    ) -> Self {
        Self::with_state(runtime, config, resources, Arc::new(GuideState::new()))
    }

    pub fn with_state(
        runtime: R,
        config: GuideConfig,
        resources: impl ResourceSource + 'static,
        state: Arc<GuideState>,
    ) -> Self {
        Self {
            runtime,
            config,
            resources: Box::new(resources),
            state,
        }
    }

    pub fn config(&self) -> &GuideConfig {
        &self.config
    }

    /// The running platform, computed on first call and fixed afterwards.
    pub fn detect(&self) -> PlatformTag {
        self.state.detect(&self.runtime, &self.config)
    }

    fn is_host(&self, tag: PlatformTag) -> bool {
        let host = self.detect();
        host != PlatformTag::Unknown && host == tag
    }

    /// Create or validate the staging directory and add it to the search path.
    ///
    /// Only the first successful call does any work; later calls return the
    /// recorded path.
    pub fn ensure_staging_dir(&self) -> Result<PathBuf> {
        let mut staging = lock(&self.state.staging);
        if let Some(dir) = &staging.dir {
            return Ok(dir.clone());
        }

        let dir = staging::staging_dir_path(&self.runtime, &self.config);
        staging::establish(&self.runtime, &dir)?;
        if staging.search_path.add(dir.clone()) {
            debug!("Added {:?} to the library search path", dir);
        }
        staging.dir = Some(dir.clone());
        Ok(dir)
    }

    /// Directories consulted by [`NativeGuide::load_library`].
    pub fn search_path(&self) -> Vec<PathBuf> {
        lock(&self.state.staging).search_path.dirs().to_vec()
    }

    /// Copy resource `id` into the staging directory, whatever the platform.
    pub fn materialize(&self, id: &str) -> Result<StagedLibrary> {
        let dir = self.ensure_staging_dir()?;
        Materializer::new(&self.runtime, self.config.buffer_size, &self.state.cleanup)
            .materialize(self.resources.as_ref(), id, &dir)
    }

    /// Stage resource `id` if `tag` is the running platform; otherwise do nothing.
    #[tracing::instrument(skip(self))]
    pub fn prepare(&self, tag: PlatformTag, id: &str) -> Result<Option<StagedLibrary>> {
        if !self.is_host(tag) {
            debug!("Skipping {} for {}", id, tag);
            return Ok(None);
        }
        self.materialize(id).map(Some)
    }

    /// Stage resource `id` and load it if `tag` is the running platform.
    #[tracing::instrument(skip(self))]
    pub fn load(&self, tag: PlatformTag, id: &str) -> Result<Option<Arc<NativeLibrary>>> {
        match self.prepare(tag, id)? {
            Some(staged) => self.load_path(staged.path).map(Some),
            None => Ok(None),
        }
    }

    /// Load a prepared library by name, e.g. `"guide"` for `libguide.so`.
    pub fn load_library(&self, stem: &str) -> Result<Arc<NativeLibrary>> {
        let file_name = self.detect().library_file_name(stem);
        let found = lock(&self.state.staging)
            .search_path
            .find(&self.runtime, &file_name);
        match found {
            Some(path) => self.load_path(path),
            None => Err(GuideError::Load {
                path: PathBuf::from(&file_name),
                source: anyhow!("{} is not in the library search path", file_name).into(),
            }),
        }
    }

    fn load_path(&self, path: PathBuf) -> Result<Arc<NativeLibrary>> {
        let mut loaded = lock(&self.state.loaded);
        if let Some(library) = loaded.get(&path) {
            debug!("{:?} is already loaded", path);
            return Ok(Arc::clone(library));
        }

        let library = self
            .runtime
            .load_library(&path)
            .map_err(|e| GuideError::Load {
                path: path.clone(),
                source: e.into(),
            })?;
        info!("Loaded native library {:?}", path);
        let library = Arc::new(library);
        loaded.insert(path, Arc::clone(&library));
        Ok(library)
    }

    /// Stage every manifest entry for the running platform.
    pub fn prepare_manifest(&self, manifest: &Manifest) -> Result<Vec<StagedLibrary>> {
        let mut staged = Vec::new();
        for entry in manifest.for_platform(self.detect()) {
            if let Some(library) = self.prepare(entry.platform, &entry.resource)? {
                staged.push(library);
            }
        }
        Ok(staged)
    }

    /// Stage and load every manifest entry for the running platform, in order.
    ///
    /// An empty result means the manifest has nothing for this platform.
    pub fn load_manifest(&self, manifest: &Manifest) -> Result<Vec<Arc<NativeLibrary>>> {
        let mut libraries = Vec::new();
        for entry in manifest.for_platform(self.detect()) {
            if let Some(library) = self.load(entry.platform, &entry.resource)? {
                libraries.push(library);
            }
        }
        Ok(libraries)
    }

    /// Files staged so far and not yet cleaned up.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        cleanup::lock(&self.state.cleanup).paths().to_vec()
    }

    /// A guard that deletes the staged files when dropped.
    pub fn cleanup_on_drop(&self) -> CleanupGuard {
        CleanupGuard::new(Arc::clone(&self.state.cleanup))
    }
}
