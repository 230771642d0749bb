//! Dynamic loading of native libraries.

use anyhow::{Context, Result, anyhow};
use libloading::{Library, Symbol};
use log::debug;
use std::path::{Path, PathBuf};

use super::RealRuntime;

/// A native library mapped into the process.
///
/// The mapping stays alive for as long as this value does.
pub struct NativeLibrary {
    path: PathBuf,
    library: Option<Library>,
}

impl NativeLibrary {
    pub(crate) fn new(path: PathBuf, library: Library) -> Self {
        Self {
            path,
            library: Some(library),
        }
    }

    /// A handle that records a path without a mapped library behind it.
    #[cfg(test)]
    pub(crate) fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            library: None,
        }
    }

    /// Full path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up an exported symbol.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the exported symbol.
    pub unsafe fn get<T>(&self, symbol: &[u8]) -> Result<Symbol<'_, T>> {
        let library = self
            .library
            .as_ref()
            .ok_or_else(|| anyhow!("{:?} is not mapped", self.path))?;
        unsafe { library.get(symbol) }.with_context(|| {
            format!(
                "Missing symbol {} in {:?}",
                String::from_utf8_lossy(symbol),
                self.path
            )
        })
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("mapped", &self.library.is_some())
            .finish()
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn load_library_impl(&self, path: &Path) -> Result<NativeLibrary> {
        debug!("Loading native library {:?}", path);
        // Loading runs the library's initializers; the caller vouches for the file.
        let library = unsafe { Library::new(path) }
            .with_context(|| format!("Failed to load native library {:?}", path))?;
        Ok(NativeLibrary::new(path.to_path_buf(), library))
    }
}
