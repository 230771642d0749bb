//! Access to the native library payloads bundled with an application.
//!
//! The packaging layer decides where payloads live; the guide only needs to
//! open one by identifier. Identifiers are archive-relative paths such as
//! `/linux64/libguide.so`; a leading `/` is optional.

mod archive;

use log::debug;
use std::io::{self, Cursor, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

use crate::error::{GuideError, Result};
use crate::runtime::{RealRuntime, Runtime};

pub use archive::{ArchiveKind, ArchiveResources};

/// Opens embedded resources by identifier.
#[cfg_attr(test, mockall::automock)]
pub trait ResourceSource: Send + Sync {
    /// Open a resource for reading.
    ///
    /// Implementations must fail with [`GuideError::ResourceNotFound`] here,
    /// not on the first read, when the resource does not exist.
    fn open(&self, id: &str) -> Result<Box<dyn Read + Send>>;
}

impl<S: ResourceSource + ?Sized> ResourceSource for Box<S> {
    fn open(&self, id: &str) -> Result<Box<dyn Read + Send>> {
        (**self).open(id)
    }
}

/// Strip the optional leading separator and any `./` from an identifier.
pub(crate) fn normalize_id(id: &str) -> String {
    id.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Payloads compiled into the binary, usually with `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct StaticResources {
    entries: Vec<(&'static str, &'static [u8])>,
}

impl StaticResources {
    pub fn new(entries: &[(&'static str, &'static [u8])]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }

    pub fn with(mut self, id: &'static str, bytes: &'static [u8]) -> Self {
        self.entries.push((id, bytes));
        self
    }
}

impl ResourceSource for StaticResources {
    fn open(&self, id: &str) -> Result<Box<dyn Read + Send>> {
        let wanted = normalize_id(id);
        self.entries
            .iter()
            .find(|(entry_id, _)| normalize_id(entry_id) == wanted)
            .map(|(_, bytes)| Box::new(Cursor::new(*bytes)) as Box<dyn Read + Send>)
            .ok_or_else(|| GuideError::ResourceNotFound(id.to_string()))
    }
}

/// Payloads shipped as plain files under a root directory.
pub struct DirResources<R: Runtime = RealRuntime> {
    runtime: R,
    root: PathBuf,
}

impl DirResources<RealRuntime> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_runtime(RealRuntime, root)
    }
}

impl<R: Runtime> DirResources<R> {
    pub fn with_runtime(runtime: R, root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id.trim_start_matches(['/', '\\']));
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        (path != self.root).then_some(path)
    }
}

impl<R: Runtime> ResourceSource for DirResources<R> {
    fn open(&self, id: &str) -> Result<Box<dyn Read + Send>> {
        let path = self
            .resolve(id)
            .filter(|p| self.runtime.is_file(p))
            .ok_or_else(|| GuideError::ResourceNotFound(id.to_string()))?;
        debug!("Opening resource {} at {:?}", id, path);
        self.runtime.open(&path).map_err(|e| {
            match e.downcast_ref::<io::Error>().map(io::Error::kind) {
                // Removed between the probe and the open
                Some(ErrorKind::NotFound) => GuideError::ResourceNotFound(id.to_string()),
                Some(kind) => GuideError::Io(io::Error::new(kind, format!("{:#}", e))),
                None => GuideError::Io(io::Error::other(format!("{:#}", e))),
            }
        })
    }
}
