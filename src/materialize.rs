//! Copies an embedded resource into the staging directory.

use anyhow::Result as AnyResult;
use log::{debug, info, warn};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::cleanup::{self, SharedCleanupContext};
use crate::error::{GuideError, Result};
use crate::resource::ResourceSource;
use crate::runtime::Runtime;

/// A native library written to (or found in) the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedLibrary {
    /// Base file name, shared by every resource id that ends in it.
    pub name: String,
    pub path: PathBuf,
    /// A file was already at `path` before this copy started.
    pub existed: bool,
}

/// Final component of a resource id, ignoring either kind of separator.
pub fn base_name(id: &str) -> Option<&str> {
    id.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

pub struct Materializer<'a, R: Runtime> {
    runtime: &'a R,
    buffer_size: usize,
    cleanup: &'a SharedCleanupContext,
}

impl<'a, R: Runtime> Materializer<'a, R> {
    pub fn new(runtime: &'a R, buffer_size: usize, cleanup: &'a SharedCleanupContext) -> Self {
        Self {
            runtime,
            buffer_size: buffer_size.max(1),
            cleanup,
        }
    }

    /// Copy resource `id` into `staging_dir` under its base name.
    ///
    /// A failed write over a file that was already there is treated as
    /// success: another running instance usually holds that file open, and
    /// its copy is assumed usable. This cannot tell lock contention apart from
    /// a genuinely broken write. Without an earlier file the failure is a
    /// [`GuideError::Copy`] and the partial file is removed.
    #[tracing::instrument(skip(self, resources))]
    pub fn materialize(
        &self,
        resources: &dyn ResourceSource,
        id: &str,
        staging_dir: &Path,
    ) -> Result<StagedLibrary> {
        let name = base_name(id).ok_or_else(|| GuideError::ResourceNotFound(id.to_string()))?;
        let path = staging_dir.join(name);
        let existed = self.runtime.is_file(&path);

        // Opening probes the resource, so a missing one fails before the destination is touched
        let mut input = resources.open(id)?;

        match self.copy(&mut input, &path, name) {
            Ok(bytes) => debug!("Staged {} ({} bytes) at {:?}", id, bytes, path),
            Err(e) if existed => info!("{} exists but could not be written: {:#}", name, e),
            Err(e) => {
                if self.runtime.exists(&path) {
                    if let Err(remove_err) = self.runtime.remove_file(&path) {
                        warn!("Could not remove partial file {:?}: {:#}", path, remove_err);
                    }
                }
                return Err(GuideError::Copy {
                    resource: id.to_string(),
                    path,
                    source: e.into(),
                });
            }
        }

        cleanup::lock(self.cleanup).add(path.clone());

        Ok(StagedLibrary {
            name: name.to_string(),
            path,
            existed,
        })
    }

    fn copy(&self, input: &mut dyn Read, path: &Path, name: &str) -> AnyResult<u64> {
        let mut output = self.runtime.create_file(path)?;
        let result = stream(input, &mut output, self.buffer_size);

        if let Err(e) = output.flush() {
            warn!("{} could not close file: {}", name, e);
        }
        drop(output);

        result
    }
}

fn stream(input: &mut dyn Read, output: &mut dyn Write, buffer_size: usize) -> AnyResult<u64> {
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        output.write_all(&buf[..n])?;
        total += n as u64;
    }
}
