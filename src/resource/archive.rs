use flate2::read::GzDecoder;
use log::debug;
use std::io::{self, Cursor, Read};
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

use super::{ResourceSource, normalize_id};
use crate::error::{GuideError, Result};
use crate::runtime::{RealRuntime, Runtime};

/// Upper bound on the buffer reserved up front from an entry's declared size.
const MAX_PRESIZE: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Guess the archive format from a file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") || name.ends_with(".jar") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }
}

/// Payloads packed inside a bundled archive.
///
/// The archive bytes are held in memory; each `open` decodes the requested
/// entry into its own buffer.
pub struct ArchiveResources {
    kind: ArchiveKind,
    bytes: Vec<u8>,
}

impl ArchiveResources {
    pub fn from_bytes(kind: ArchiveKind, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let resources = Self {
            kind,
            bytes: bytes.into(),
        };
        if kind == ArchiveKind::Zip {
            // Reject a corrupt bundle up front rather than on every lookup
            resources.zip()?;
        }
        Ok(resources)
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open_path_with(&RealRuntime, path)
    }

    /// Read a bundle through `runtime`, picking the format from its extension.
    pub fn open_path_with<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let kind = ArchiveKind::from_path(path).ok_or_else(|| {
            GuideError::Config(format!("Unsupported archive format: {}", path.display()))
        })?;
        debug!("Reading resource bundle {:?}", path);
        let mut file = runtime
            .open(path)
            .map_err(|e| GuideError::Io(io::Error::other(format!("{:#}", e))))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Self::from_bytes(kind, bytes)
    }

    fn zip(&self) -> Result<ZipArchive<Cursor<&[u8]>>> {
        ZipArchive::new(Cursor::new(self.bytes.as_slice())).map_err(zip_error)
    }

    fn read_zip_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut archive = self.zip()?;
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(zip_error(e)),
        };
        if entry.is_dir() {
            return Ok(None);
        }
        let mut buf = Vec::with_capacity(initial_capacity(entry.size()));
        entry.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    fn read_tar_gz_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut archive = tar::Archive::new(GzDecoder::new(self.bytes.as_slice()));
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry.path()?.to_string_lossy().into_owned();
            if normalize_id(&path) == name {
                let mut buf = Vec::with_capacity(initial_capacity(entry.size()));
                entry.read_to_end(&mut buf)?;
                return Ok(Some(buf));
            }
        }
        Ok(None)
    }
}

/// Headers can claim any size, so the declared size only sizes the first
/// allocation up to a cap; `read_to_end` grows past it as needed.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PRESIZE, |size| size.min(MAX_PRESIZE))
}

fn zip_error(e: ZipError) -> GuideError {
    GuideError::Io(io::Error::new(io::ErrorKind::InvalidData, e))
}

impl ResourceSource for ArchiveResources {
    fn open(&self, id: &str) -> Result<Box<dyn Read + Send>> {
        let name = normalize_id(id);
        let found = match self.kind {
            ArchiveKind::Zip => self.read_zip_entry(&name)?,
            ArchiveKind::TarGz => self.read_tar_gz_entry(&name)?,
        };
        found
            .map(|buf| Box::new(Cursor::new(buf)) as Box<dyn Read + Send>)
            .ok_or_else(|| GuideError::ResourceNotFound(id.to_string()))
    }
}
