//! The table of which resource holds the library for which platform.

use serde::{Deserialize, Serialize};

use crate::error::{GuideError, Result};
use crate::platform::PlatformTag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub platform: PlatformTag,
    pub resource: String,
}

/// An ordered list of manifest entries.
///
/// ```
/// use nativeguide::{Manifest, PlatformTag};
///
/// let manifest = Manifest::new()
///     .entry(PlatformTag::Linux32, "/x86/libexample.so")
///     .entry(PlatformTag::Linux64, "/amd64/libexample.so")
///     .entry(PlatformTag::Windows32, "/x86/example.dll")
///     .entry(PlatformTag::Windows64, "/amd64/example.dll");
/// assert_eq!(manifest.for_platform(PlatformTag::Linux64).count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, platform: PlatformTag, resource: impl Into<String>) -> Self {
        self.entries.push(ManifestEntry {
            platform,
            resource: resource.into(),
        });
        self
    }

    /// Parse a JSON array of `{"platform": "...", "resource": "..."}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GuideError::Config(format!("invalid manifest: {}", e)))
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn for_platform(&self, platform: PlatformTag) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(move |e| e.platform == platform)
    }
}
