//! Platform detection.
//!
//! A [`PlatformTag`] identifies an operating system family together with its
//! word size. Each manifest entry is tagged with one, and only the entry whose
//! tag equals the detected host platform is ever staged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GuideError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformTag {
    Linux32,
    Linux64,
    Windows32,
    Windows64,
    Mac32,
    Mac64,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Bits32,
    Bits64,
}

impl PlatformTag {
    pub const ALL: [PlatformTag; 7] = [
        PlatformTag::Linux32,
        PlatformTag::Linux64,
        PlatformTag::Windows32,
        PlatformTag::Windows64,
        PlatformTag::Mac32,
        PlatformTag::Mac64,
        PlatformTag::Unknown,
    ];

    /// Classify a host from its reported OS name and architecture string.
    ///
    /// The architecture is 64-bit when it contains "64" and 32-bit otherwise.
    /// Unrecognized OS names yield [`PlatformTag::Unknown`] rather than an error.
    pub fn from_os_arch(os_name: &str, arch: &str) -> Self {
        let width = if arch.contains("64") {
            Width::Bits64
        } else {
            Width::Bits32
        };

        match (os_name, width) {
            (os, Width::Bits32) if os.starts_with("Windows") => PlatformTag::Windows32,
            (os, Width::Bits64) if os.starts_with("Windows") => PlatformTag::Windows64,
            ("Linux", Width::Bits32) => PlatformTag::Linux32,
            ("Linux", Width::Bits64) => PlatformTag::Linux64,
            ("Mac OS X", Width::Bits32) => PlatformTag::Mac32,
            ("Mac OS X", Width::Bits64) => PlatformTag::Mac64,
            _ => PlatformTag::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::Linux32 => "linux32",
            PlatformTag::Linux64 => "linux64",
            PlatformTag::Windows32 => "windows32",
            PlatformTag::Windows64 => "windows64",
            PlatformTag::Mac32 => "mac32",
            PlatformTag::Mac64 => "mac64",
            PlatformTag::Unknown => "unknown",
        }
    }

    /// File name this platform's loader expects for a library called `stem`.
    ///
    /// `"guide"` becomes `libguide.so`, `guide.dll` or `libguide.dylib`.
    /// Unknown platforms keep the stem as is.
    pub fn library_file_name(&self, stem: &str) -> String {
        match self {
            PlatformTag::Linux32 | PlatformTag::Linux64 => format!("lib{}.so", stem),
            PlatformTag::Windows32 | PlatformTag::Windows64 => format!("{}.dll", stem),
            PlatformTag::Mac32 | PlatformTag::Mac64 => format!("lib{}.dylib", stem),
            PlatformTag::Unknown => stem.to_string(),
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformTag {
    type Err = GuideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        PlatformTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == lower)
            .ok_or_else(|| GuideError::Config(format!("unknown platform tag '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        let cases = [
            ("Windows 10", "x86", PlatformTag::Windows32),
            ("Windows 10", "x86_64", PlatformTag::Windows64),
            ("Windows", "amd64", PlatformTag::Windows64),
            ("Linux", "i386", PlatformTag::Linux32),
            ("Linux", "x86_64", PlatformTag::Linux64),
            ("Linux", "aarch64", PlatformTag::Linux64),
            ("Mac OS X", "ppc", PlatformTag::Mac32),
            ("Mac OS X", "x86_64", PlatformTag::Mac64),
        ];
        for (os, arch, expected) in cases {
            assert_eq!(
                PlatformTag::from_os_arch(os, arch),
                expected,
                "os={} arch={}",
                os,
                arch
            );
        }
    }

    #[test]
    fn test_unrecognized_os_is_unknown() {
        assert_eq!(PlatformTag::from_os_arch("FreeBSD", "amd64"), PlatformTag::Unknown);
        assert_eq!(PlatformTag::from_os_arch("linux", "x86_64"), PlatformTag::Unknown);
        assert_eq!(PlatformTag::from_os_arch("Linux-gnu", "x86_64"), PlatformTag::Unknown);
        assert_eq!(PlatformTag::from_os_arch("", ""), PlatformTag::Unknown);
    }

    #[test]
    fn test_library_file_name() {
        assert_eq!(PlatformTag::Linux64.library_file_name("guide"), "libguide.so");
        assert_eq!(PlatformTag::Windows32.library_file_name("guide"), "guide.dll");
        assert_eq!(PlatformTag::Mac64.library_file_name("guide"), "libguide.dylib");
        assert_eq!(PlatformTag::Unknown.library_file_name("guide"), "guide");
    }

    #[test]
    fn test_parse_and_display() {
        for tag in PlatformTag::ALL {
            assert_eq!(tag.to_string().parse::<PlatformTag>().unwrap(), tag);
        }
        assert_eq!("Linux64".parse::<PlatformTag>().unwrap(), PlatformTag::Linux64);
        assert!("solaris64".parse::<PlatformTag>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&PlatformTag::Windows64).unwrap();
        assert_eq!(json, "\"windows64\"");
        let tag: PlatformTag = serde_json::from_str("\"mac32\"").unwrap();
        assert_eq!(tag, PlatformTag::Mac32);
    }
}
