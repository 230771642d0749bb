//! Stage platform-specific native libraries bundled with an application and
//! load the one matching the running host.
//!
//! A program registers every build of its native library, one per platform:
//!
//! ```no_run
//! use nativeguide::{NativeGuide, PlatformTag, DirResources};
//!
//! # fn main() -> nativeguide::Result<()> {
//! let guide = NativeGuide::new(DirResources::new("/opt/app/natives"))?;
//! guide.prepare(PlatformTag::Linux32, "/x86/libexample.so")?;
//! guide.prepare(PlatformTag::Linux64, "/amd64/libexample.so")?;
//! guide.prepare(PlatformTag::Windows32, "/x86/example.dll")?;
//! guide.prepare(PlatformTag::Windows64, "/amd64/example.dll")?;
//! let _library = guide.load_library("example")?;
//! # Ok(())
//! # }
//! ```
//!
//! Entries for other platforms are ignored. The matching one is copied to
//! `<temp>/NativeGuide-<user>/` and can then be loaded by name.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod guide;
pub mod manifest;
pub mod materialize;
pub mod platform;
pub mod resource;
pub mod runtime;
pub mod staging;

pub use config::GuideConfig;
pub use error::{GuideError, Result};
pub use guide::{GuideState, NativeGuide};
pub use manifest::{Manifest, ManifestEntry};
pub use materialize::StagedLibrary;
pub use platform::PlatformTag;
pub use resource::{ArchiveKind, ArchiveResources, DirResources, ResourceSource, StaticResources};
pub use runtime::{NativeLibrary, RealRuntime};

/// The running platform as seen by the process-wide state.
///
/// Unlike [`NativeGuide::new`], a malformed `NATIVEGUIDE_*` setting is not an
/// error here; it is logged and the platform overrides still apply.
pub fn detect() -> PlatformTag {
    detect_in(RealRuntime, GuideState::process())
}

fn detect_in<R: runtime::Runtime>(runtime: R, state: std::sync::Arc<GuideState>) -> PlatformTag {
    let config = GuideConfig::from_env_lenient(&runtime);
    NativeGuide::with_state(runtime, config, StaticResources::default(), state).detect()
}
