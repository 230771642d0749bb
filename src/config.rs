use log::{debug, warn};
use std::path::PathBuf;

use crate::error::{GuideError, Result};
use crate::runtime::Runtime;

pub const DEFAULT_PREFIX: &str = "NativeGuide";

/// Size of the copy buffer used when materializing resources.
pub const DEFAULT_BUFFER_SIZE: usize = 10 * 1024;

pub const ENV_PREFIX: &str = "NATIVEGUIDE_PREFIX";
pub const ENV_TMPDIR: &str = "NATIVEGUIDE_TMPDIR";
pub const ENV_BUFFER_SIZE: &str = "NATIVEGUIDE_BUFFER_SIZE";
pub const ENV_OS: &str = "NATIVEGUIDE_OS";
pub const ENV_ARCH: &str = "NATIVEGUIDE_ARCH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideConfig {
    /// Leading part of the staging directory name, `<prefix>-<user>`.
    pub prefix: String,
    /// Parent of the staging directory. The runtime's temp dir when unset.
    pub temp_root: Option<PathBuf>,
    pub buffer_size: usize,
    /// Reported OS name, overriding the runtime's.
    pub os_name: Option<String>,
    /// Reported architecture, overriding the runtime's.
    pub arch: Option<String>,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            temp_root: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            os_name: None,
            arch: None,
        }
    }
}

impl GuideConfig {
    /// Defaults, overridden by any `NATIVEGUIDE_*` variables present in the environment.
    pub fn from_env<R: Runtime>(runtime: &R) -> Result<Self> {
        let mut config = Self::platform_from_env(runtime);
        let var = |key: &str| env_value(runtime, key);

        if let Some(prefix) = var(ENV_PREFIX) {
            if prefix.contains(['/', '\\']) {
                return Err(GuideError::Config(format!(
                    "{} must not contain path separators: '{}'",
                    ENV_PREFIX, prefix
                )));
            }
            config.prefix = prefix;
        }
        if let Some(root) = var(ENV_TMPDIR) {
            debug!("Using staging root {} from {}", root, ENV_TMPDIR);
            config.temp_root = Some(PathBuf::from(root));
        }
        if let Some(size) = var(ENV_BUFFER_SIZE) {
            config.buffer_size = match size.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(GuideError::Config(format!(
                        "{} must be a positive integer, got '{}'",
                        ENV_BUFFER_SIZE, size
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Like [`from_env`](Self::from_env), but an invalid variable only costs
    /// the settings it affects: the OS and architecture overrides always apply.
    pub fn from_env_lenient<R: Runtime>(runtime: &R) -> Self {
        Self::from_env(runtime).unwrap_or_else(|e| {
            warn!("Ignoring NATIVEGUIDE_* settings other than the platform: {}", e);
            Self::platform_from_env(runtime)
        })
    }

    /// Defaults plus only the `NATIVEGUIDE_OS` and `NATIVEGUIDE_ARCH` overrides.
    fn platform_from_env<R: Runtime>(runtime: &R) -> Self {
        Self {
            os_name: env_value(runtime, ENV_OS),
            arch: env_value(runtime, ENV_ARCH),
            ..Self::default()
        }
    }

    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Report the given OS name and architecture instead of the host's.
    pub fn with_platform(mut self, os_name: impl Into<String>, arch: impl Into<String>) -> Self {
        self.os_name = Some(os_name.into());
        self.arch = Some(arch.into());
        self
    }
}

fn env_value<R: Runtime>(runtime: &R, key: &str) -> Option<String> {
    runtime
        .env_var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
