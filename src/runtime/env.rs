//! Environment and host identification.

use std::env;
use std::path::PathBuf;

use super::RealRuntime;

/// Translate a Rust target OS name into the host naming used for platform detection.
pub(crate) fn host_os_name(target_os: &str) -> String {
    match target_os {
        "linux" => "Linux".to_string(),
        "windows" => "Windows".to_string(),
        "macos" => "Mac OS X".to_string(),
        other => other.to_string(),
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    pub(crate) fn os_name_impl(&self) -> String {
        host_os_name(env::consts::OS)
    }

    pub(crate) fn arch_impl(&self) -> String {
        env::consts::ARCH.to_string()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn temp_dir_impl(&self) -> PathBuf {
        env::temp_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn user_name_impl(&self) -> Option<String> {
        for key in ["USER", "USERNAME"] {
            if let Ok(name) = env::var(key) {
                if !name.trim().is_empty() {
                    return Some(name);
                }
            }
        }

        #[cfg(unix)]
        {
            let uid = nix::unistd::getuid();
            let name = match nix::unistd::User::from_uid(uid) {
                Ok(Some(user)) => user.name,
                _ => uid.as_raw().to_string(),
            };
            return Some(name);
        }

        #[cfg(not(unix))]
        return None;
    }
}
