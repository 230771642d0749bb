//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the host operations the
//! guide depends on, so platform detection, staging and loading can be driven
//! by a mock in tests.
//!
//! # Structure
//!
//! - `env` - Environment variables and host identification (OS, arch, user, temp root)
//! - `fs` - File system operations (probe, ownership, create, open, remove)
//! - `loader` - Dynamic loading of native libraries

mod env;
mod fs;
mod loader;

use anyhow::Result;
use std::env as std_env;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use loader::NativeLibrary;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    /// Operating system name in host naming ("Linux", "Windows", "Mac OS X", ...).
    fn os_name(&self) -> String;

    /// Architecture identifier ("x86_64", "aarch64", "x86", ...).
    fn arch(&self) -> String;

    fn temp_dir(&self) -> PathBuf;

    /// Name of the user running the process, if it can be determined.
    fn user_name(&self) -> Option<String>;

    // File System
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;

    /// Create a directory readable and writable by its owner only.
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Whether `path` belongs to the user running the process. Always true
    /// where ownership cannot be checked.
    fn is_owned_by_current_user(&self, path: &Path) -> Result<bool>;

    fn create_file(&self, path: &Path) -> Result<Box<dyn Write + Send>>;
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>>;
    fn remove_file(&self, path: &Path) -> Result<()>;

    // Loader
    /// Map the library at `path` into the process.
    fn load_library(&self, path: &Path) -> Result<NativeLibrary>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn os_name(&self) -> String {
        self.os_name_impl()
    }

    fn arch(&self) -> String {
        self.arch_impl()
    }

    fn temp_dir(&self) -> PathBuf {
        self.temp_dir_impl()
    }

    fn user_name(&self) -> Option<String> {
        self.user_name_impl()
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.is_file_impl(path)
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        self.create_dir_impl(path)
    }

    fn is_owned_by_current_user(&self, path: &Path) -> Result<bool> {
        self.is_owned_by_current_user_impl(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        self.create_file_impl(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        self.open_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn load_library(&self, path: &Path) -> Result<NativeLibrary> {
        self.load_library_impl(path)
    }
}
