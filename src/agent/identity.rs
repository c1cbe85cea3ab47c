//! Identity of the running executable
//!
//! Firmware files are named `{title}-{version}`, and the same string is the
//! comparison key for "are we already running this image". The identity of
//! the current process is its executable's file name.

use std::path::{Path, PathBuf};

/// Executable identity derived from a process image path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableIdentity {
    path: PathBuf,
}

impl ExecutableIdentity {
    /// Identity of the currently running process
    pub fn from_current_process() -> std::io::Result<Self> {
        Ok(ExecutableIdentity {
            path: std::env::current_exe()?,
        })
    }

    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        ExecutableIdentity { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// True when the running image already is the advertised target identity
    pub fn matches(&self, target_identity: &str) -> bool {
        self.file_name()
            .map(|name| name == target_identity)
            .unwrap_or(false)
    }

    /// True when the process runs under a native-loader stub image rather
    /// than an installed firmware file. Stub images never self-update.
    pub fn is_loader_stub(&self) -> bool {
        self.file_name()
            .map(|name| name.ends_with(".exe"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_by_file_name() {
        let identity = ExecutableIdentity::from_path("/opt/device/fw-1");

        assert!(identity.matches("fw-1"));
        assert!(!identity.matches("fw-2"));
        assert!(!identity.matches("w-1"));
    }

    #[test]
    fn test_loader_stub_detection() {
        assert!(ExecutableIdentity::from_path("/opt/device/launcher.exe").is_loader_stub());
        assert!(!ExecutableIdentity::from_path("/opt/device/fw-1").is_loader_stub());
    }

    #[test]
    fn test_current_process_has_identity() {
        let identity = ExecutableIdentity::from_current_process().unwrap();
        assert!(identity.path().is_absolute());
    }
}
