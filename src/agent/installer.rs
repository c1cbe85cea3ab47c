//! Firmware image installation
//!
//! Writes a completed download to the install directory, marks it
//! executable, and can launch the installed image as the successor
//! process during shutdown.

use super::state::DownloadSession;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Installation and handoff errors
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Failed to write firmware image to {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to mark firmware image {path:?} executable")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch successor process {path:?}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes completed firmware images into the install directory
pub struct Installer {
    install_dir: PathBuf,
}

impl Installer {
    pub fn new<P: Into<PathBuf>>(install_dir: P) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    /// Write the downloaded image to disk and mark it executable.
    ///
    /// The file name is the target identity (`{title}-{version}`), so an
    /// operator can tell installed versions apart at a glance.
    pub async fn install(&self, session: &DownloadSession) -> Result<PathBuf, InstallError> {
        let path = self.install_dir.join(session.target_identity());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| InstallError::Write {
                    path: path.clone(),
                    source,
                })?;
        }

        tokio::fs::write(&path, &session.buffer)
            .await
            .map_err(|source| InstallError::Write {
                path: path.clone(),
                source,
            })?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| InstallError::Permissions {
                path: path.clone(),
                source,
            })?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(permissions.mode() | 0o111);
        tokio::fs::set_permissions(&path, permissions)
            .await
            .map_err(|source| InstallError::Permissions {
                path: path.clone(),
                source,
            })?;

        info!(
            path = %path.display(),
            bytes = session.buffer.len(),
            "Firmware image installed"
        );
        Ok(path)
    }
}

/// Spawn the installed image as a detached child process.
///
/// Uses `std::process::Command` so the child is not tied to our runtime
/// and keeps running after this process exits.
pub fn launch_successor(path: &Path) -> Result<u32, InstallError> {
    let child = Command::new(path)
        .spawn()
        .map_err(|source| InstallError::Launch {
            path: path.to_path_buf(),
            source,
        })?;

    let pid = child.id();
    info!(path = %path.display(), pid, "Successor process launched");
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FirmwareDescriptor;
    use tempfile::TempDir;

    fn completed_session(payload: &[u8]) -> DownloadSession {
        let mut session = DownloadSession::new(
            0,
            FirmwareDescriptor {
                title: "fw".to_string(),
                version: "2".to_string(),
                size: payload.len() as u64,
                checksum: "abc123".to_string(),
                checksum_algorithm: "sha256".to_string(),
                tag: "fw 2".to_string(),
            },
        );
        session.buffer.copy_from_slice(payload);
        session.bytes_received = payload.len();
        session
    }

    #[tokio::test]
    async fn test_install_writes_executable_image() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::new(dir.path());
        let session = completed_session(b"#!/bin/sh\nexit 0\n");

        let path = installer.install(&session).await.unwrap();

        assert_eq!(path, dir.path().join("fw-2"));
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, b"#!/bin/sh\nexit 0\n");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[tokio::test]
    async fn test_install_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("images/current");
        let installer = Installer::new(&nested);
        let session = completed_session(b"payload");

        let path = installer.install(&session).await.unwrap();

        assert!(path.starts_with(&nested));
        assert!(path.exists());
    }

    #[test]
    fn test_launch_successor_spawns_child() {
        let pid = launch_successor(Path::new("/bin/true")).unwrap();
        assert!(pid > 0);
    }

    #[test]
    fn test_launch_successor_fails_for_missing_binary() {
        let result = launch_successor(Path::new("/nonexistent/fw-agent"));
        assert!(matches!(result, Err(InstallError::Launch { .. })));
    }
}
