//! Live configuration file handling
//!
//! A live file is never overwritten by the load-balancer path without a
//! backup taken first. Staged files are assembled next to their template
//! and copied over the live path in one step.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use hapair_core::error::FileError;
use hapair_core::Result;

/// Information about a backed up file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
    /// Original file path
    pub original_path: PathBuf,
    /// Backup file path
    pub backup_path: PathBuf,
    /// File checksum for integrity verification
    pub checksum: String,
    /// File size in bytes
    pub size: u64,
}

/// Backup, staging and commit of configuration files
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Whether `path` exists
    fn exists(&self, path: &Path) -> bool;

    /// Copy `live` to `backup`
    async fn backup(&self, live: &Path, backup: &Path) -> Result<BackupFile>;

    /// Copy `template` to `staging` so it can be appended to
    async fn stage(&self, template: &Path, staging: &Path) -> Result<()>;

    /// Append `text` to the staging file
    ///
    /// Empty text is rejected: it always means an upstream render failed.
    async fn append(&self, staging: &Path, text: &str) -> Result<()>;

    /// Copy the staging file over the live path
    async fn commit(&self, staging: &Path, live: &Path) -> Result<()>;

    /// Overwrite `live` with `content`
    async fn write(&self, live: &Path, content: &str) -> Result<()>;

    /// Copy a verified backup back over its original path
    async fn restore(&self, backup: &BackupFile) -> Result<()>;

    /// Remove a staging file after commit
    async fn discard(&self, staging: &Path);
}

/// Local filesystem implementation of [`ConfigStore`]
#[derive(Debug, Default, Clone)]
pub struct ConfigFileManager;

impl ConfigFileManager {
    /// Create new config file manager
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfigStore for ConfigFileManager {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn backup(&self, live: &Path, backup: &Path) -> Result<BackupFile> {
        let backup_error = |source| FileError::Backup {
            live: live.to_path_buf(),
            backup: backup.to_path_buf(),
            source,
        };

        fs::copy(live, backup).await.map_err(backup_error)?;

        let content = fs::read(backup).await.map_err(backup_error)?;
        let checksum = format!("{:x}", md5::compute(&content));
        let size = content.len() as u64;

        info!("Backed up {:?} to {:?} ({} bytes)", live, backup, size);

        Ok(BackupFile {
            original_path: live.to_path_buf(),
            backup_path: backup.to_path_buf(),
            checksum,
            size,
        })
    }

    async fn stage(&self, template: &Path, staging: &Path) -> Result<()> {
        fs::copy(template, staging)
            .await
            .map_err(|source| FileError::Stage {
                template: template.to_path_buf(),
                staging: staging.to_path_buf(),
                source,
            })?;

        debug!("Staged {:?} at {:?}", template, staging);
        Ok(())
    }

    async fn append(&self, staging: &Path, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(FileError::EmptyContent {
                path: staging.to_path_buf(),
            }
            .into());
        }

        let append_error = |source| FileError::Append {
            path: staging.to_path_buf(),
            source,
        };

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(staging)
            .await
            .map_err(append_error)?;
        file.write_all(text.as_bytes()).await.map_err(append_error)?;
        file.flush().await.map_err(append_error)?;

        Ok(())
    }

    async fn commit(&self, staging: &Path, live: &Path) -> Result<()> {
        fs::copy(staging, live)
            .await
            .map_err(|source| FileError::Commit {
                staging: staging.to_path_buf(),
                live: live.to_path_buf(),
                source,
            })?;

        info!("Committed {:?} to {:?}", staging, live);
        Ok(())
    }

    async fn write(&self, live: &Path, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(FileError::EmptyContent {
                path: live.to_path_buf(),
            }
            .into());
        }

        fs::write(live, content)
            .await
            .map_err(|source| FileError::Write {
                path: live.to_path_buf(),
                source,
            })?;

        info!("Wrote {:?} ({} bytes)", live, content.len());
        Ok(())
    }

    async fn restore(&self, backup: &BackupFile) -> Result<()> {
        let restore_error = |source| FileError::Restore {
            backup: backup.backup_path.clone(),
            live: backup.original_path.clone(),
            source,
        };

        let content = fs::read(&backup.backup_path).await.map_err(restore_error)?;
        let checksum = format!("{:x}", md5::compute(&content));

        if checksum != backup.checksum {
            return Err(FileError::ChecksumMismatch {
                path: backup.backup_path.clone(),
            }
            .into());
        }

        fs::write(&backup.original_path, &content)
            .await
            .map_err(restore_error)?;

        info!(
            "Restored {:?} from {:?}",
            backup.original_path, backup.backup_path
        );
        Ok(())
    }

    async fn discard(&self, staging: &Path) {
        if let Err(e) = fs::remove_file(staging).await {
            warn!("Failed to remove staging file {:?}: {}", staging, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hapair_core::HaError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_backup_records_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let live = temp_dir.path().join("haproxy.cfg");
        let backup = temp_dir.path().join("haproxy.cfg.bk");
        std::fs::write(&live, "global\n").unwrap();

        let files = ConfigFileManager::new();
        let info = files.backup(&live, &backup).await.unwrap();

        assert_eq!(info.size, 7);
        assert_eq!(info.checksum, format!("{:x}", md5::compute(b"global\n")));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "global\n");
    }

    #[tokio::test]
    async fn test_backup_missing_live_file() {
        let temp_dir = TempDir::new().unwrap();
        let files = ConfigFileManager::new();

        let err = files
            .backup(
                &temp_dir.path().join("absent.cfg"),
                &temp_dir.path().join("absent.cfg.bk"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HaError::File(FileError::Backup { .. })));
    }

    #[tokio::test]
    async fn test_stage_and_append() {
        let temp_dir = TempDir::new().unwrap();
        let template = temp_dir.path().join("haproxy.cfg");
        let staging = temp_dir.path().join("haproxy.cfg.u");
        std::fs::write(&template, "backend app\n").unwrap();

        let files = ConfigFileManager::new();
        files.stage(&template, &staging).await.unwrap();
        files
            .append(&staging, "    server a 10.0.0.5:8000\n")
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&staging).unwrap(),
            "backend app\n    server a 10.0.0.5:8000\n"
        );
        assert_eq!(std::fs::read_to_string(&template).unwrap(), "backend app\n");
    }

    #[tokio::test]
    async fn test_append_rejects_empty_text() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("haproxy.cfg.u");
        std::fs::write(&staging, "backend app\n").unwrap();

        let files = ConfigFileManager::new();
        let err = files.append(&staging, "  \n").await.unwrap_err();

        assert!(matches!(err, HaError::File(FileError::EmptyContent { .. })));
        assert_eq!(std::fs::read_to_string(&staging).unwrap(), "backend app\n");
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_live_and_backup_intact() {
        let temp_dir = TempDir::new().unwrap();
        let live = temp_dir.path().join("haproxy.cfg");
        let backup = temp_dir.path().join("haproxy.cfg.bk");
        std::fs::write(&live, "original\n").unwrap();

        let files = ConfigFileManager::new();
        files.backup(&live, &backup).await.unwrap();

        let err = files
            .commit(&temp_dir.path().join("missing.u"), &live)
            .await
            .unwrap_err();

        assert!(matches!(err, HaError::File(FileError::Commit { .. })));
        assert_eq!(std::fs::read_to_string(&live).unwrap(), "original\n");
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "original\n");
    }

    #[tokio::test]
    async fn test_restore_verifies_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let live = temp_dir.path().join("keepalived.conf");
        let backup = temp_dir.path().join("keepalived.conf.bk");
        std::fs::write(&live, "before\n").unwrap();

        let files = ConfigFileManager::new();
        let info = files.backup(&live, &backup).await.unwrap();

        std::fs::write(&live, "broken").unwrap();
        files.restore(&info).await.unwrap();
        assert_eq!(std::fs::read_to_string(&live).unwrap(), "before\n");

        std::fs::write(&backup, "tampered").unwrap();
        let err = files.restore(&info).await.unwrap_err();
        assert!(matches!(err, HaError::File(FileError::ChecksumMismatch { .. })));
    }

    #[tokio::test]
    async fn test_write_and_discard() {
        let temp_dir = TempDir::new().unwrap();
        let live = temp_dir.path().join("keepalived.conf");

        let files = ConfigFileManager::new();
        assert!(files.write(&live, "").await.is_err());
        assert!(!files.exists(&live));

        files.write(&live, "vrrp_instance VI_1 {}\n").await.unwrap();
        assert!(files.exists(&live));

        files.discard(&live).await;
        assert!(!files.exists(&live));
    }
}
