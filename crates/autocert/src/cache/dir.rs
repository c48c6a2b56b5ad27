//! Filesystem certificate cache
//!
//! One file per slot, named after the slot's cache name:
//!
//! ```text
//! cache/
//! ├── example.com           # PEM bundle (key + chain)
//! └── example.com+rsa
//! ```
//!
//! Entries are written to a temporary file and renamed into place, so
//! instances sharing the directory never read a half-written bundle.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tenure_common::DomainKey;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace, warn};

use crate::cache::CertCache;
use crate::error::CacheError;

/// Directory-backed cache
#[derive(Debug, Clone)]
pub struct DirCache {
    base_path: PathBuf,
}

impl DirCache {
    /// Open (and create if needed) a cache directory
    ///
    /// The directory is restricted to the owner (0700 on Unix).
    pub fn new(base_path: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(base_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(base_path, fs::Permissions::from_mode(0o700))?;
        }

        info!(cache_path = %base_path.display(), "Initialized certificate cache directory");

        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn entry_path(&self, key: &DomainKey) -> PathBuf {
        self.base_path.join(key.to_string())
    }
}

#[async_trait]
impl CertCache for DirCache {
    async fn get(&self, key: &DomainKey) -> Result<Vec<u8>, CacheError> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(data) => {
                trace!(domain = %key, bytes = data.len(), "Read cached certificate bundle");
                Ok(data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CacheError::Miss),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &DomainKey, data: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let tmp_path = self
            .base_path
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));

        let written = async {
            write_private(&tmp_path, data).await?;
            tokio::fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(
                        path = %tmp_path.display(),
                        error = %cleanup,
                        "Failed to remove temporary cache file"
                    );
                }
            }
            return Err(e.into());
        }

        debug!(domain = %key, path = %path.display(), "Wrote certificate bundle to cache");
        Ok(())
    }

    async fn delete(&self, key: &DomainKey) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => {
                debug!(domain = %key, "Deleted cached certificate bundle");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Create `path` readable by the owner only (0600 on Unix) and fill it
async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}
