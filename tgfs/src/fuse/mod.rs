//! FUSE adapter and request handling
//!
//! This module exposes the remote file tree to the kernel.
//!
//! Main components:
//! - [`RemoteFs`]: the operation dispatcher. One method per filesystem callback, each
//!   validating the minimum it must, issuing its backend round trip and mapping the
//!   result onto an errno via [`FsError`].
//! - `adapter`: the `rfuse3::raw::Filesystem` implementation wiring kernel requests
//!   to `RemoteFs` and building attribute/entry replies.
//! - `inode`: the path/inode table the kernel protocol needs on top of a path-addressed
//!   backend.
//! - `mount`: session setup and teardown.
//!
//! Apart from inode numbers, `RemoteFs` keeps no state between calls: no handle
//! table, no attribute or content cache, no write buffer. Concurrent callbacks are
//! not serialized here.

pub mod adapter;
pub mod inode;
pub mod mount;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::attr::{self, PosixAttributes};
use crate::client::FileSystemService;
use crate::error::{ErrorPolicy, FsError};
use inode::InodeTable;

/// Dispatcher over a remote file tree service.
pub struct RemoteFs<S> {
    service: S,
    policy: ErrorPolicy,
    inodes: InodeTable,
}

impl<S: FileSystemService> RemoteFs<S> {
    pub fn new(service: S, policy: ErrorPolicy) -> Self {
        Self {
            service,
            policy,
            inodes: InodeTable::new(),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn get_attributes(&self, path: &str) -> Result<PosixAttributes, FsError> {
        debug!(path, "getattr");
        let attrs = self
            .service
            .get_attributes(path)
            .await
            .map_err(|e| self.policy.lookup_error(e))?;
        Ok(attr::translate(path, &attrs))
    }

    /// "." and ".." followed by the backend's names, in backend order.
    pub async fn list_directory(&self, path: &str) -> Result<Vec<String>, FsError> {
        debug!(path, "readdir");
        let names = self
            .service
            .list_dir(path)
            .await
            .map_err(|e| self.policy.lookup_error(e))?;
        let mut entries = Vec::with_capacity(names.len() + 2);
        entries.push(".".to_owned());
        entries.push("..".to_owned());
        entries.extend(names);
        Ok(entries)
    }

    pub async fn open(&self, path: &str) -> Result<(), FsError> {
        debug!(path, "open");
        self.get_attributes(path).await?;
        self.service.open_file(path).await.map_err(|e| {
            warn!(path, error = %e, "open marker failed");
            FsError::from(e)
        })
    }

    /// Never fails: the kernel ignores release errors anyway.
    pub async fn release(&self, path: &str) {
        debug!(path, "release");
        if let Err(e) = self.service.release_file(path).await {
            warn!(path, error = %e, "release marker failed");
        }
    }

    /// At most `size` bytes starting at `offset`; empty at or past end of file.
    pub async fn read(&self, path: &str, size: u32, offset: u64) -> Result<Bytes, FsError> {
        debug!(path, size, offset, "read");
        let content = self.service.read_file(path).await.map_err(|e| {
            warn!(path, error = %e, "read failed");
            FsError::from(e)
        })?;
        Ok(clip(content, size, offset))
    }

    /// The backend merges the bytes at `offset`; the whole buffer is accepted.
    pub async fn write(&self, path: &str, data: &[u8], offset: u64) -> Result<u32, FsError> {
        debug!(path, len = data.len(), offset, "write");
        self.service
            .write_file(path, data, offset)
            .await
            .map_err(|e| {
                warn!(path, error = %e, "write failed");
                FsError::from(e)
            })?;
        Ok(data.len() as u32)
    }

    pub async fn create_directory(&self, path: &str) -> Result<(), FsError> {
        debug!(path, "mkdir");
        self.service
            .create_dir(path)
            .await
            .map(drop)
            .map_err(|e| self.policy.create_error(e))
    }

    pub async fn create_file(&self, path: &str) -> Result<(), FsError> {
        debug!(path, "create");
        self.service
            .create_file(path)
            .await
            .map(drop)
            .map_err(|e| self.policy.create_error(e))
    }

    /// Only regular files can be created; anything else never reaches the backend.
    pub async fn create_node(&self, path: &str, mode: u32) -> Result<(), FsError> {
        if (mode & libc::S_IFMT as u32) != libc::S_IFREG as u32 {
            debug!(path, mode, "mknod rejected");
            return Err(FsError::InvalidArgument);
        }
        self.create_file(path).await
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), FsError> {
        debug!(path, "unlink");
        self.service.delete_file(path).await.map_err(|e| {
            warn!(path, error = %e, "unlink failed");
            FsError::from(e)
        })
    }

    pub async fn delete_directory(&self, path: &str) -> Result<(), FsError> {
        debug!(path, "rmdir");
        self.service.delete_dir(path).await.map_err(|e| {
            warn!(path, error = %e, "rmdir failed");
            FsError::from(e)
        })
    }

    pub async fn truncate(&self, path: &str, size: u64) -> Result<(), FsError> {
        debug!(path, size, "truncate");
        self.service.truncate_file(path, size).await.map_err(|e| {
            warn!(path, error = %e, "truncate failed");
            FsError::from(e)
        })
    }

    pub async fn rename(&self, path: &str, target_path: &str) -> Result<(), FsError> {
        debug!(path, target_path, "rename");
        self.service.rename(path, target_path).await.map_err(|e| {
            warn!(path, target_path, error = %e, "rename failed");
            FsError::from(e)
        })
    }

    /// Accepted and not applied.
    pub async fn set_permissions(&self, path: &str, mode: u32) -> Result<(), FsError> {
        debug!(path, mode, "chmod ignored");
        Ok(())
    }

    /// Accepted and not applied.
    pub async fn set_timestamps(&self, path: &str) -> Result<(), FsError> {
        debug!(path, "utimens ignored");
        Ok(())
    }
}

fn clip(content: Bytes, size: u32, offset: u64) -> Bytes {
    let len = content.len() as u64;
    if offset >= len {
        return Bytes::new();
    }
    let end = len.min(offset.saturating_add(u64::from(size)));
    content.slice(offset as usize..end as usize)
}

/// Absolute path of `name` inside `parent`.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
