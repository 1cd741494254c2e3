//! Remote file tree client
//!
//! Submodules:
//! - `http`: reqwest implementation talking to the file tree service.
//! - `memory`: in-process backend used by the dispatcher tests.
//!
//! Every method issues exactly one request and never retries. A method that
//! cannot produce its value returns a tagged [`ClientError`], so callers can
//! tell "not found"/"conflict" apart from an unreachable backend.

pub mod http;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ClientError;
use crate::model::{NodeAttributes, ResponseMessage};

pub use http::HttpFileSystemService;

pub type ClientResult<T> = Result<T, ClientError>;

/// Capabilities of the remote file tree, one method per backend endpoint.
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn get_attributes(&self, path: &str) -> ClientResult<NodeAttributes>;

    /// Creates an empty file; `Conflict` when the path is taken.
    async fn create_file(&self, path: &str) -> ClientResult<ResponseMessage>;

    async fn rename(&self, path: &str, target_path: &str) -> ClientResult<()>;

    async fn truncate_file(&self, path: &str, size: u64) -> ClientResult<()>;

    /// The backend merges `bytes` into the current content at `offset`.
    async fn write_file(&self, path: &str, bytes: &[u8], offset: u64) -> ClientResult<()>;

    /// Whole current content.
    async fn read_file(&self, path: &str) -> ClientResult<Bytes>;

    async fn open_file(&self, path: &str) -> ClientResult<()>;

    async fn release_file(&self, path: &str) -> ClientResult<()>;

    /// Creates a directory; `Conflict` when the path is taken.
    async fn create_dir(&self, path: &str) -> ClientResult<ResponseMessage>;

    /// Entry names in backend order.
    async fn list_dir(&self, path: &str) -> ClientResult<Vec<String>>;

    async fn delete_dir(&self, path: &str) -> ClientResult<()>;

    async fn delete_file(&self, path: &str) -> ClientResult<()>;
}
