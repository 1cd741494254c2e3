//! tgfs: mount a remote file tree service as a local filesystem.
//!
//! The kernel talks to [`fuse::RemoteFs`], which forwards every callback as one
//! stateless request to a [`client::FileSystemService`].

pub mod attr;
pub mod client;
pub mod config;
pub mod error;
pub mod fuse;
pub mod model;

pub use client::{FileSystemService, HttpFileSystemService};
pub use config::{Args, BackendConfig, Config, MountConfig};
pub use error::{ClientError, ErrorPolicy, FsError};
pub use fuse::RemoteFs;
