//! Mount helpers for starting/stopping the FUSE session
//!
//! Notes:
//! - Only supported on Linux. Unprivileged mounts go through fusermount3.
//! - The returned handle resolves when the session ends; call `unmount` to end it.

use std::io;

use rfuse3::MountOptions;
use rfuse3::raw::{MountHandle, Session};
use tracing::info;

use super::RemoteFs;
use crate::client::FileSystemService;
use crate::config::MountConfig;

/// Mount options for a session owned by the calling user.
pub fn mount_options(config: &MountConfig) -> MountOptions {
    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };

    let mut options = MountOptions::default();
    options.fs_name(config.fs_name.as_str()).uid(uid).gid(gid);
    if config.allow_other {
        options.allow_other(true);
    }
    options
}

/// Mount `fs` on `config.mountpoint` and serve it in the background.
#[cfg(target_os = "linux")]
pub async fn mount<S>(fs: RemoteFs<S>, config: &MountConfig) -> io::Result<MountHandle>
where
    S: FileSystemService + 'static,
{
    let session = Session::new(mount_options(config));
    info!(
        mountpoint = %config.mountpoint.display(),
        privileged = config.privileged,
        "mounting"
    );
    if config.privileged {
        session.mount(fs, &config.mountpoint).await
    } else {
        session.mount_with_unprivileged(fs, &config.mountpoint).await
    }
}

/// Fallback for non-Linux targets.
#[cfg(not(target_os = "linux"))]
pub async fn mount<S>(_fs: RemoteFs<S>, _config: &MountConfig) -> io::Result<MountHandle>
where
    S: FileSystemService + 'static,
{
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "FUSE mount is only supported on Linux in this build",
    ))
}
