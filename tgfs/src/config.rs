use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;

use crate::error::ErrorPolicy;

pub const DEFAULT_BACKEND_URL: &str = "http://winhost:8080/filesystem";

#[derive(Parser, Debug)]
#[command(version, about = "Mount a remote file tree service as a local filesystem")]
pub struct Args {
    /// Directory to mount the filesystem on
    #[arg(value_name = "MOUNTPOINT")]
    pub mountpoint: PathBuf,

    /// Base URL of the file tree service
    #[arg(long, env = "TGFS_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Per-request timeout in seconds (no timeout when unset)
    #[arg(long, env = "TGFS_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Report an unreachable backend as "not found" / "already exists" instead of an I/O error
    #[arg(long, env = "TGFS_LEGACY_ERRORS")]
    pub legacy_errors: bool,

    /// Filesystem name shown in the mount table
    #[arg(long, env = "TGFS_FS_NAME", default_value = "tgfs")]
    pub fs_name: String,

    /// Use a privileged mount instead of fusermount3
    #[arg(long)]
    pub privileged: bool,

    /// Let other users access the mount
    #[arg(long)]
    pub allow_other: bool,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub url: String,
    pub request_timeout: Option<Duration>,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MountConfig {
    pub mountpoint: PathBuf,
    pub fs_name: String,
    pub privileged: bool,
    pub allow_other: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub backend: BackendConfig,
    pub mount: MountConfig,
    pub error_policy: ErrorPolicy,
}

impl Config {
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let url = reqwest::Url::parse(&args.backend_url)
            .with_context(|| format!("invalid backend url `{}`", args.backend_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("backend url `{}` must use http or https", args.backend_url);
        }

        let meta = std::fs::metadata(&args.mountpoint).with_context(|| {
            format!("mount point `{}` does not exist", args.mountpoint.display())
        })?;
        if !meta.is_dir() {
            bail!(
                "mount point `{}` is not a directory",
                args.mountpoint.display()
            );
        }

        Ok(Self {
            backend: BackendConfig {
                url: args.backend_url,
                request_timeout: args.request_timeout.map(Duration::from_secs),
            },
            mount: MountConfig {
                mountpoint: args.mountpoint,
                fs_name: args.fs_name,
                privileged: args.privileged,
                allow_other: args.allow_other,
            },
            error_policy: if args.legacy_errors {
                ErrorPolicy::Legacy
            } else {
                ErrorPolicy::Strict
            },
        })
    }
}
