use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tgfs::fuse::mount::mount;
use tgfs::{Args, Config, HttpFileSystemService, RemoteFs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_args(Args::parse())?;
    let service = HttpFileSystemService::new(&config.backend)
        .context("failed to build backend client")?;
    info!(backend = service.base_url(), policy = ?config.error_policy, "backend configured");

    let fs = RemoteFs::new(service, config.error_policy);
    let mut handle = mount(fs, &config.mount).await.with_context(|| {
        format!(
            "failed to mount on `{}` (is fusermount3 available?)",
            config.mount.mountpoint.display()
        )
    })?;
    info!(mountpoint = %config.mount.mountpoint.display(), "mounted, press Ctrl+C to unmount");

    let session = &mut handle;
    tokio::select! {
        res = session => {
            // unmounted from outside (fusermount -u) or the session failed
            res.context("FUSE session ended with an error")?;
            info!("session ended");
        }
        _ = shutdown_signal() => {
            info!("unmounting");
            if let Err(e) = handle.unmount().await {
                error!(error = %e, "unmount failed");
                return Err(e).context("failed to unmount");
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
