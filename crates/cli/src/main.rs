//! `prefixfs`: mount an object storage bucket as a read-only directory tree.
//!
//! Usage:
//!   prefixfs my-bucket /mnt/bucket
//!   prefixfs my-bucket /mnt/bucket --prefix datasets/2024 --implicit-dirs
//!   prefixfs my-bucket /mnt/bucket --endpoint-url http://localhost:9000 --path-style
//!
//! The mount stays up until SIGINT or SIGTERM, then is unmounted cleanly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{fmt, EnvFilter};

use prefixfs_storage::{BucketLocation, RetrySettings, StorageSettings};
use prefixfs_storage_crt::CrtStorageClient;
use prefixfs_vfs::{
    spawn_mount, BucketFs, FuseAdapter, KernelCacheOptions, ListingOptions, MountOptions,
    RealClock, TimeoutOptions, VfsOptions,
};

#[derive(Parser, Debug)]
#[command(name = "prefixfs")]
#[command(about = "Mount an object storage bucket as a read-only directory tree")]
struct Cli {
    /// Bucket to mount.
    bucket: String,

    /// Mount point for the filesystem.
    mountpoint: PathBuf,

    /// Key prefix to present as the root of the mount.
    #[arg(long, default_value = "")]
    prefix: String,

    /// Bucket region.
    #[arg(long, env = "AWS_REGION", default_value = "us-west-2")]
    region: String,

    /// Custom endpoint for S3-compatible stores.
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Use path-style bucket addressing.
    #[arg(long, default_value_t = false)]
    path_style: bool,

    /// Maximum attempts per backing-store request.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Keys requested per listing page.
    #[arg(long, default_value_t = 1000)]
    page_size: usize,

    /// Treat prefixes without a placeholder object as directories.
    #[arg(long, default_value_t = false)]
    implicit_dirs: bool,

    /// Seconds a directory's attributes are reused before re-checking the bucket.
    #[arg(long, default_value_t = 60)]
    attr_cache_ttl_secs: u64,

    /// Seconds the kernel may cache attributes and lookups.
    #[arg(long, default_value_t = 1)]
    kernel_cache_ttl_secs: u64,

    /// Deadline for one kernel request in seconds. Set to 0 to disable.
    #[arg(long, default_value_t = 60)]
    request_timeout_secs: u64,

    /// Verify filesystem invariants on every operation (slow).
    #[arg(long, default_value_t = false)]
    check_invariants: bool,

    /// Allow other users to access the mount (passes allow_other to FUSE).
    #[arg(long, default_value_t = false)]
    allow_other: bool,

    /// Log filter directive, e.g. "debug" or "prefixfs_vfs=trace".
    /// Overrides RUST_LOG when given.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.path_style,
            retry: RetrySettings {
                max_attempts: self.max_attempts,
                ..RetrySettings::default()
            },
            ..StorageSettings::default()
        }
    }

    fn vfs_options(&self) -> VfsOptions {
        VfsOptions::default()
            .with_kernel_cache(KernelCacheOptions {
                attr_timeout_secs: self.kernel_cache_ttl_secs,
                entry_timeout_secs: self.kernel_cache_ttl_secs,
            })
            .with_attr_cache_ttl(Duration::from_secs(self.attr_cache_ttl_secs))
            .with_listing(
                ListingOptions::default()
                    .with_page_size(self.page_size)
                    .with_implicit_dirs(self.implicit_dirs),
            )
            .with_timeouts(TimeoutOptions {
                request_timeout_secs: self.request_timeout_secs,
            })
            .with_invariant_checks(self.check_invariants || cfg!(debug_assertions))
    }
}

fn init_tracing(log_level: Option<&str>) -> Result<()> {
    let filter: EnvFilter = match log_level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log level {:?}", directive))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => (),
        _ = sigterm.recv() => (),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    if cli.page_size == 0 {
        anyhow::bail!("--page-size must be positive");
    }

    let client = CrtStorageClient::new(cli.storage_settings())
        .await
        .context("creating storage client")?;
    let location = BucketLocation::new(cli.bucket.clone(), &cli.prefix);

    tracing::info!(
        bucket = %location.bucket,
        prefix = %location.root_prefix,
        mountpoint = %cli.mountpoint.display(),
        "Mounting"
    );

    let fs = Arc::new(BucketFs::new(
        Arc::new(client),
        location,
        Arc::new(RealClock),
        cli.vfs_options(),
    ));
    let adapter = FuseAdapter::new(fs)?;
    let mount_options = MountOptions {
        allow_other: cli.allow_other,
        ..MountOptions::default()
    };
    let session = spawn_mount(adapter, &cli.mountpoint, &mount_options)
        .with_context(|| format!("mounting at {}", cli.mountpoint.display()))?;

    shutdown_signal().await?;
    tracing::info!("Unmounting");

    // Unmounting waits on the kernel, which may be waiting on a request
    // that needs the runtime, so it must not block a runtime worker.
    tokio::task::spawn_blocking(move || drop(session)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["prefixfs", "bucket", "/mnt/b"]).unwrap();
        let options: VfsOptions = cli.vfs_options();

        assert_eq!(options.listing.page_size, 1000);
        assert!(!options.listing.implicit_dirs);
        assert_eq!(options.attr_cache_ttl, Duration::from_secs(60));
        assert_eq!(cli.storage_settings().retry.max_attempts, 3);
    }

    #[test]
    fn test_flags_map_onto_options() {
        let cli = Cli::try_parse_from([
            "prefixfs",
            "bucket",
            "/mnt/b",
            "--prefix",
            "data",
            "--implicit-dirs",
            "--page-size",
            "50",
            "--endpoint-url",
            "http://localhost:9000",
            "--path-style",
            "--request-timeout-secs",
            "0",
        ])
        .unwrap();

        let options: VfsOptions = cli.vfs_options();
        assert_eq!(options.listing.page_size, 50);
        assert!(options.listing.implicit_dirs);
        assert_eq!(options.timeouts.request_timeout(), None);

        let settings: StorageSettings = cli.storage_settings();
        assert!(settings.force_path_style);
        assert_eq!(settings.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(BucketLocation::new(cli.bucket, &cli.prefix).root_prefix, "data/");
    }
}
