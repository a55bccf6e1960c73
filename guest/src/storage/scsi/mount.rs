//! Mount a SCSI disk at a target directory.
//!
//! The target directory is created here and belongs to the operation until
//! the mount succeeds. Every failure after creation removes it again.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use nix::errno::Errno;
use nix::mount::MsFlags;
use tracing::{debug, info, warn};
use uvm_guest_shared::constants::scsi::{DEFAULT_FS_TYPE, JOURNAL_SKIP_OPTION, TARGET_DIR_MODE};
use uvm_guest_shared::errors::{GuestError, GuestResult};

use super::address::ScsiAddress;
use super::config::ScsiConfig;
use super::kernel::Mounter;
use super::resolver::DeviceResolver;
use crate::context::OpContext;
use crate::storage::retry::RetryPolicy;

/// A request to mount the disk at `address` on `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub address: ScsiAddress,
    pub target: PathBuf,
    pub readonly: bool,
}

impl MountRequest {
    pub fn new(address: ScsiAddress, target: impl Into<PathBuf>, readonly: bool) -> Self {
        Self {
            address,
            target: target.into(),
            readonly,
        }
    }
}

/// Flags and data string handed to mount(2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountParams {
    pub flags: MsFlags,
    pub data: Option<&'static str>,
}

impl MountParams {
    /// Read-only mounts skip journal replay; read-write mounts pass nothing.
    pub fn for_access(readonly: bool) -> Self {
        if readonly {
            Self {
                flags: MsFlags::MS_RDONLY,
                data: Some(JOURNAL_SKIP_OPTION),
            }
        } else {
            Self {
                flags: MsFlags::empty(),
                data: None,
            }
        }
    }
}

/// Creates the target, resolves the device and mounts it.
#[derive(Clone)]
pub struct MountManager {
    resolver: DeviceResolver,
    mounter: Arc<dyn Mounter>,
    retry: RetryPolicy,
}

impl MountManager {
    pub fn new(config: &ScsiConfig, resolver: DeviceResolver, mounter: Arc<dyn Mounter>) -> Self {
        Self {
            resolver,
            mounter,
            retry: RetryPolicy::new(config.poll_interval()),
        }
    }

    pub fn resolver(&self) -> &DeviceResolver {
        &self.resolver
    }

    /// Mount the disk described by `request`.
    ///
    /// On success `request.target` is a live mountpoint. On failure a target
    /// directory created by this call is removed before returning; one that
    /// already existed is left alone.
    pub async fn mount(&self, ctx: &OpContext, request: &MountRequest) -> GuestResult<()> {
        let target = request.target.as_path();
        let preexisting = target.symlink_metadata().is_ok();

        // Create mount point (owner-only). Nothing to undo if this fails.
        DirBuilder::new()
            .recursive(true)
            .mode(TARGET_DIR_MODE)
            .create(target)
            .map_err(|e| GuestError::io(target, e))?;

        // From here every early return removes a target we created.
        // A directory the caller already had is never deleted.
        let rollback = TargetRollback::new(target, !preexisting);

        // Wait for the kernel to enumerate the disk
        let device = self.resolver.resolve(ctx, request.address).await?;

        // Read-only layers are already consistent: skip journal replay
        // so the mount never tries to write to them.
        let params = MountParams::for_access(request.readonly);

        info!(
            "Mounting SCSI disk {}: {} → {} (fs={}, readonly={})",
            request.address,
            device.display(),
            target.display(),
            DEFAULT_FS_TYPE,
            request.readonly
        );

        // sysfs lists the disk before devtmpfs creates its node, so mount(2)
        // can still fail with ENOENT. Retry that on the poll interval; any
        // other errno is final.
        let start = Instant::now();
        self.retry
            .run(
                ctx,
                || self.mount_once(&device, target, params),
                GuestError::is_transient,
            )
            .await?;

        // Mounted: the directory now belongs to the filesystem
        rollback.disarm();
        info!(
            elapsed = ?start.elapsed(),
            "Mounted SCSI disk {}: {} → {}",
            request.address,
            device.display(),
            target.display()
        );
        Ok(())
    }

    /// A single mount(2) attempt. `ENOENT` means udev/devtmpfs has not
    /// created the node yet, even though sysfs already lists it.
    fn mount_once(&self, device: &Path, target: &Path, params: MountParams) -> GuestResult<()> {
        match self
            .mounter
            .mount(device, target, DEFAULT_FS_TYPE, params.flags, params.data)
        {
            Ok(()) => Ok(()),
            Err(Errno::ENOENT) => {
                debug!(device = %device.display(), "device node not present yet");
                Err(GuestError::DeviceNotReady(format!(
                    "{} does not exist yet",
                    device.display()
                )))
            }
            Err(errno) => Err(GuestError::Mount {
                device: device.to_path_buf(),
                target: target.to_path_buf(),
                source: errno.into(),
            }),
        }
    }
}

impl std::fmt::Debug for MountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountManager")
            .field("resolver", &self.resolver)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Removes the mount target on drop unless disarmed.
///
/// Runs on every early return and also when the mount future is dropped
/// mid-retry.
struct TargetRollback<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> TargetRollback<'a> {
    fn new(path: &'a Path, armed: bool) -> Self {
        if !armed {
            debug!(
                target_dir = %path.display(),
                "mount target already existed; it will not be removed on failure"
            );
        }
        Self { path, armed }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TargetRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Rolling back mount target {}", self.path.display());
        if let Err(e) = std::fs::remove_dir_all(self.path) {
            warn!(
                "Failed to remove mount target {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
