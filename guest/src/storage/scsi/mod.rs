//! SCSI disk attachment.
//!
//! The host attaches per-container disks to the guest's SCSI bus and tells
//! the agent their `(controller, lun)`. This module turns that address into
//! a mounted filesystem, and later asks the kernel to drop the device.
//!
//! - [`DeviceResolver`]: address → `/dev/sdX`, polling sysfs until the kernel
//!   has enumerated the disk
//! - [`MountManager`]: creates the target, resolves, mounts, rolls back
//! - [`UnplugManager`]: writes the sysfs delete trigger
//!
//! [`Scsi`] bundles the three behind [`ScsiOps`]; [`Traced`] wraps any
//! [`ScsiOps`] with tracing spans.

mod address;
mod config;
pub mod kernel;
mod mount;
mod resolver;
mod traced;
mod unplug;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uvm_guest_shared::errors::GuestResult;

use crate::context::OpContext;

pub use address::ScsiAddress;
pub use config::ScsiConfig;
pub use kernel::KernelHooks;
pub use mount::{MountManager, MountParams, MountRequest};
pub use resolver::DeviceResolver;
pub use traced::Traced;
pub use unplug::UnplugManager;

/// The SCSI operations the agent exposes to the host.
#[async_trait]
pub trait ScsiOps: Send + Sync {
    async fn mount(&self, ctx: &OpContext, request: &MountRequest) -> GuestResult<()>;

    async fn resolve_device_path(
        &self,
        ctx: &OpContext,
        address: ScsiAddress,
    ) -> GuestResult<PathBuf>;

    async fn unplug(&self, ctx: &OpContext, address: ScsiAddress) -> GuestResult<()>;
}

/// SCSI attachment against a set of kernel hooks.
#[derive(Debug, Clone)]
pub struct Scsi {
    mounts: MountManager,
    unplugs: UnplugManager,
}

impl Scsi {
    /// SCSI attachment against the running kernel.
    pub fn new(config: &ScsiConfig) -> GuestResult<Self> {
        Self::with_kernel(config, KernelHooks::system())
    }

    pub fn with_kernel(config: &ScsiConfig, hooks: KernelHooks) -> GuestResult<Self> {
        config.validate()?;
        let resolver = DeviceResolver::new(config, hooks.tree);
        Ok(Self {
            mounts: MountManager::new(config, resolver, hooks.mounter),
            unplugs: UnplugManager::new(config, hooks.control),
        })
    }

    pub fn resolver(&self) -> &DeviceResolver {
        self.mounts.resolver()
    }
}

#[async_trait]
impl ScsiOps for Scsi {
    async fn mount(&self, ctx: &OpContext, request: &MountRequest) -> GuestResult<()> {
        self.mounts.mount(ctx, request).await
    }

    async fn resolve_device_path(
        &self,
        ctx: &OpContext,
        address: ScsiAddress,
    ) -> GuestResult<PathBuf> {
        self.mounts.resolver().resolve(ctx, address).await
    }

    async fn unplug(&self, ctx: &OpContext, address: ScsiAddress) -> GuestResult<()> {
        self.unplugs.unplug(ctx, address).await
    }
}

fn system_ops() -> GuestResult<Traced<Scsi>> {
    Ok(Traced::new(Scsi::new(&ScsiConfig::default())?))
}

/// Mount the disk at `controller`/`lun` on `target`.
///
/// `target` is created if needed and removed again if this call created it
/// and the mount fails.
pub async fn mount(
    ctx: &OpContext,
    controller: u8,
    lun: u8,
    target: &Path,
    readonly: bool,
) -> GuestResult<()> {
    let request = MountRequest::new(ScsiAddress::new(controller, lun), target, readonly);
    system_ops()?.mount(ctx, &request).await
}

/// Find the `/dev` node for the disk at `controller`/`lun`.
pub async fn resolve_device_path(ctx: &OpContext, controller: u8, lun: u8) -> GuestResult<PathBuf> {
    system_ops()?
        .resolve_device_path(ctx, ScsiAddress::new(controller, lun))
        .await
}

/// Ask the kernel to remove the disk at `controller`/`lun`.
///
/// Returns `Ok` if the device is already gone.
pub async fn unplug(ctx: &OpContext, controller: u8, lun: u8) -> GuestResult<()> {
    system_ops()?
        .unplug(ctx, ScsiAddress::new(controller, lun))
        .await
}
