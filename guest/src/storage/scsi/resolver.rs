//! SCSI address to block device resolution.
//!
//! After the host attaches a disk the guest kernel enumerates it on its own
//! schedule, so `<devices_root>/0:0:C:L/block` may be missing or empty for a
//! while. The resolver polls it until exactly one block device shows up.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use uvm_guest_shared::errors::{GuestError, GuestResult};

use super::address::ScsiAddress;
use super::config::ScsiConfig;
use super::kernel::DeviceTree;
use crate::context::OpContext;
use crate::storage::retry::RetryPolicy;

/// Maps SCSI addresses to `/dev` nodes.
#[derive(Clone)]
pub struct DeviceResolver {
    tree: Arc<dyn DeviceTree>,
    devices_root: PathBuf,
    dev_root: PathBuf,
    retry: RetryPolicy,
}

impl DeviceResolver {
    pub fn new(config: &ScsiConfig, tree: Arc<dyn DeviceTree>) -> Self {
        Self {
            tree,
            devices_root: config.devices_root.clone(),
            dev_root: config.dev_root.clone(),
            retry: RetryPolicy::new(config.poll_interval()),
        }
    }

    /// Find the device node for `address`, waiting for enumeration if needed.
    ///
    /// The result is never cached: node names are not stable across attaches.
    pub async fn resolve(&self, ctx: &OpContext, address: ScsiAddress) -> GuestResult<PathBuf> {
        let block_dir = address.block_dir(&self.devices_root);
        let name = self
            .retry
            .run(ctx, || self.lookup(&block_dir, address), GuestError::is_transient)
            .await?;

        let device = self.dev_root.join(name);
        debug!(scsi_id = %address, device = %device.display(), "found device path");
        Ok(device)
    }

    /// One look at the block listing.
    fn lookup(&self, block_dir: &Path, address: ScsiAddress) -> GuestResult<OsString> {
        let mut names = match self.tree.list(block_dir) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(GuestError::DeviceNotReady(format!(
                    "{} does not exist yet",
                    block_dir.display()
                )));
            }
            Err(e) => return Err(GuestError::io(block_dir, e)),
        };

        match names.len() {
            0 => Err(GuestError::DeviceNotReady(format!(
                "no block device under {} yet",
                block_dir.display()
            ))),
            1 => Ok(names.remove(0)),
            count => Err(GuestError::AmbiguousDevice {
                scsi_id: address.scsi_id(),
                count,
            }),
        }
    }
}

impl std::fmt::Debug for DeviceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceResolver")
            .field("devices_root", &self.devices_root)
            .field("dev_root", &self.dev_root)
            .field("retry", &self.retry)
            .finish()
    }
}
