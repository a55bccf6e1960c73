//! SCSI addressing.

use std::fmt;
use std::path::{Path, PathBuf};

use uvm_guest_shared::constants::scsi::{BLOCK_DIR, BUS, DELETE_FILE, HOST};

/// A target on the guest's SCSI bus, as assigned by the host.
///
/// Host and bus are fixed; only controller and LUN vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScsiAddress {
    pub controller: u8,
    pub lun: u8,
}

impl ScsiAddress {
    pub fn new(controller: u8, lun: u8) -> Self {
        Self { controller, lun }
    }

    /// Canonical kernel identifier, e.g. `0:0:1:3`.
    pub fn scsi_id(&self) -> String {
        self.to_string()
    }

    /// Directory describing this device under the SCSI devices root.
    pub fn device_dir(&self, devices_root: &Path) -> PathBuf {
        devices_root.join(self.scsi_id())
    }

    /// Listing of block devices bound to this target.
    pub fn block_dir(&self, devices_root: &Path) -> PathBuf {
        self.device_dir(devices_root).join(BLOCK_DIR)
    }

    /// Control file that removes this device when written.
    pub fn delete_path(&self, devices_root: &Path) -> PathBuf {
        self.device_dir(devices_root).join(DELETE_FILE)
    }
}

impl fmt::Display for ScsiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", HOST, BUS, self.controller, self.lun)
    }
}
