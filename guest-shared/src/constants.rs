//! Shared constants for the guest agent
//!
//! Kernel-interface values here must match the conventions of the guest
//! kernel; changing them breaks device discovery and removal.

/// SCSI attachment constants
pub mod scsi {
    /// Host number baked into every SCSI identifier the agent builds.
    pub const HOST: u8 = 0;

    /// Bus (channel) number baked into every SCSI identifier.
    pub const BUS: u8 = 0;

    /// sysfs directory holding one entry per attached SCSI device
    pub const DEFAULT_DEVICES_ROOT: &str = "/sys/bus/scsi/devices";

    /// Directory containing the block device nodes
    pub const DEFAULT_DEV_ROOT: &str = "/dev";

    /// Per-device directory listing the block devices bound to a target
    pub const BLOCK_DIR: &str = "block";

    /// Per-device control file that triggers a guest-initiated unplug
    pub const DELETE_FILE: &str = "delete";

    /// Payload written to [`DELETE_FILE`]
    pub const DELETE_TRIGGER: &[u8] = b"1\n";

    /// Filesystem every SCSI disk is mounted as
    pub const DEFAULT_FS_TYPE: &str = "ext4";

    /// ext4 option that skips journal replay; used for read-only mounts
    pub const JOURNAL_SKIP_OPTION: &str = "noload";

    /// Interval between polls while a device is still being enumerated
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

    /// Mode for mount target directories
    pub const TARGET_DIR_MODE: u32 = 0o700;
}
