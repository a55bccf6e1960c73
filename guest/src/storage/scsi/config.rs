//! SCSI subsystem configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use uvm_guest_shared::constants::scsi as consts;
use uvm_guest_shared::errors::{GuestError, GuestResult};

/// Where the SCSI components find the kernel and how often they poll.
///
/// The filesystem type is fixed (`ext4`) and not configurable: read-only
/// mounts pass the ext4 journal-skip option. Every field has a default matching a standard Linux guest, so an empty
/// JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScsiConfig {
    /// sysfs directory with one entry per SCSI device
    pub devices_root: PathBuf,
    /// Directory holding block device nodes
    pub dev_root: PathBuf,
    /// Poll interval while waiting for enumeration, in milliseconds
    pub poll_interval_ms: u64,
}

impl ScsiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> GuestResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(GuestError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if !self.devices_root.is_absolute() || !self.dev_root.is_absolute() {
            return Err(GuestError::Config(format!(
                "devices_root ({}) and dev_root ({}) must be absolute paths",
                self.devices_root.display(),
                self.dev_root.display()
            )));
        }
        Ok(())
    }
}

impl Default for ScsiConfig {
    fn default() -> Self {
        Self {
            devices_root: PathBuf::from(consts::DEFAULT_DEVICES_ROOT),
            dev_root: PathBuf::from(consts::DEFAULT_DEV_ROOT),
            poll_interval_ms: consts::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_kernel_layout() {
        let config = ScsiConfig::default();
        assert_eq!(config.devices_root, PathBuf::from("/sys/bus/scsi/devices"));
        assert_eq!(config.dev_root, PathBuf::from("/dev"));
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ScsiConfig = serde_json::from_str(r#"{"poll_interval_ms": 25}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 25);
        assert_eq!(config.devices_root, PathBuf::from("/sys/bus/scsi/devices"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ScsiConfig, _> = serde_json::from_str(r#"{"fstype": "xfs"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_fs_type_not_configurable() {
        let result: Result<ScsiConfig, _> = serde_json::from_str(r#"{"fs_type": "xfs"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = ScsiConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GuestError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_relative_roots() {
        let config = ScsiConfig {
            devices_root: PathBuf::from("sys/bus/scsi/devices"),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GuestError::Config(_))));
    }
}
