//! Guest agent configuration file.

use std::path::Path;

use serde::Deserialize;
use uvm_guest_shared::errors::{GuestError, GuestResult};

use crate::storage::scsi::ScsiConfig;

/// Top-level agent configuration, read from JSON.
///
/// ```json
/// { "scsi": { "poll_interval_ms": 20 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuestConfig {
    pub scsi: ScsiConfig,
}

impl GuestConfig {
    pub fn load(path: &Path) -> GuestResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| GuestError::io(path, e))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            GuestError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.scsi.validate()?;
        Ok(config)
    }
}
