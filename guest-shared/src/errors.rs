//! Error types for the guest agent.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the guest agent.
pub type GuestResult<T> = Result<T, GuestError>;

#[derive(Error, Debug)]
pub enum GuestError {
    /// A topology entry or device node is not visible yet.
    ///
    /// Retry loops absorb this; callers only see it if they bypass them.
    #[error("device not ready: {0}")]
    DeviceNotReady(String),

    /// The caller's context was cancelled.
    #[error("operation canceled")]
    Canceled,

    /// The caller's context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("more than one block device could match SCSI ID \"{scsi_id}\" ({count} found)")]
    AmbiguousDevice { scsi_id: String, count: usize },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to mount {} to {}: {source}", .device.display(), .target.display())]
    Mount {
        device: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GuestError {
    /// Wrap an I/O error with the kernel path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error describes a state that may resolve by waiting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DeviceNotReady(_))
    }

    /// Whether the error came from the caller's context ending.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// The underlying OS error, if any.
    pub fn io_source(&self) -> Option<&io::Error> {
        match self {
            Self::Io { source, .. } | Self::Mount { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<String> for GuestError {
    fn from(msg: String) -> Self {
        Self::Internal(msg)
    }
}

impl From<&str> for GuestError {
    fn from(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_ready_is_transient() {
        assert!(GuestError::DeviceNotReady("0:0:0:1".into()).is_transient());
        assert!(!GuestError::Canceled.is_transient());
        assert!(!GuestError::AmbiguousDevice {
            scsi_id: "0:0:0:1".into(),
            count: 2
        }
        .is_transient());
        assert!(!GuestError::io("/sys", io::Error::from(io::ErrorKind::NotFound)).is_transient());
    }

    #[test]
    fn test_io_source_preserves_os_error() {
        let err = GuestError::Mount {
            device: "/dev/sda".into(),
            target: "/mnt".into(),
            source: io::Error::from_raw_os_error(22),
        };
        assert_eq!(err.io_source().and_then(|e| e.raw_os_error()), Some(22));
        assert!(GuestError::Canceled.io_source().is_none());
    }

    #[test]
    fn test_ambiguous_message_names_scsi_id() {
        let err = GuestError::AmbiguousDevice {
            scsi_id: "0:0:1:2".into(),
            count: 3,
        };
        assert!(err.to_string().contains("\"0:0:1:2\""));
    }

    #[test]
    fn test_string_conversions() {
        let err: GuestError = "boom".into();
        assert!(matches!(err, GuestError::Internal(ref m) if m == "boom"));
    }
}
