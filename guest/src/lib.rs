//! UVM guest agent: attaches host-provided SCSI disks inside the guest.

#[cfg(not(target_os = "linux"))]
compile_error!("The UVM guest agent is Linux-only; build with a Linux target");

pub mod config;
pub mod context;
pub mod storage;

pub use context::OpContext;
pub use storage::scsi::{ScsiAddress, ScsiConfig, ScsiOps};
