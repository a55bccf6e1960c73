//! Storage operations (disk attachment).
//!
//! - SCSI: per-container disks the host attaches to the guest's SCSI bus

pub mod retry;
pub mod scsi;
