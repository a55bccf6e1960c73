//! UVM guest core - shared code for the guest agent
//!
//! This crate contains the error taxonomy and kernel-interface constants
//! used by the guest agent and by anything that drives it.

pub mod constants;
pub mod errors;

pub use errors::{GuestError, GuestResult};
