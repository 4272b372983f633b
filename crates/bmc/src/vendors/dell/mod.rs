//! Dell iDRAC.
//!
//! Implements boot management, firmware updates, NIC discovery and PXE setup,
//! plus iDRAC OEM operations with no cross-vendor equivalent.

mod bios;
mod client;
mod models;

pub use bios::PXE_DEVICE_SLOTS;
pub use client::Dell;
pub use models::*;
