//! ASUS BMC.
//!
//! Implements boot management and TPM control.

mod client;

pub use client::Asus;
