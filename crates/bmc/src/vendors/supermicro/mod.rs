//! Supermicro BMC.
//!
//! Implements boot management and firmware updates. System writes carry
//! `If-Match`.

mod client;

pub use client::Supermicro;
