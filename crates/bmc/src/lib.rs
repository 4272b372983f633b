//! Server boot configuration and firmware management over Redfish.
//!
//! This crate talks to the BMCs of Dell, ASUS and Supermicro servers through
//! one client. It detects the manufacturer, dispatches each call to the
//! matching vendor implementation, caches boot options per client and runs
//! the multi-step PXE enablement workflow.
//!
//! # Example
//!
//! ```rust,ignore
//! use bmc::{PxeSetupOptions, Redfish, RedfishConfig};
//!
//! #[tokio::main]
//! async fn main() -> bmc::Result<()> {
//!     let config = RedfishConfig::new("10.0.0.10", "root", "calvin").with_insecure(true);
//!     let client = Redfish::connect(config).await?;
//!
//!     let report = client
//!         .setup_pxe("B0:7B:25:AA:BB:CC", PxeSetupOptions::default())
//!         .await?;
//!
//!     if report.result.needs_followup() {
//!         // After the reboot:
//!         client.boot_first_by_mac("B0:7B:25:AA:BB:CC").await?;
//!     }
//!
//!     client.close().await
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod boot_order;
pub mod cache;
pub mod client;
pub mod detect;
pub mod error;
pub mod etag;
pub mod mac;
pub mod models;
pub mod pxe;
pub mod session;
pub mod vendors;

pub use cache::{BootOptionCache, ResourceKind};
pub use client::{PxeSetupReport, Redfish, SystemInfo};
pub use detect::{Detection, Manufacturer};
pub use error::{BmcError, Result};
pub use pxe::{PxeSetupOptions, PxeSetupOrchestrator, PxeSetupResult, PxeState};
pub use session::{RedfishConfig, Response, Session};
pub use vendors::{
    BootOption, BootOptionKind, BootSourceTarget, Capability, PxeProtocol, ResetType, TpmState,
    VendorImpl,
};
