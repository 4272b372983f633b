//! Unified Redfish client.
//!
//! [`Redfish`] authenticates, identifies the manufacturer once and routes every
//! call to the matching vendor implementation, consulting the boot option
//! cache on the way. Vendor operations with no unified equivalent stay
//! reachable through [`Redfish::vendor`].

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::boot_order::{read_boot_order_file, write_boot_order_file};
use crate::cache::BootOptionCache;
use crate::detect::{detect, Manufacturer};
use crate::error::{BmcError, Result};
use crate::mac;
use crate::pxe::{promote_boot_option, PxeSetupOptions, PxeSetupOrchestrator, PxeSetupResult, PxeState};
use crate::session::{RedfishConfig, Session};
use crate::vendors::{
    common, BootOption, BootOptionKind, BootSourceTarget, Capability, FirmwareComponent,
    FirmwareUpdateResult, NetworkInterface, NicPxeStatus, ResetType, TpmState,
    UpdateServiceStatus, VendorImpl,
};

/// Summary of the managed system.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub manufacturer: Manufacturer,
    /// Manufacturer string as reported by firmware.
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub system_path: String,
    pub capabilities: Vec<Capability>,
}

/// Outcome of a PXE setup run with the states it went through.
#[derive(Debug, Clone, Serialize)]
pub struct PxeSetupReport {
    #[serde(flatten)]
    pub result: PxeSetupResult,
    pub states: Vec<PxeState>,
}

/// Client for one BMC.
#[derive(Debug)]
pub struct Redfish {
    session: Arc<Session>,
    vendor: VendorImpl,
    cache: BootOptionCache,
}

impl Redfish {
    /// Authenticate and resolve the vendor implementation.
    ///
    /// A manufacturer set in `config` is trusted as is and no detection
    /// request is made.
    ///
    /// # Errors
    /// Returns connection and authentication errors, or
    /// [`BmcError::UnsupportedManufacturer`] if detection fails.
    pub async fn connect(config: RedfishConfig) -> Result<Self> {
        let session = Arc::new(Session::new(config)?);
        session.authenticate().await?;

        let (manufacturer, system_path) = match session.config().manufacturer {
            Some(forced) => {
                info!(manufacturer = %forced, "Using configured manufacturer, skipping detection");
                (forced, None)
            }
            None => {
                let detection = detect(&session).await?;
                (detection.manufacturer, Some(detection.system_path))
            }
        };

        let vendor = VendorImpl::resolve(manufacturer, Arc::clone(&session), system_path)?;
        info!(
            manufacturer = %vendor.manufacturer(),
            system = %vendor.system_path(),
            "Connected to BMC"
        );

        Ok(Self {
            session,
            vendor,
            cache: BootOptionCache::new(),
        })
    }

    #[must_use]
    pub fn manufacturer(&self) -> Manufacturer {
        self.vendor.manufacturer()
    }

    /// Vendor implementation, for vendor-specific operations.
    #[must_use]
    pub fn vendor(&self) -> &VendorImpl {
        &self.vendor
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn cache(&self) -> &BootOptionCache {
        &self.cache
    }

    /// Manufacturer, model and capabilities of the system.
    ///
    /// # Errors
    /// Returns an error if the system resource cannot be read.
    pub async fn system_info(&self) -> Result<SystemInfo> {
        let system = common::system(&self.session, self.vendor.system_path()).await?;
        Ok(SystemInfo {
            manufacturer: self.manufacturer(),
            vendor: system.manufacturer,
            model: system.model,
            system_path: self.vendor.system_path().to_string(),
            capabilities: self.vendor.capabilities().to_vec(),
        })
    }

    // ------------------------------------------------------------------------
    // Boot
    // ------------------------------------------------------------------------

    /// Boot options, served from the cache unless `force` is set.
    ///
    /// # Errors
    /// Returns an error if the options cannot be fetched.
    pub async fn boot_options(&self, force: bool) -> Result<Vec<BootOption>> {
        self.cache
            .boot_options(self.vendor.boot_management()?, force)
            .await
    }

    /// Persistent boot order, served from the cache unless `force` is set.
    ///
    /// # Errors
    /// Returns an error if the order cannot be fetched.
    pub async fn boot_order(&self, force: bool) -> Result<Vec<String>> {
        self.cache
            .boot_order(self.vendor.boot_management()?, force)
            .await
    }

    /// Boot order staged for the next boot (ASUS).
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] for vendors without a pending resource.
    pub async fn pending_boot_order(&self) -> Result<Vec<String>> {
        self.vendor.boot_management()?.pending_boot_order().await
    }

    /// Replace the boot order; `order` must list every boot option exactly once.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] without writing if it does not.
    pub async fn set_boot_order(&self, order: &[String]) -> Result<()> {
        self.cache
            .set_boot_order(self.vendor.boot_management()?, order)
            .await
    }

    /// Replace the boot order with the content of a one-reference-per-line file.
    ///
    /// # Errors
    /// Returns [`BmcError::FileNotFound`] before any request if the file is missing.
    pub async fn set_boot_order_from_file(&self, path: &Path) -> Result<Vec<String>> {
        let order = read_boot_order_file(path).await?;
        self.set_boot_order(&order).await?;
        Ok(order)
    }

    /// Write the current boot order to `path`, one reference per line.
    ///
    /// The file is accepted by [`Redfish::set_boot_order_from_file`].
    ///
    /// # Errors
    /// Returns an error if the order cannot be read or the file cannot be written.
    pub async fn save_boot_order(&self, path: &Path) -> Result<Vec<String>> {
        let order = self.boot_order(true).await?;
        write_boot_order_file(path, &order).await?;
        info!(path = %path.display(), "Saved boot order");
        Ok(order)
    }

    /// Boot option belonging to `mac`, optionally restricted to one kind.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] for a malformed MAC or when nothing matches.
    pub async fn boot_option_by_mac(
        &self,
        mac: &str,
        kind: Option<BootOptionKind>,
        force: bool,
    ) -> Result<BootOption> {
        mac::normalize(mac)?;
        self.boot_options(force)
            .await?
            .into_iter()
            .find(|o| o.matches_mac(mac) && kind.map_or(true, |k| o.kind == Some(k)))
            .ok_or_else(|| {
                BmcError::InvalidArgument(format!("no boot option found with MAC address {mac}"))
            })
    }

    /// Boot option whose display name contains `alias` (case-insensitive).
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] when nothing matches.
    pub async fn boot_option_by_alias(&self, alias: &str, force: bool) -> Result<BootOption> {
        let needle = alias.to_lowercase();
        self.boot_options(force)
            .await?
            .into_iter()
            .find(|o| o.display_name.to_lowercase().contains(&needle))
            .ok_or_else(|| BmcError::InvalidArgument(format!("no boot option matches '{alias}'")))
    }

    /// Move the boot option of `mac` to the front of the boot order.
    ///
    /// This is the follow-up to a PXE setup that rebooted the system.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] if no boot option has this MAC.
    pub async fn boot_first_by_mac(&self, mac: &str) -> Result<Vec<String>> {
        mac::normalize(mac)?;
        promote_boot_option(self.vendor.boot_management()?, &self.cache, mac).await
    }

    /// Boot `target` once on the next restart.
    ///
    /// # Errors
    /// Returns an error if the BMC rejects the override.
    pub async fn set_one_time_boot(&self, target: BootSourceTarget) -> Result<()> {
        self.vendor
            .boot_management()?
            .set_one_time_boot(target)
            .await
    }

    /// Reset types the system accepts.
    ///
    /// # Errors
    /// Returns an error if the system cannot be read.
    pub async fn reset_types(&self) -> Result<Vec<ResetType>> {
        self.vendor.boot_management()?.reset_types().await
    }

    /// Reset the system; returns the reset type used.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] for a reset type the system does not list.
    pub async fn reset_system(&self, reset_type: Option<ResetType>) -> Result<ResetType> {
        self.vendor
            .boot_management()?
            .reset_system(reset_type)
            .await
    }

    // ------------------------------------------------------------------------
    // Firmware
    // ------------------------------------------------------------------------

    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] when unsupported.
    pub async fn firmware_inventory(&self) -> Result<Vec<FirmwareComponent>> {
        self.vendor.firmware()?.firmware_inventory().await
    }

    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] when unsupported.
    pub async fn update_service_status(&self) -> Result<UpdateServiceStatus> {
        self.vendor.firmware()?.update_service_status().await
    }

    /// Upload a BIOS image. The BMC only acknowledges the upload.
    ///
    /// # Errors
    /// Returns [`BmcError::FileNotFound`] if the image does not exist.
    pub async fn update_bios(&self, image: &Path) -> Result<FirmwareUpdateResult> {
        self.vendor.firmware()?.update_bios(image).await
    }

    /// Upload a BMC image.
    ///
    /// # Errors
    /// Returns [`BmcError::FileNotFound`] if the image does not exist.
    pub async fn update_bmc(&self, image: &Path, preserve_config: bool) -> Result<FirmwareUpdateResult> {
        self.vendor
            .firmware()?
            .update_bmc(image, preserve_config)
            .await
    }

    // ------------------------------------------------------------------------
    // NIC, TPM and PXE
    // ------------------------------------------------------------------------

    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] when unsupported.
    pub async fn network_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        self.vendor.nic_discovery()?.network_interfaces().await
    }

    /// Vendor NIC attributes for the NIC owning `mac`.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] if no NIC has this MAC.
    pub async fn nic_attributes(&self, mac: &str) -> Result<Value> {
        mac::normalize(mac)?;
        self.vendor.nic_discovery()?.nic_attributes(mac).await
    }

    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] when unsupported.
    pub async fn tpm_state(&self) -> Result<Option<TpmState>> {
        self.vendor.tpm()?.tpm_state().await
    }

    /// Stage a TPM state for the next boot.
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] when unsupported.
    pub async fn set_tpm_state(&self, state: TpmState) -> Result<()> {
        self.vendor.tpm()?.set_tpm_state(state).await
    }

    /// PXE state of the NIC owning `mac`.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] if no NIC has this MAC.
    pub async fn check_pxe(&self, mac: &str) -> Result<NicPxeStatus> {
        mac::normalize(mac)?;
        self.vendor.pxe_setup()?.nic_pxe_status(mac).await
    }

    /// Enable network boot for the NIC owning `mac`.
    ///
    /// If the report says `boot_order_set: false`, call
    /// [`Redfish::boot_first_by_mac`] once the system has rebooted.
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] for vendors without PXE
    /// setup, plus any error from the workflow.
    pub async fn setup_pxe(&self, mac: &str, options: PxeSetupOptions) -> Result<PxeSetupReport> {
        let pxe = self.vendor.pxe_setup()?;
        let boot = self.vendor.boot_management()?;

        let mut orchestrator = PxeSetupOrchestrator::new(boot, pxe, &self.cache, options);
        let result = orchestrator.run(mac).await?;

        Ok(PxeSetupReport {
            result,
            states: orchestrator.history().to_vec(),
        })
    }

    /// Log out. Safe to call more than once.
    ///
    /// # Errors
    /// Returns transport errors from the logout request.
    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }
}
