//! Supermicro client implementation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::detect::Manufacturer;
use crate::error::{BmcError, Result};
use crate::etag::patch_if_match;
use crate::session::Session;
use crate::vendors::common;
use crate::vendors::traits::{
    BootManagement, BootOption, BootSourceTarget, FirmwareComponent, FirmwareUpdate,
    FirmwareUpdateResult, ResetType, UpdateServiceStatus,
};

/// BMC manager targeted by BMC firmware updates.
const MANAGER_PATH: &str = "/redfish/v1/Managers/1";

/// Supermicro BMC.
#[derive(Debug, Clone)]
pub struct Supermicro {
    session: Arc<Session>,
    system_path: String,
}

impl Supermicro {
    /// Create a Supermicro implementation bound to `system_path`.
    #[must_use]
    pub fn new(session: Arc<Session>, system_path: impl Into<String>) -> Self {
        Self {
            session,
            system_path: system_path.into(),
        }
    }

    /// System resource path.
    #[must_use]
    pub fn system_path(&self) -> &str {
        &self.system_path
    }

    async fn patch_system(&self, body: &Value) -> Result<()> {
        patch_if_match(&self.session, &self.system_path, &self.system_path, body).await?;
        Ok(())
    }
}

/// `UpdateParameters` for a BIOS image; ME, NVRAM and SMBIOS are kept.
fn bios_update_parameters(system_path: &str) -> Value {
    json!({
        "Targets": [format!("{system_path}/Bios")],
        "@Redfish.OperationApplyTime": "Immediate",
        "Oem": {
            "Supermicro": {
                "BIOS": {
                    "PreserveME": true,
                    "PreserveNVRAM": true,
                    "PreserveSMBIOS": true,
                    "BackupBIOS": false
                }
            }
        }
    })
}

/// `UpdateParameters` for a BMC image.
fn bmc_update_parameters(preserve_config: bool) -> Value {
    json!({
        "Targets": [MANAGER_PATH],
        "@Redfish.OperationApplyTime": "Immediate",
        "Oem": {
            "Supermicro": {
                "BMC": {
                    "PreserveCfg": preserve_config,
                    "PreserveSdr": preserve_config,
                    "PreserveSsl": preserve_config,
                    "BackupBMC": true
                }
            }
        }
    })
}

#[async_trait]
impl BootManagement for Supermicro {
    async fn boot_options(&self) -> Result<Vec<BootOption>> {
        common::boot_options(&self.session, &self.system_path).await
    }

    async fn boot_order(&self) -> Result<Vec<String>> {
        common::boot_order(&self.session, &self.system_path).await
    }

    async fn set_boot_order(&self, order: &[String]) -> Result<()> {
        info!(system = %self.system_path, order = ?order, "Setting boot order");
        self.patch_system(&common::boot_order_body(order)).await
    }

    async fn pending_boot_order(&self) -> Result<Vec<String>> {
        Err(BmcError::not_implemented(
            "pending boot order",
            Manufacturer::Supermicro,
        ))
    }

    async fn set_one_time_boot(&self, target: BootSourceTarget) -> Result<()> {
        info!(system = %self.system_path, target = target.as_str(), "Setting one-time boot");
        self.patch_system(&common::one_time_boot_body(target)).await
    }

    async fn reset_types(&self) -> Result<Vec<ResetType>> {
        common::reset_types(&self.session, &self.system_path).await
    }

    async fn reset_system(&self, reset_type: Option<ResetType>) -> Result<ResetType> {
        common::reset_system(&self.session, &self.system_path, reset_type).await
    }
}

#[async_trait]
impl FirmwareUpdate for Supermicro {
    async fn firmware_inventory(&self) -> Result<Vec<FirmwareComponent>> {
        common::firmware_inventory(&self.session).await
    }

    async fn update_service_status(&self) -> Result<UpdateServiceStatus> {
        common::update_service_status(&self.session).await
    }

    async fn update_bios(&self, image: &Path) -> Result<FirmwareUpdateResult> {
        let parameters = bios_update_parameters(&self.system_path);
        common::push_firmware(&self.session, Manufacturer::Supermicro, image, &parameters).await
    }

    async fn update_bmc(&self, image: &Path, preserve_config: bool) -> Result<FirmwareUpdateResult> {
        let parameters = bmc_update_parameters(preserve_config);
        common::push_firmware(&self.session, Manufacturer::Supermicro, image, &parameters).await
    }
}
