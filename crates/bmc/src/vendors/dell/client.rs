//! Dell iDRAC client implementation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::bios;
use super::models::{DellAttributes, LocalAccessChange, RoleCreated};
use crate::detect::Manufacturer;
use crate::error::{BmcError, Result};
use crate::etag::patch_if_match;
use crate::models::{last_segment, Bios, BootOptionResource, Collection, NetworkDeviceFunction};
use crate::session::Session;
use crate::vendors::common;
use crate::vendors::traits::{
    BootManagement, BootOption, BootSourceTarget, FirmwareComponent, FirmwareUpdate,
    FirmwareUpdateResult, NetworkInterface, NicDiscovery, NicPxeStatus, PxeProtocol, PxeSetup,
    ResetType, UpdateServiceStatus,
};

/// Manager collection.
const MANAGERS_PATH: &str = "/redfish/v1/Managers";

/// Manager id used when the collection lists none.
const DEFAULT_MANAGER_ID: &str = "iDRAC.Embedded.1";

/// First role index available for custom roles.
const FIRST_CUSTOM_ROLE_INDEX: u32 = 4;

/// Dell iDRAC.
#[derive(Debug, Clone)]
pub struct Dell {
    /// Shared session.
    session: Arc<Session>,
    /// System resource path, e.g. `/redfish/v1/Systems/System.Embedded.1`.
    system_path: String,
}

impl Dell {
    /// Create a Dell implementation bound to `system_path`.
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

    fn system_id(&self) -> &str {
        last_segment(&self.system_path)
    }

    /// Follow `RelatedItem` links until one yields a MAC address.
    ///
    /// Links the BMC refuses to serve are skipped; transport errors propagate.
    async fn related_mac(&self, resource: &BootOptionResource) -> Result<Option<String>> {
        for link in &resource.related_item {
            let response = self.session.get(&link.odata_id).await?;
            if !response.status.is_success() {
                debug!(link = %link.odata_id, status = %response.status, "Related item unavailable");
                continue;
            }
            if let Some(mac) = mac_from_related(&response.body) {
                return Ok(Some(mac));
            }
        }
        Ok(None)
    }

    async fn manager_id(&self) -> Result<String> {
        let managers: Collection = self.session.get_json(MANAGERS_PATH).await?;
        match managers.members.first() {
            Some(manager) => Ok(manager.id().to_string()),
            None => {
                warn!(default = DEFAULT_MANAGER_ID, "No managers listed, using default");
                Ok(DEFAULT_MANAGER_ID.to_string())
            }
        }
    }

    async fn attributes_path(&self) -> Result<String> {
        let manager = self.manager_id().await?;
        Ok(format!("{MANAGERS_PATH}/{manager}/Oem/Dell/DellAttributes/{manager}"))
    }

    async fn bios_attributes(&self) -> Result<Map<String, Value>> {
        let bios: Bios = self
            .session
            .get_json(&format!("{}/Bios", self.system_path))
            .await?;
        Ok(bios.attributes)
    }

    /// Create a custom iDRAC role in the next free `Roles.<N>` slot.
    ///
    /// # Errors
    /// Returns an error if the BMC rejects the change.
    pub async fn create_role(&self, name: &str, privileges: u32) -> Result<RoleCreated> {
        let path = self.attributes_path().await?;

        let response = self.session.get(&path).await?;
        let used = if response.status.is_success() {
            response.json::<DellAttributes>()?.used_role_indices()
        } else {
            warn!(status = %response.status, "Could not read existing roles");
            Vec::new()
        };
        let role_index = (FIRST_CUSTOM_ROLE_INDEX..)
            .find(|idx| !used.contains(idx))
            .unwrap_or(FIRST_CUSTOM_ROLE_INDEX);

        info!(role = %name, role_index, privileges, "Creating iDRAC role");
        let mut attributes = Map::new();
        attributes.insert(format!("Roles.{role_index}.Name"), json!(name));
        attributes.insert(format!("Roles.{role_index}.Privileges"), json!(privileges));

        let response = self
            .session
            .patch(&path, &json!({ "Attributes": attributes }), None)
            .await?
            .error_for_status()?;

        Ok(RoleCreated {
            role_index,
            response: response.body,
        })
    }

    /// Allow or block local iDRAC configuration.
    ///
    /// Dell's attributes are inverted: `Enabled` blocks local access.
    ///
    /// # Errors
    /// Returns an error if the BMC rejects the change.
    pub async fn set_local_access(&self, disable: bool) -> Result<LocalAccessChange> {
        let path = self.attributes_path().await?;
        let value = if disable { "Enabled" } else { "Disabled" };

        let mut applied = Map::new();
        applied.insert("LocalSecurity.1.PrebootConfig".to_string(), json!(value));
        applied.insert("LocalSecurity.1.LocalConfig".to_string(), json!(value));

        info!(disable, "Changing local iDRAC access");
        let response = self
            .session
            .patch(&path, &json!({ "Attributes": applied }), None)
            .await?
            .error_for_status()?;

        Ok(LocalAccessChange {
            applied,
            response: response.body,
        })
    }
}

/// MAC address of a related network resource.
fn mac_from_related(body: &Value) -> Option<String> {
    let ethernet = body.get("Ethernet");
    let oem_product = body
        .pointer("/Oem/Dell/DellNIC/ProductName")
        .and_then(Value::as_str)
        .and_then(|name| name.split_whitespace().last());

    ethernet
        .and_then(|e| e.get("MACAddress"))
        .and_then(Value::as_str)
        .into_iter()
        .chain(
            ethernet
                .and_then(|e| e.get("PermanentMACAddress"))
                .and_then(Value::as_str),
        )
        .chain(oem_product)
        .find_map(|candidate| crate::mac::normalize(candidate).ok())
        .map(|normalized| crate::mac::display(&normalized))
}

impl From<NetworkDeviceFunction> for NetworkInterface {
    fn from(function: NetworkDeviceFunction) -> Self {
        let ethernet = function.ethernet.unwrap_or_default();
        Self {
            id: function.id,
            mac: ethernet.mac_address,
            permanent_mac: ethernet.permanent_mac_address,
            state: function.status.state,
            health: function.status.health,
            odata_id: function.odata_id,
        }
    }
}

#[async_trait]
impl BootManagement for Dell {
    async fn boot_options(&self) -> Result<Vec<BootOption>> {
        let resources = common::boot_option_resources(&self.session, &self.system_path).await?;
        let macs = join_all(resources.iter().map(|r| self.related_mac(r))).await;

        resources
            .iter()
            .zip(macs)
            .map(|(resource, mac)| Ok(common::to_boot_option(resource, mac?)))
            .collect()
    }

    async fn boot_order(&self) -> Result<Vec<String>> {
        common::boot_order(&self.session, &self.system_path).await
    }

    async fn set_boot_order(&self, order: &[String]) -> Result<()> {
        info!(system = %self.system_path, order = ?order, "Setting boot order");
        self.session
            .patch(&self.system_path, &common::boot_order_body(order), None)
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn pending_boot_order(&self) -> Result<Vec<String>> {
        Err(BmcError::not_implemented(
            "pending boot order",
            Manufacturer::Dell,
        ))
    }

    async fn set_one_time_boot(&self, target: BootSourceTarget) -> Result<()> {
        info!(system = %self.system_path, target = target.as_str(), "Setting one-time boot");
        self.session
            .patch(&self.system_path, &common::one_time_boot_body(target), None)
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn reset_types(&self) -> Result<Vec<ResetType>> {
        common::reset_types(&self.session, &self.system_path).await
    }

    async fn reset_system(&self, reset_type: Option<ResetType>) -> Result<ResetType> {
        common::reset_system(&self.session, &self.system_path, reset_type).await
    }
}

#[async_trait]
impl FirmwareUpdate for Dell {
    async fn firmware_inventory(&self) -> Result<Vec<FirmwareComponent>> {
        common::firmware_inventory(&self.session).await
    }

    async fn update_service_status(&self) -> Result<UpdateServiceStatus> {
        common::update_service_status(&self.session).await
    }

    async fn update_bios(&self, image: &Path) -> Result<FirmwareUpdateResult> {
        let parameters = json!({ "Targets": [], "@Redfish.OperationApplyTime": "OnReset" });
        common::push_firmware(&self.session, Manufacturer::Dell, image, &parameters).await
    }

    async fn update_bmc(&self, image: &Path, preserve_config: bool) -> Result<FirmwareUpdateResult> {
        if !preserve_config {
            warn!("iDRAC always preserves its configuration across updates");
        }
        let parameters = json!({ "Targets": [], "@Redfish.OperationApplyTime": "Immediate" });
        common::push_firmware(&self.session, Manufacturer::Dell, image, &parameters).await
    }
}

#[async_trait]
impl NicDiscovery for Dell {
    async fn network_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let adapters: Collection = self
            .session
            .get_json(&format!(
                "/redfish/v1/Chassis/{}/NetworkAdapters",
                self.system_id()
            ))
            .await?;

        let per_adapter = join_all(adapters.members.iter().map(|adapter| {
            let path = format!("{}/NetworkDeviceFunctions", adapter.odata_id);
            async move { common::collection_members::<NetworkDeviceFunction>(&self.session, &path).await }
        }))
        .await;

        let mut interfaces = Vec::new();
        for functions in per_adapter {
            interfaces.extend(functions?.into_iter().map(NetworkInterface::from));
        }
        debug!(count = interfaces.len(), "Discovered network interfaces");
        Ok(interfaces)
    }

    async fn nic_attributes(&self, mac: &str) -> Result<Value> {
        let nic = self.interface_by_mac(mac).await?;
        let path = format!(
            "{}/Oem/Dell/DellNetworkAttributes/{}",
            nic.odata_id, nic.id
        );
        let attributes: DellAttributes = self.session.get_json(&path).await?;
        Ok(Value::Object(attributes.attributes))
    }
}

#[async_trait]
impl PxeSetup for Dell {
    async fn nic_pxe_status(&self, mac: &str) -> Result<NicPxeStatus> {
        let nic = self.interface_by_mac(mac).await?;
        let attributes = self.bios_attributes().await?;
        let slot = bios::find_slot(&attributes, &nic.id);

        let status = NicPxeStatus {
            mac: mac.to_string(),
            pxe_enabled: slot.is_some_and(|s| bios::slot_enabled(&attributes, s)),
            protocol: slot.and_then(|s| bios::slot_protocol(&attributes, s)),
            interface_id: nic.id,
            slot,
        };
        debug!(mac = %mac, nic = %status.interface_id, slot = ?status.slot, enabled = status.pxe_enabled, "Probed NIC PXE state");
        Ok(status)
    }

    async fn stage_pxe(&self, nic: &NicPxeStatus, protocol: PxeProtocol) -> Result<()> {
        let slot = match nic.slot {
            Some(slot) => slot,
            None => bios::allocate_slot(&self.bios_attributes().await?, &nic.interface_id)?,
        };
        let settings = format!("{}/Bios/Settings", self.system_path);

        info!(
            nic = %nic.interface_id,
            slot,
            protocol = protocol.as_str(),
            "Staging PXE device"
        );
        patch_if_match(
            &self.session,
            &settings,
            &settings,
            &bios::staging_body(slot, &nic.interface_id, protocol),
        )
        .await?;
        Ok(())
    }
}
