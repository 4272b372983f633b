//! Redfish resource models shared by every vendor.
//!
//! Only the fields this crate reads are modelled; everything else in the
//! payloads is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Common types
// ============================================================================

/// Link to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ODataId {
    /// Resource path, e.g. `/redfish/v1/Systems/1`.
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
}

impl ODataId {
    /// Last path segment of the link.
    #[must_use]
    pub fn id(&self) -> &str {
        last_segment(&self.odata_id)
    }
}

/// Resource collection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Collection {
    /// Collection members.
    #[serde(default)]
    pub members: Vec<ODataId>,
}

/// Resource status block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    /// State, e.g. `Enabled`.
    pub state: Option<String>,
    /// Health, e.g. `OK`.
    pub health: Option<String>,
}

// ============================================================================
// Computer system
// ============================================================================

/// `ComputerSystem` resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputerSystem {
    /// System id.
    pub id: Option<String>,
    /// Manufacturer string as reported by firmware.
    pub manufacturer: Option<String>,
    /// Model string.
    pub model: Option<String>,
    /// Boot configuration.
    pub boot: Option<Boot>,
    /// Available actions keyed by action name.
    #[serde(default)]
    pub actions: HashMap<String, Value>,
    /// TPM devices.
    #[serde(default)]
    pub trusted_modules: Vec<TrustedModule>,
}

/// `Boot` block of a system.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Boot {
    /// Ordered boot option references.
    #[serde(default)]
    pub boot_order: Vec<String>,
    /// `Once`, `Continuous` or `Disabled`.
    pub boot_source_override_enabled: Option<String>,
    /// Override target, e.g. `Pxe`.
    pub boot_source_override_target: Option<String>,
}

/// TPM entry of a system.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrustedModule {
    /// Interface type, e.g. `TPM2_0`.
    pub interface_type: Option<String>,
    /// Module status.
    #[serde(default)]
    pub status: Status,
}

/// Member of the `BootOptions` collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BootOptionResource {
    /// Resource path.
    #[serde(rename = "@odata.id", default)]
    pub odata_id: String,
    /// Resource id.
    pub id: Option<String>,
    /// Reference used inside `BootOrder`.
    pub boot_option_reference: Option<String>,
    /// Human readable name.
    pub display_name: Option<String>,
    /// Resource name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// UEFI device path, often carrying `MAC(...)`.
    pub uefi_device_path: Option<String>,
    /// Links to the hardware behind the option.
    #[serde(default)]
    pub related_item: Vec<ODataId>,
}

// ============================================================================
// Network
// ============================================================================

/// `NetworkDeviceFunction` resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkDeviceFunction {
    /// Resource path.
    #[serde(rename = "@odata.id", default)]
    pub odata_id: String,
    /// Function id; on Dell this is the NIC FQDD.
    pub id: String,
    /// Ethernet properties.
    pub ethernet: Option<Ethernet>,
    /// Function status.
    #[serde(default)]
    pub status: Status,
}

/// Ethernet block of a device function.
#[derive(Debug, Default, Deserialize)]
pub struct Ethernet {
    /// Current MAC address.
    #[serde(rename = "MACAddress")]
    pub mac_address: Option<String>,
    /// Burned-in MAC address.
    #[serde(rename = "PermanentMACAddress")]
    pub permanent_mac_address: Option<String>,
}

// ============================================================================
// BIOS and firmware
// ============================================================================

/// `Bios` resource (current or pending settings).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bios {
    /// Attribute registry values.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// `UpdateService` resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateService {
    /// Whether updates are accepted.
    pub service_enabled: Option<bool>,
    /// Multipart push endpoint.
    pub multipart_http_push_uri: Option<String>,
    /// Legacy binary push endpoint.
    pub http_push_uri: Option<String>,
    /// Link to the firmware inventory.
    pub firmware_inventory: Option<ODataId>,
    /// Service status.
    #[serde(default)]
    pub status: Status,
}

/// Member of the firmware inventory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SoftwareInventory {
    /// Component id.
    pub id: String,
    /// Component name.
    pub name: Option<String>,
    /// Installed version.
    pub version: Option<String>,
    /// Whether the component can be updated.
    pub updateable: Option<bool>,
}

/// Last path segment of a resource path.
#[must_use]
pub fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}
