//! Capability traits and common types for vendor implementations.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BmcError, Result};
use crate::mac;

/// Feature groups a vendor can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Boot options, boot order, one-time boot and resets.
    BootManagement,
    /// Firmware inventory and updates.
    FirmwareUpdate,
    /// Network interface discovery.
    NicDiscovery,
    /// TPM enable/disable.
    TpmManagement,
    /// NIC PXE enablement.
    PxeSetup,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BootManagement => "boot management",
            Self::FirmwareUpdate => "firmware update",
            Self::NicDiscovery => "NIC discovery",
            Self::TpmManagement => "TPM management",
            Self::PxeSetup => "PXE setup",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Boot
// ============================================================================

/// Kind of device a boot option points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootOptionKind {
    Pxe,
    Http,
    Hdd,
    Cd,
    Usb,
    Other,
}

impl BootOptionKind {
    /// Classify an option from its display name and device path.
    #[must_use]
    pub fn classify(display_name: &str, device_path: Option<&str>) -> Self {
        let text = format!("{display_name} {}", device_path.unwrap_or_default()).to_lowercase();

        if text.contains("pxe") {
            Self::Pxe
        } else if text.contains("http") || text.contains("uri(") {
            Self::Http
        } else if text.contains("usb") {
            Self::Usb
        } else if text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| matches!(token, "cd" | "cdrom" | "dvd" | "optical"))
        {
            Self::Cd
        } else if ["hdd", "disk", "ssd", "nvme", "sata", "raid", "hd("]
            .iter()
            .any(|needle| text.contains(needle))
        {
            Self::Hdd
        } else {
            Self::Other
        }
    }
}

impl FromStr for BootOptionKind {
    type Err = BmcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pxe" => Ok(Self::Pxe),
            "http" => Ok(Self::Http),
            "hdd" => Ok(Self::Hdd),
            "cd" => Ok(Self::Cd),
            "usb" => Ok(Self::Usb),
            "other" => Ok(Self::Other),
            other => Err(BmcError::InvalidArgument(format!(
                "unknown boot option type: {other}"
            ))),
        }
    }
}

/// A boot option with its resolved MAC address (if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootOption {
    /// Reference used in the boot order, e.g. `Boot0003` or `NIC.PxeDevice.1-1`.
    pub reference: String,
    /// Human readable name.
    pub display_name: String,
    /// MAC address in `AA:BB:CC:DD:EE:FF` form.
    pub mac: Option<String>,
    /// Device kind, when it could be classified.
    pub kind: Option<BootOptionKind>,
    /// Resource path.
    pub odata_id: String,
}

impl BootOption {
    /// Whether this option belongs to `mac`.
    #[must_use]
    pub fn matches_mac(&self, mac: &str) -> bool {
        self.mac.as_deref().is_some_and(|own| mac::same(own, mac))
    }
}

/// One-time boot override target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootSourceTarget {
    None,
    Pxe,
    Cd,
    Usb,
    Hdd,
    BiosSetup,
    UefiShell,
    UefiHttp,
}

impl BootSourceTarget {
    /// Redfish `BootSourceOverrideTarget` value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Pxe => "Pxe",
            Self::Cd => "Cd",
            Self::Usb => "Usb",
            Self::Hdd => "Hdd",
            Self::BiosSetup => "BiosSetup",
            Self::UefiShell => "UefiShell",
            Self::UefiHttp => "UefiHttp",
        }
    }
}

impl FromStr for BootSourceTarget {
    type Err = BmcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "pxe" => Ok(Self::Pxe),
            "cd" => Ok(Self::Cd),
            "usb" => Ok(Self::Usb),
            "hdd" => Ok(Self::Hdd),
            "biossetup" | "bios" => Ok(Self::BiosSetup),
            "uefishell" => Ok(Self::UefiShell),
            "uefihttp" | "http" => Ok(Self::UefiHttp),
            other => Err(BmcError::InvalidArgument(format!(
                "unknown boot target: {other}"
            ))),
        }
    }
}

// ============================================================================
// Power
// ============================================================================

/// `ComputerSystem.Reset` reset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetType {
    On,
    ForceOff,
    GracefulShutdown,
    GracefulRestart,
    ForceRestart,
    Nmi,
    PushPowerButton,
    PowerCycle,
}

impl ResetType {
    /// Redfish value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "On",
            Self::ForceOff => "ForceOff",
            Self::GracefulShutdown => "GracefulShutdown",
            Self::GracefulRestart => "GracefulRestart",
            Self::ForceRestart => "ForceRestart",
            Self::Nmi => "Nmi",
            Self::PushPowerButton => "PushPowerButton",
            Self::PowerCycle => "PowerCycle",
        }
    }
}

impl fmt::Display for ResetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetType {
    type Err = BmcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "on" => Ok(Self::On),
            "forceoff" => Ok(Self::ForceOff),
            "gracefulshutdown" => Ok(Self::GracefulShutdown),
            "gracefulrestart" => Ok(Self::GracefulRestart),
            "forcerestart" => Ok(Self::ForceRestart),
            "nmi" => Ok(Self::Nmi),
            "pushpowerbutton" => Ok(Self::PushPowerButton),
            "powercycle" => Ok(Self::PowerCycle),
            other => Err(BmcError::InvalidArgument(format!(
                "unknown reset type: {other}"
            ))),
        }
    }
}

// ============================================================================
// Network and PXE
// ============================================================================

/// Network device function as seen by the BMC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Function id (Dell NIC FQDD, e.g. `NIC.Integrated.1-1-1`).
    pub id: String,
    /// Current MAC address.
    pub mac: Option<String>,
    /// Burned-in MAC address.
    pub permanent_mac: Option<String>,
    /// Link state.
    pub state: Option<String>,
    /// Health.
    pub health: Option<String>,
    /// Resource path.
    pub odata_id: String,
}

impl NetworkInterface {
    /// Whether either address equals `mac`.
    #[must_use]
    pub fn matches_mac(&self, mac: &str) -> bool {
        [&self.mac, &self.permanent_mac]
            .into_iter()
            .flatten()
            .any(|own| mac::same(own, mac))
    }
}

/// IP stack used for network boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PxeProtocol {
    IPv4,
    IPv6,
    IPv4andIPv6,
}

impl PxeProtocol {
    /// BIOS attribute value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IPv4 => "IPv4",
            Self::IPv6 => "IPv6",
            Self::IPv4andIPv6 => "IPv4andIPv6",
        }
    }
}

impl FromStr for PxeProtocol {
    type Err = BmcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ipv4" => Ok(Self::IPv4),
            "ipv6" => Ok(Self::IPv6),
            "ipv4andipv6" | "both" => Ok(Self::IPv4andIPv6),
            other => Err(BmcError::InvalidArgument(format!(
                "unknown PXE protocol: {other}"
            ))),
        }
    }
}

/// PXE state of one NIC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicPxeStatus {
    /// MAC address the status was looked up by.
    pub mac: String,
    /// Interface id the MAC belongs to.
    pub interface_id: String,
    /// Whether network boot is enabled for this NIC.
    pub pxe_enabled: bool,
    /// BIOS PXE device slot bound to this NIC, if any.
    pub slot: Option<u8>,
    /// Configured protocol of the bound slot.
    pub protocol: Option<String>,
}

// ============================================================================
// Firmware and TPM
// ============================================================================

/// Installed firmware component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareComponent {
    pub id: String,
    pub name: String,
    pub version: String,
    pub updateable: bool,
}

/// Update service summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateServiceStatus {
    pub enabled: bool,
    pub state: Option<String>,
    pub health: Option<String>,
    pub multipart_push_uri: Option<String>,
}

/// Accepted firmware upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareUpdateResult {
    /// HTTP status of the upload.
    pub status: u16,
    /// Task monitor to poll, when the BMC returned one.
    pub task: Option<String>,
}

/// TPM enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TpmState {
    Enabled,
    Disabled,
}

impl FromStr for TpmState {
    type Err = BmcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "enabled" | "enable" | "on" => Ok(Self::Enabled),
            "disabled" | "disable" | "off" => Ok(Self::Disabled),
            other => Err(BmcError::InvalidArgument(format!(
                "unknown TPM state: {other}"
            ))),
        }
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Boot configuration and power control.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BootManagement: Send + Sync {
    /// Enumerate boot options with their MAC addresses resolved.
    async fn boot_options(&self) -> Result<Vec<BootOption>>;

    /// Current persistent boot order.
    async fn boot_order(&self) -> Result<Vec<String>>;

    /// Write a new persistent boot order.
    async fn set_boot_order(&self, order: &[String]) -> Result<()>;

    /// Boot order staged for the next boot.
    async fn pending_boot_order(&self) -> Result<Vec<String>>;

    /// Boot `target` once on the next restart.
    async fn set_one_time_boot(&self, target: BootSourceTarget) -> Result<()>;

    /// Reset types the system accepts.
    async fn reset_types(&self) -> Result<Vec<ResetType>>;

    /// Reset the system, choosing a restart type when none is given.
    ///
    /// Returns the reset type that was sent.
    async fn reset_system(&self, reset_type: Option<ResetType>) -> Result<ResetType>;
}

/// Firmware inventory and updates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FirmwareUpdate: Send + Sync {
    async fn firmware_inventory(&self) -> Result<Vec<FirmwareComponent>>;

    async fn update_service_status(&self) -> Result<UpdateServiceStatus>;

    /// Push a BIOS image.
    async fn update_bios(&self, image: &Path) -> Result<FirmwareUpdateResult>;

    /// Push a BMC image, optionally keeping the current BMC configuration.
    async fn update_bmc(&self, image: &Path, preserve_config: bool) -> Result<FirmwareUpdateResult>;
}

/// Network interface discovery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NicDiscovery: Send + Sync {
    async fn network_interfaces(&self) -> Result<Vec<NetworkInterface>>;

    /// Interface owning `mac`.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] if no interface has this MAC.
    async fn interface_by_mac(&self, mac: &str) -> Result<NetworkInterface> {
        self.network_interfaces()
            .await?
            .into_iter()
            .find(|nic| nic.matches_mac(mac))
            .ok_or_else(|| BmcError::InvalidArgument(format!("no network interface with MAC {mac}")))
    }

    /// Vendor NIC attributes for the interface owning `mac`.
    async fn nic_attributes(&self, mac: &str) -> Result<Value>;
}

/// TPM control.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TpmManagement: Send + Sync {
    async fn tpm_state(&self) -> Result<Option<TpmState>>;

    /// Stage a TPM state change for the next boot.
    async fn set_tpm_state(&self, state: TpmState) -> Result<()>;
}

/// NIC PXE enablement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PxeSetup: Send + Sync {
    /// Report whether network boot is enabled for the NIC owning `mac`.
    async fn nic_pxe_status(&self, mac: &str) -> Result<NicPxeStatus>;

    /// Stage enabling network boot for `nic`; applied on the next reset.
    async fn stage_pxe(&self, nic: &NicPxeStatus, protocol: PxeProtocol) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boot_options() {
        assert_eq!(
            BootOptionKind::classify("PXE Device 1: Integrated NIC 1 Port 1 Partition 1", None),
            BootOptionKind::Pxe
        );
        assert_eq!(
            BootOptionKind::classify("UEFI HTTPv4: Intel(R) I350", None),
            BootOptionKind::Http
        );
        assert_eq!(
            BootOptionKind::classify("UEFI OS", Some("PciRoot(0x0)/Pci(0x1D,0x0)/NVMe(0x1,00)/HD(1,GPT)")),
            BootOptionKind::Hdd
        );
        assert_eq!(BootOptionKind::classify("UEFI: USB Stick", None), BootOptionKind::Usb);
        assert_eq!(BootOptionKind::classify("Virtual CD/DVD", None), BootOptionKind::Cd);
        assert_eq!(BootOptionKind::classify("Shell", None), BootOptionKind::Other);
    }

    #[test]
    fn test_classify_cd_needs_whole_word() {
        assert_eq!(
            BootOptionKind::classify("Samsung SSD 980 PRO S/N ABCD1234", None),
            BootOptionKind::Hdd
        );
        assert_eq!(
            BootOptionKind::classify("UEFI: SATA disk KCD61LUL", None),
            BootOptionKind::Hdd
        );
        assert_eq!(BootOptionKind::classify("UEFI: CD-ROM Drive", None), BootOptionKind::Cd);
        assert_eq!(
            BootOptionKind::classify("UEFI Optical", Some("PciRoot(0x0)/Sata(0x1,0x0,0x0)/CDROM(0x0)")),
            BootOptionKind::Cd
        );
    }

    #[test]
    fn test_boot_option_matches_mac() {
        let option = BootOption {
            reference: "Boot0003".into(),
            display_name: "PXE".into(),
            mac: Some("3C:EC:EF:12:34:56".into()),
            kind: Some(BootOptionKind::Pxe),
            odata_id: "/redfish/v1/Systems/1/BootOptions/0003".into(),
        };
        assert!(option.matches_mac("3cecef123456"));
        assert!(!option.matches_mac("3C:EC:EF:12:34:57"));
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("forcerestart".parse::<ResetType>().unwrap(), ResetType::ForceRestart);
        assert_eq!("Pxe".parse::<BootSourceTarget>().unwrap(), BootSourceTarget::Pxe);
        assert_eq!("ipv6".parse::<PxeProtocol>().unwrap(), PxeProtocol::IPv6);
        assert_eq!("disable".parse::<TpmState>().unwrap(), TpmState::Disabled);
        assert!("reboot".parse::<ResetType>().is_err());
    }

    #[test]
    fn test_interface_matches_permanent_mac() {
        let nic = NetworkInterface {
            id: "NIC.Integrated.1-1-1".into(),
            mac: Some("00:00:00:00:00:00".into()),
            permanent_mac: Some("B0:7B:25:AA:BB:CC".into()),
            state: None,
            health: None,
            odata_id: String::new(),
        };
        assert!(nic.matches_mac("b0-7b-25-aa-bb-cc"));
    }
}
