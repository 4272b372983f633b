//! Vendor implementations and capability dispatch.
//!
//! [`VendorImpl::resolve`] maps a [`Manufacturer`] to its implementation. The
//! accessor for each capability either hands out the capability trait object
//! or fails with [`BmcError::NotImplementedForVendor`].

pub mod asus;
pub mod common;
pub mod dell;
pub mod supermicro;
mod traits;

use std::sync::Arc;

pub use asus::Asus;
pub use dell::Dell;
pub use supermicro::Supermicro;
pub use traits::{
    BootManagement, BootOption, BootOptionKind, BootSourceTarget, Capability, FirmwareComponent,
    FirmwareUpdate, FirmwareUpdateResult, NetworkInterface, NicDiscovery, NicPxeStatus,
    PxeProtocol, PxeSetup, ResetType, TpmManagement, TpmState, UpdateServiceStatus,
};

#[cfg(test)]
pub use traits::{MockBootManagement, MockPxeSetup};

use crate::detect::Manufacturer;
use crate::error::{BmcError, Result};
use crate::session::Session;

const DELL_CAPABILITIES: &[Capability] = &[
    Capability::BootManagement,
    Capability::FirmwareUpdate,
    Capability::NicDiscovery,
    Capability::PxeSetup,
];

const ASUS_CAPABILITIES: &[Capability] = &[Capability::BootManagement, Capability::TpmManagement];

const SUPERMICRO_CAPABILITIES: &[Capability] =
    &[Capability::BootManagement, Capability::FirmwareUpdate];

/// Concrete implementation for one manufacturer.
#[derive(Debug, Clone)]
pub enum VendorImpl {
    Dell(Dell),
    Asus(Asus),
    Supermicro(Supermicro),
}

impl VendorImpl {
    /// Resolve the implementation for `manufacturer`.
    ///
    /// `system_path` overrides the vendor's default system resource.
    ///
    /// # Errors
    /// Returns [`BmcError::UnsupportedManufacturer`] for [`Manufacturer::Unknown`].
    pub fn resolve(
        manufacturer: Manufacturer,
        session: Arc<Session>,
        system_path: Option<String>,
    ) -> Result<Self> {
        let system_path = system_path
            .or_else(|| manufacturer.default_system_path().map(str::to_string))
            .ok_or_else(|| BmcError::UnsupportedManufacturer(manufacturer.to_string()))?;

        match manufacturer {
            Manufacturer::Dell => Ok(Self::Dell(Dell::new(session, system_path))),
            Manufacturer::Asus => Ok(Self::Asus(Asus::new(session, system_path))),
            Manufacturer::Supermicro => {
                Ok(Self::Supermicro(Supermicro::new(session, system_path)))
            }
            Manufacturer::Unknown => Err(BmcError::UnsupportedManufacturer(
                manufacturer.to_string(),
            )),
        }
    }

    /// Manufacturer this implementation serves.
    #[must_use]
    pub fn manufacturer(&self) -> Manufacturer {
        match self {
            Self::Dell(_) => Manufacturer::Dell,
            Self::Asus(_) => Manufacturer::Asus,
            Self::Supermicro(_) => Manufacturer::Supermicro,
        }
    }

    /// System resource path.
    #[must_use]
    pub fn system_path(&self) -> &str {
        match self {
            Self::Dell(v) => v.system_path(),
            Self::Asus(v) => v.system_path(),
            Self::Supermicro(v) => v.system_path(),
        }
    }

    /// Capabilities provided.
    #[must_use]
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Dell(_) => DELL_CAPABILITIES,
            Self::Asus(_) => ASUS_CAPABILITIES,
            Self::Supermicro(_) => SUPERMICRO_CAPABILITIES,
        }
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    fn missing(&self, capability: Capability) -> BmcError {
        BmcError::not_implemented(capability, self.manufacturer())
    }

    /// Boot management.
    ///
    /// # Errors
    /// Never fails today; every vendor manages boot.
    pub fn boot_management(&self) -> Result<&dyn BootManagement> {
        let boot: &dyn BootManagement = match self {
            Self::Dell(v) => v,
            Self::Asus(v) => v,
            Self::Supermicro(v) => v,
        };
        Ok(boot)
    }

    /// Firmware updates.
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] for ASUS.
    pub fn firmware(&self) -> Result<&dyn FirmwareUpdate> {
        match self {
            Self::Dell(v) => Ok(v),
            Self::Supermicro(v) => Ok(v),
            Self::Asus(_) => Err(self.missing(Capability::FirmwareUpdate)),
        }
    }

    /// NIC discovery.
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] except for Dell.
    pub fn nic_discovery(&self) -> Result<&dyn NicDiscovery> {
        match self {
            Self::Dell(v) => Ok(v),
            Self::Asus(_) | Self::Supermicro(_) => Err(self.missing(Capability::NicDiscovery)),
        }
    }

    /// TPM management.
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] except for ASUS.
    pub fn tpm(&self) -> Result<&dyn TpmManagement> {
        match self {
            Self::Asus(v) => Ok(v),
            Self::Dell(_) | Self::Supermicro(_) => Err(self.missing(Capability::TpmManagement)),
        }
    }

    /// PXE setup.
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] except for Dell.
    pub fn pxe_setup(&self) -> Result<&dyn PxeSetup> {
        match self {
            Self::Dell(v) => Ok(v),
            Self::Asus(_) | Self::Supermicro(_) => Err(self.missing(Capability::PxeSetup)),
        }
    }

    /// Dell OEM operations.
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] for other vendors.
    pub fn as_dell(&self) -> Result<&Dell> {
        match self {
            Self::Dell(v) => Ok(v),
            _ => Err(BmcError::not_implemented("Dell OEM extension", self.manufacturer())),
        }
    }

    /// ASUS-specific operations.
    ///
    /// # Errors
    /// Returns [`BmcError::NotImplementedForVendor`] for other vendors.
    pub fn as_asus(&self) -> Result<&Asus> {
        match self {
            Self::Asus(v) => Ok(v),
            _ => Err(BmcError::not_implemented("ASUS extension", self.manufacturer())),
        }
    }
}
