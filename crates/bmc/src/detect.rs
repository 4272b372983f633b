//! Manufacturer detection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BmcError, Result};
use crate::models::{Collection, ComputerSystem};
use crate::session::Session;

/// Systems collection.
pub const SYSTEMS_PATH: &str = "/redfish/v1/Systems";

/// Server manufacturer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Manufacturer {
    Dell,
    Asus,
    Supermicro,
    Unknown,
}

impl Manufacturer {
    /// Classify a vendor string reported by firmware (case-insensitive substring match).
    #[must_use]
    pub fn from_vendor_string(vendor: &str) -> Self {
        let vendor = vendor.to_lowercase();
        if vendor.contains("dell") {
            Self::Dell
        } else if vendor.contains("asus") {
            Self::Asus
        } else if vendor.contains("supermicro") || vendor.contains("super micro") {
            Self::Supermicro
        } else {
            Self::Unknown
        }
    }

    /// System resource used when detection is skipped.
    #[must_use]
    pub fn default_system_path(self) -> Option<&'static str> {
        match self {
            Self::Dell => Some("/redfish/v1/Systems/System.Embedded.1"),
            Self::Asus => Some("/redfish/v1/Systems/Self"),
            Self::Supermicro => Some("/redfish/v1/Systems/1"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dell => "dell",
            Self::Asus => "asus",
            Self::Supermicro => "supermicro",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for Manufacturer {
    type Err = BmcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dell" => Ok(Self::Dell),
            "asus" => Ok(Self::Asus),
            "supermicro" | "smc" => Ok(Self::Supermicro),
            other => Err(BmcError::InvalidArgument(format!(
                "unknown manufacturer '{other}' (expected dell, asus or supermicro)"
            ))),
        }
    }
}

/// Outcome of probing a BMC.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Classified manufacturer; never [`Manufacturer::Unknown`].
    pub manufacturer: Manufacturer,
    /// Path of the first system in the collection.
    pub system_path: String,
    /// Manufacturer string as reported.
    pub raw: String,
}

/// Identify the manufacturer from the first member of the systems collection.
///
/// # Errors
/// Returns [`BmcError::UnsupportedManufacturer`] if the vendor is missing or
/// not one of the supported ones.
pub async fn detect(session: &Session) -> Result<Detection> {
    let systems: Collection = session.get_json(SYSTEMS_PATH).await?;
    let first = systems
        .members
        .first()
        .ok_or_else(|| BmcError::UnsupportedManufacturer("no systems reported".to_string()))?;
    debug!(system = %first.odata_id, "Probing system for manufacturer");

    let system: ComputerSystem = session.get_json(&first.odata_id).await?;
    let raw = system
        .manufacturer
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| {
            BmcError::UnsupportedManufacturer("system reports no manufacturer".to_string())
        })?;

    let manufacturer = Manufacturer::from_vendor_string(&raw);
    if manufacturer == Manufacturer::Unknown {
        return Err(BmcError::UnsupportedManufacturer(raw));
    }

    info!(manufacturer = %manufacturer, vendor = %raw, system = %first.odata_id, "Detected manufacturer");
    Ok(Detection {
        manufacturer,
        system_path: first.odata_id.clone(),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vendor_string() {
        assert_eq!(Manufacturer::from_vendor_string("Dell Inc."), Manufacturer::Dell);
        assert_eq!(
            Manufacturer::from_vendor_string("ASUSTeK COMPUTER INC."),
            Manufacturer::Asus
        );
        assert_eq!(Manufacturer::from_vendor_string("Supermicro"), Manufacturer::Supermicro);
        assert_eq!(
            Manufacturer::from_vendor_string("Super Micro Computer, Inc."),
            Manufacturer::Supermicro
        );
        assert_eq!(Manufacturer::from_vendor_string("Lenovo"), Manufacturer::Unknown);
        assert_eq!(Manufacturer::from_vendor_string(""), Manufacturer::Unknown);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("DELL".parse::<Manufacturer>().unwrap(), Manufacturer::Dell);
        assert_eq!("smc".parse::<Manufacturer>().unwrap(), Manufacturer::Supermicro);
        assert!(matches!(
            "hpe".parse::<Manufacturer>(),
            Err(BmcError::InvalidArgument(_))
        ));
        assert_eq!(Manufacturer::Asus.to_string(), "asus");
    }

    #[test]
    fn test_default_system_paths() {
        assert_eq!(
            Manufacturer::Dell.default_system_path(),
            Some("/redfish/v1/Systems/System.Embedded.1")
        );
        assert_eq!(Manufacturer::Unknown.default_system_path(), None);
    }
}
