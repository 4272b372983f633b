//! BIOS PXE device slots (`PxeDev{n}*` attributes).

use serde_json::{json, Map, Value};

use crate::error::{BmcError, Result};
use crate::vendors::traits::PxeProtocol;

/// Number of PXE device slots exposed by the BIOS.
pub const PXE_DEVICE_SLOTS: u8 = 4;

pub fn enable_key(slot: u8) -> String {
    format!("PxeDev{slot}EnDis")
}

pub fn interface_key(slot: u8) -> String {
    format!("PxeDev{slot}Interface")
}

pub fn protocol_key(slot: u8) -> String {
    format!("PxeDev{slot}Protocol")
}

fn text<'a>(attributes: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    attributes.get(key).and_then(Value::as_str)
}

/// Slot whose interface is `fqdd`.
#[must_use]
pub fn find_slot(attributes: &Map<String, Value>, fqdd: &str) -> Option<u8> {
    (1..=PXE_DEVICE_SLOTS).find(|slot| {
        text(attributes, &interface_key(*slot)).is_some_and(|iface| iface.eq_ignore_ascii_case(fqdd))
    })
}

/// Whether `slot` is enabled.
#[must_use]
pub fn slot_enabled(attributes: &Map<String, Value>, slot: u8) -> bool {
    text(attributes, &enable_key(slot)) == Some("Enabled")
}

/// Configured protocol of `slot`.
#[must_use]
pub fn slot_protocol(attributes: &Map<String, Value>, slot: u8) -> Option<String> {
    text(attributes, &protocol_key(slot)).map(str::to_string)
}

/// First slot that is not enabled.
#[must_use]
pub fn free_slot(attributes: &Map<String, Value>) -> Option<u8> {
    (1..=PXE_DEVICE_SLOTS).find(|slot| !slot_enabled(attributes, *slot))
}

/// Slot to program for `fqdd`: the one already bound to it, else the first free one.
///
/// # Errors
/// Returns [`BmcError::InvalidArgument`] when every slot is taken by another NIC.
pub fn allocate_slot(attributes: &Map<String, Value>, fqdd: &str) -> Result<u8> {
    find_slot(attributes, fqdd)
        .or_else(|| free_slot(attributes))
        .ok_or_else(|| {
            BmcError::InvalidArgument(format!(
                "all {PXE_DEVICE_SLOTS} PXE device slots are in use, none free for {fqdd}"
            ))
        })
}

/// Staged settings body enabling `slot` for `fqdd`, applied on the next reset.
#[must_use]
pub fn staging_body(slot: u8, fqdd: &str, protocol: PxeProtocol) -> Value {
    let mut attributes = Map::new();
    attributes.insert(enable_key(slot), json!("Enabled"));
    attributes.insert(interface_key(slot), json!(fqdd));
    attributes.insert(protocol_key(slot), json!(protocol.as_str()));

    json!({
        "@Redfish.SettingsApplyTime": { "ApplyTime": "OnReset" },
        "Attributes": attributes,
    })
}
