//! Redfish operations that are identical across vendors.

use std::path::Path;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::traits::{
    BootOption, BootOptionKind, BootSourceTarget, FirmwareComponent, FirmwareUpdateResult,
    ResetType, UpdateServiceStatus,
};
use crate::detect::Manufacturer;
use crate::error::{BmcError, Result};
use crate::mac;
use crate::models::{
    last_segment, BootOptionResource, Collection, ComputerSystem, SoftwareInventory, UpdateService,
};
use crate::session::Session;

/// Update service root.
pub const UPDATE_SERVICE_PATH: &str = "/redfish/v1/UpdateService";

/// Firmware inventory used when the update service does not link one.
const FIRMWARE_INVENTORY_PATH: &str = "/redfish/v1/UpdateService/FirmwareInventory";

/// Keys under which BMCs publish the allowed reset types.
const RESET_ALLOWABLE_KEYS: [&str; 3] = [
    "ResetType@Redfish.AllowableValues",
    "AllowableValues",
    "@Redfish.AllowableValues",
];

/// Fetch every member of a collection, skipping members the BMC refuses to return.
///
/// # Errors
/// Returns an error if the collection itself cannot be read or a transport error occurs.
pub async fn collection_members<T: serde::de::DeserializeOwned>(
    session: &Session,
    path: &str,
) -> Result<Vec<T>> {
    let collection: Collection = session.get_json(path).await?;

    let responses = join_all(
        collection
            .members
            .iter()
            .map(|member| session.get(&member.odata_id)),
    )
    .await;

    let mut items = Vec::with_capacity(responses.len());
    for (member, response) in collection.members.iter().zip(responses) {
        let response = response?;
        if !response.status.is_success() {
            warn!(member = %member.odata_id, status = %response.status, "Skipping unreadable collection member");
            continue;
        }
        items.push(response.json()?);
    }

    debug!(path = %path, count = items.len(), "Expanded collection");
    Ok(items)
}

/// Raw boot option resources of a system.
///
/// # Errors
/// Returns an error if the boot option collection cannot be read.
pub async fn boot_option_resources(
    session: &Session,
    system_path: &str,
) -> Result<Vec<BootOptionResource>> {
    collection_members(session, &format!("{system_path}/BootOptions")).await
}

/// Convert a resource into a [`BootOption`], taking the MAC from the UEFI
/// device path unless one is supplied.
#[must_use]
pub fn to_boot_option(resource: &BootOptionResource, resolved_mac: Option<String>) -> BootOption {
    let reference = resource
        .boot_option_reference
        .clone()
        .or_else(|| resource.id.clone())
        .unwrap_or_else(|| last_segment(&resource.odata_id).to_string());
    let display_name = resource
        .display_name
        .clone()
        .or_else(|| resource.name.clone())
        .unwrap_or_else(|| reference.clone());
    let device_path = resource.uefi_device_path.as_deref();

    let mac = resolved_mac
        .and_then(|m| mac::normalize(&m).ok())
        .map(|n| mac::display(&n))
        .or_else(|| device_path.and_then(mac::from_uefi_device_path));
    let kind = BootOptionKind::classify(&display_name, device_path);

    BootOption {
        reference,
        display_name,
        mac,
        kind: Some(kind),
        odata_id: resource.odata_id.clone(),
    }
}

/// Boot options with MACs taken from UEFI device paths.
///
/// # Errors
/// Returns an error if the boot option collection cannot be read.
pub async fn boot_options(session: &Session, system_path: &str) -> Result<Vec<BootOption>> {
    Ok(boot_option_resources(session, system_path)
        .await?
        .iter()
        .map(|resource| to_boot_option(resource, None))
        .collect())
}

/// The computer system resource.
///
/// # Errors
/// Returns an error if the system cannot be read.
pub async fn system(session: &Session, system_path: &str) -> Result<ComputerSystem> {
    session.get_json(system_path).await
}

/// `Boot.BootOrder` of the resource at `path`.
///
/// # Errors
/// Returns an error if the resource cannot be read.
pub async fn boot_order(session: &Session, path: &str) -> Result<Vec<String>> {
    let system = system(session, path).await?;
    Ok(system.boot.unwrap_or_default().boot_order)
}

/// PATCH body replacing the boot order.
#[must_use]
pub fn boot_order_body(order: &[String]) -> Value {
    json!({ "Boot": { "BootOrder": order } })
}

/// PATCH body for a one-time boot override.
#[must_use]
pub fn one_time_boot_body(target: BootSourceTarget) -> Value {
    json!({
        "Boot": {
            "BootSourceOverrideEnabled": "Once",
            "BootSourceOverrideTarget": target.as_str(),
        }
    })
}

fn reset_action(system: &ComputerSystem) -> Option<&Value> {
    system
        .actions
        .get("#ComputerSystem.Reset")
        .or_else(|| system.actions.get("ComputerSystem.Reset"))
}

fn allowed_reset_types(action: Option<&Value>) -> Vec<ResetType> {
    let Some(action) = action else {
        return Vec::new();
    };

    RESET_ALLOWABLE_KEYS
        .iter()
        .find_map(|key| action.get(*key).and_then(Value::as_array))
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|v| v.parse::<ResetType>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Pick a reset type: the requested one if allowed, otherwise a restart.
///
/// # Errors
/// Returns [`BmcError::InvalidArgument`] if `requested` is not in a non-empty allowed list.
pub fn choose_reset_type(allowed: &[ResetType], requested: Option<ResetType>) -> Result<ResetType> {
    if let Some(requested) = requested {
        if allowed.is_empty() || allowed.contains(&requested) {
            return Ok(requested);
        }
        let allowed: Vec<&str> = allowed.iter().map(|t| t.as_str()).collect();
        return Err(BmcError::InvalidArgument(format!(
            "reset type {requested} not supported (allowed: {})",
            allowed.join(", ")
        )));
    }

    let chosen = [ResetType::GracefulRestart, ResetType::ForceRestart]
        .into_iter()
        .find(|preferred| allowed.contains(preferred))
        .or_else(|| allowed.first().copied())
        .unwrap_or(ResetType::ForceRestart);
    Ok(chosen)
}

/// Reset types advertised by the system.
///
/// # Errors
/// Returns an error if the system cannot be read.
pub async fn reset_types(session: &Session, system_path: &str) -> Result<Vec<ResetType>> {
    let system = system(session, system_path).await?;
    Ok(allowed_reset_types(reset_action(&system)))
}

/// Issue `ComputerSystem.Reset`.
///
/// # Errors
/// Returns an error if the reset type is not allowed or the BMC rejects it.
pub async fn reset_system(
    session: &Session,
    system_path: &str,
    requested: Option<ResetType>,
) -> Result<ResetType> {
    let system = system(session, system_path).await?;
    let action = reset_action(&system);
    let reset_type = choose_reset_type(&allowed_reset_types(action), requested)?;

    let target = action
        .and_then(|a| a.get("target"))
        .and_then(Value::as_str)
        .map_or_else(
            || format!("{system_path}/Actions/ComputerSystem.Reset"),
            str::to_string,
        );

    info!(system = %system_path, reset_type = %reset_type, "Resetting system");
    session
        .post(&target, &json!({ "ResetType": reset_type.as_str() }))
        .await?
        .error_for_status()?;
    Ok(reset_type)
}

// ============================================================================
// Firmware
// ============================================================================

async fn update_service(session: &Session) -> Result<UpdateService> {
    session.get_json(UPDATE_SERVICE_PATH).await
}

/// Installed firmware components.
///
/// # Errors
/// Returns an error if the inventory cannot be read.
pub async fn firmware_inventory(session: &Session) -> Result<Vec<FirmwareComponent>> {
    let service = update_service(session).await?;
    let path = service
        .firmware_inventory
        .map_or_else(|| FIRMWARE_INVENTORY_PATH.to_string(), |link| link.odata_id);

    let items: Vec<SoftwareInventory> = collection_members(session, &path).await?;
    Ok(items
        .into_iter()
        .map(|item| FirmwareComponent {
            name: item.name.unwrap_or_else(|| item.id.clone()),
            version: item.version.unwrap_or_default(),
            updateable: item.updateable.unwrap_or(false),
            id: item.id,
        })
        .collect())
}

/// Update service summary.
///
/// # Errors
/// Returns an error if the update service cannot be read.
pub async fn update_service_status(session: &Session) -> Result<UpdateServiceStatus> {
    let service = update_service(session).await?;
    Ok(UpdateServiceStatus {
        enabled: service.service_enabled.unwrap_or(false),
        state: service.status.state,
        health: service.status.health,
        multipart_push_uri: service.multipart_http_push_uri,
    })
}

/// Upload a firmware image through `MultipartHttpPushUri`.
///
/// The file is read before any network call.
///
/// # Errors
/// Returns [`BmcError::FileNotFound`] for a missing image and
/// [`BmcError::NotImplementedForVendor`] when the BMC offers no multipart endpoint.
pub async fn push_firmware(
    session: &Session,
    manufacturer: Manufacturer,
    image: &Path,
    parameters: &Value,
) -> Result<FirmwareUpdateResult> {
    let payload = read_image(image).await?;
    let file_name = image
        .file_name()
        .map_or_else(|| "firmware.bin".to_string(), |n| n.to_string_lossy().into_owned());

    let service = update_service(session).await?;
    let Some(push_uri) = service.multipart_http_push_uri else {
        return Err(BmcError::not_implemented(
            "multipart firmware upload",
            manufacturer,
        ));
    };

    let response = session
        .upload(&push_uri, parameters, &file_name, payload)
        .await?
        .error_for_status()?;

    let task = response.location().map(str::to_string).or_else(|| {
        response
            .body
            .get("@odata.id")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    info!(file = %file_name, status = %response.status, task = ?task, "Firmware upload accepted");

    Ok(FirmwareUpdateResult {
        status: response.status.as_u16(),
        task,
    })
}

async fn read_image(image: &Path) -> Result<Vec<u8>> {
    match tokio::fs::read(image).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(BmcError::FileNotFound(image.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
