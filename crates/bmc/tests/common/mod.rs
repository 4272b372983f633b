//! Wiremock stand-in for a Redfish service.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bmc::RedfishConfig;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const SESSIONS: &str = "/redfish/v1/SessionService/Sessions";
pub const SYSTEMS: &str = "/redfish/v1/Systems";
pub const DELL_SYSTEM: &str = "/redfish/v1/Systems/System.Embedded.1";
pub const ASUS_SYSTEM: &str = "/redfish/v1/Systems/Self";
pub const DELL_CHASSIS: &str = "/redfish/v1/Chassis/System.Embedded.1";
pub const NIC_ADAPTER: &str =
    "/redfish/v1/Chassis/System.Embedded.1/NetworkAdapters/NIC.Integrated.1";
pub const NIC_FUNCTION: &str = "/redfish/v1/Chassis/System.Embedded.1/NetworkAdapters/NIC.Integrated.1/NetworkDeviceFunctions/NIC.Integrated.1-1-1";
pub const NIC_FQDD: &str = "NIC.Integrated.1-1-1";
pub const NIC_MAC: &str = "B0:7B:25:AA:BB:CC";

pub fn config(server: &MockServer) -> RedfishConfig {
    RedfishConfig::new(server.uri(), "root", "calvin")
}

pub fn refs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Accept logins; `expected` is the exact number of logins.
pub async fn mount_session(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(SESSIONS))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Auth-Token", "session-token")
                .insert_header("Location", "/redfish/v1/SessionService/Sessions/42")
                .set_body_json(json!({ "Id": "42" })),
        )
        .expect(expected)
        .mount(server)
        .await;
}

/// Systems collection pointing at `system`.
pub async fn mount_systems(server: &MockServer, system: &str) {
    Mock::given(method("GET"))
        .and(path(SYSTEMS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Members": [{ "@odata.id": system }] })),
        )
        .mount(server)
        .await;
}

/// Boot order held by the fake system; PATCHes that carry `Boot.BootOrder` replace it.
#[derive(Clone)]
pub struct BootOrderState {
    order: Arc<Mutex<Vec<String>>>,
    manufacturer: String,
    system: String,
}

impl BootOrderState {
    pub fn new(manufacturer: &str, system: &str, order: &[&str]) -> Self {
        Self {
            order: Arc::new(Mutex::new(refs(order))),
            manufacturer: manufacturer.to_string(),
            system: system.to_string(),
        }
    }

    pub fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }

    /// Serve GET and PATCH of the system resource.
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(self.system.as_str()))
            .respond_with(SystemGet(self.clone()))
            .named("GET system")
            .mount(server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(self.system.as_str()))
            .respond_with(SystemPatch(self.clone()))
            .named("PATCH system")
            .mount(server)
            .await;
    }
}

struct SystemGet(BootOrderState);

impl Respond for SystemGet {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let state = &self.0;
        ResponseTemplate::new(200)
            .insert_header("ETag", "\"system-v1\"")
            .set_body_json(json!({
                "@odata.id": state.system,
                "Id": state.system.rsplit('/').next(),
                "Manufacturer": state.manufacturer,
                "Model": "Test Model",
                "Boot": {
                    "BootOrder": state.order(),
                    "BootSourceOverrideEnabled": "Disabled"
                },
                "Actions": {
                    "#ComputerSystem.Reset": {
                        "target": format!("{}/Actions/ComputerSystem.Reset", state.system),
                        "ResetType@Redfish.AllowableValues": [
                            "On", "ForceOff", "ForceRestart", "GracefulRestart", "PushPowerButton"
                        ]
                    }
                }
            }))
    }
}

struct SystemPatch(BootOrderState);

impl Respond for SystemPatch {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = request.body_json::<Value>() else {
            return ResponseTemplate::new(400);
        };
        if let Some(order) = body.pointer("/Boot/BootOrder").and_then(Value::as_array) {
            *self.0.order.lock().unwrap() = order
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        ResponseTemplate::new(204)
    }
}

/// One boot option of the fake system.
pub struct FakeBootOption {
    pub reference: &'static str,
    pub display_name: &'static str,
    pub related: Option<&'static str>,
}

/// Boot options collection and members, optionally asserting how often the collection is read.
pub async fn mount_boot_options(
    server: &MockServer,
    system: &str,
    options: &[FakeBootOption],
    expected_collection_fetches: Option<u64>,
) {
    let collection = format!("{system}/BootOptions");
    let members: Vec<Value> = options
        .iter()
        .map(|o| json!({ "@odata.id": format!("{collection}/{}", o.reference) }))
        .collect();

    let mut mock = Mock::given(method("GET"))
        .and(path(collection.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Members": members })))
        .named("GET boot options");
    if let Some(expected) = expected_collection_fetches {
        mock = mock.expect(expected);
    }
    mock.mount(server).await;

    for option in options {
        let member = format!("{collection}/{}", option.reference);
        let related: Vec<Value> = option
            .related
            .iter()
            .map(|r| json!({ "@odata.id": r }))
            .collect();
        Mock::given(method("GET"))
            .and(path(member.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "@odata.id": member,
                "Id": option.reference,
                "BootOptionReference": option.reference,
                "DisplayName": option.display_name,
                "RelatedItem": related
            })))
            .mount(server)
            .await;
    }
}

pub fn dell_boot_options() -> Vec<FakeBootOption> {
    vec![
        FakeBootOption {
            reference: "Boot0001",
            display_name: "Hard drive C: PERC H755",
            related: None,
        },
        FakeBootOption {
            reference: "Boot0002",
            display_name: "Virtual Optical Drive",
            related: None,
        },
        FakeBootOption {
            reference: "Boot0003",
            display_name: "PXE Device 1: Integrated NIC 1 Port 1 Partition 1",
            related: Some(NIC_FUNCTION),
        },
    ]
}

/// Dell network adapter with one function owning [`NIC_MAC`].
pub async fn mount_dell_nic(server: &MockServer) {
    let functions = format!("{NIC_ADAPTER}/NetworkDeviceFunctions");

    Mock::given(method("GET"))
        .and(path(format!("{DELL_CHASSIS}/NetworkAdapters").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Members": [{ "@odata.id": NIC_ADAPTER }] })),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(functions.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Members": [{ "@odata.id": NIC_FUNCTION }] })),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(NIC_FUNCTION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.id": NIC_FUNCTION,
            "Id": NIC_FQDD,
            "Ethernet": { "MACAddress": NIC_MAC, "PermanentMACAddress": NIC_MAC },
            "Status": { "State": "Enabled", "Health": "OK" }
        })))
        .mount(server)
        .await;
}

/// Current BIOS attributes of the Dell system.
pub async fn mount_dell_bios(server: &MockServer, attributes: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{DELL_SYSTEM}/Bios").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Attributes": attributes })),
        )
        .mount(server)
        .await;
}

/// A Dell server with detection, boot options and one NIC wired up.
pub async fn dell_server(order: &[&str]) -> (MockServer, BootOrderState) {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    mount_systems(&server, DELL_SYSTEM).await;
    let state = BootOrderState::new("Dell Inc.", DELL_SYSTEM, order);
    state.mount(&server).await;
    mount_dell_nic(&server).await;
    (server, state)
}
