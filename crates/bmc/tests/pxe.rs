//! PXE setup workflow end to end against a fake iDRAC.

mod common;

use bmc::{BmcError, Manufacturer, PxeSetupOptions, PxeState, Redfish};
use common::{
    config, dell_boot_options, dell_server, mount_boot_options, mount_dell_bios, mount_session,
    refs, DELL_SYSTEM, NIC_FQDD, NIC_MAC,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORDER: [&str; 3] = ["Boot0001", "Boot0002", "Boot0003"];

fn reset_path() -> String {
    format!("{DELL_SYSTEM}/Actions/ComputerSystem.Reset")
}

fn settings_path() -> String {
    format!("{DELL_SYSTEM}/Bios/Settings")
}

async fn mount_reset(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(reset_path().as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_settings(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(settings_path().as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"bios-7\"")
                .set_body_json(json!({ "Attributes": {} })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_enabled_nic_is_promoted_without_reboot() {
    let (server, state) = dell_server(&ORDER).await;
    mount_boot_options(&server, DELL_SYSTEM, &dell_boot_options(), None).await;
    mount_dell_bios(
        &server,
        json!({
            "PxeDev1EnDis": "Enabled",
            "PxeDev1Interface": NIC_FQDD,
            "PxeDev1Protocol": "IPv4"
        }),
    )
    .await;
    mount_reset(&server, 0).await;
    Mock::given(method("PATCH"))
        .and(path(settings_path().as_str()))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let client = Redfish::connect(config(&server)).await.unwrap();
    let report = client
        .setup_pxe(NIC_MAC, PxeSetupOptions::default())
        .await
        .unwrap();

    assert!(report.result.pxe_was_already_enabled);
    assert!(report.result.boot_order_set);
    assert!(!report.result.reboot_issued);
    assert_eq!(report.states.last(), Some(&PxeState::Completed));
    assert_eq!(state.order(), refs(&["Boot0003", "Boot0001", "Boot0002"]));
}

#[tokio::test]
async fn test_inactive_nic_is_staged_and_rebooted() {
    let (server, state) = dell_server(&ORDER).await;
    mount_boot_options(&server, DELL_SYSTEM, &dell_boot_options(), None).await;
    mount_dell_bios(&server, json!({ "PxeDev1EnDis": "Disabled" })).await;
    mount_settings(&server).await;
    Mock::given(method("PATCH"))
        .and(path(settings_path().as_str()))
        .and(header("If-Match", "\"bios-7\""))
        .and(body_partial_json(json!({
            "Attributes": {
                "PxeDev1EnDis": "Enabled",
                "PxeDev1Interface": NIC_FQDD,
                "PxeDev1Protocol": "IPv4"
            }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(DELL_SYSTEM))
        .and(body_partial_json(json!({
            "Boot": {
                "BootSourceOverrideTarget": "Pxe",
                "BootSourceOverrideEnabled": "Once"
            }
        })))
        .respond_with(ResponseTemplate::new(204))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(reset_path().as_str()))
        .and(body_partial_json(json!({ "ResetType": "GracefulRestart" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = Redfish::connect(config(&server)).await.unwrap();
    let report = client
        .setup_pxe(NIC_MAC, PxeSetupOptions::default())
        .await
        .unwrap();

    assert!(!report.result.pxe_was_already_enabled);
    assert!(!report.result.boot_order_set);
    assert!(report.result.reboot_issued);
    assert!(report.result.needs_followup());
    assert_eq!(
        report.states,
        vec![
            PxeState::Init,
            PxeState::Probing,
            PxeState::Staging,
            PxeState::RebootIssued
        ]
    );
    assert_eq!(state.order(), refs(&ORDER));
}

#[tokio::test]
async fn test_staging_without_reboot_completes() {
    let (server, _state) = dell_server(&ORDER).await;
    mount_dell_bios(&server, json!({})).await;
    mount_settings(&server).await;
    Mock::given(method("PATCH"))
        .and(path(settings_path().as_str()))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    mount_reset(&server, 0).await;

    let client = Redfish::connect(config(&server)).await.unwrap();
    let options = PxeSetupOptions {
        reboot: false,
        ..PxeSetupOptions::default()
    };
    let report = client.setup_pxe(NIC_MAC, options).await.unwrap();

    assert!(!report.result.reboot_issued);
    assert!(!report.result.boot_order_set);
    assert_eq!(report.states.last(), Some(&PxeState::Completed));
}

#[tokio::test]
async fn test_repeated_staging_conflict_aborts_before_reset() {
    let (server, _state) = dell_server(&ORDER).await;
    mount_dell_bios(&server, json!({})).await;
    mount_settings(&server).await;
    Mock::given(method("PATCH"))
        .and(path(settings_path().as_str()))
        .respond_with(ResponseTemplate::new(412))
        .expect(2)
        .mount(&server)
        .await;
    mount_reset(&server, 0).await;

    let client = Redfish::connect(config(&server)).await.unwrap();
    let err = client
        .setup_pxe(NIC_MAC, PxeSetupOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BmcError::ETagConflict(ref p) if p.ends_with("/Bios/Settings")));
}

#[tokio::test]
async fn test_unknown_mac_fails_before_any_write() {
    let (server, _state) = dell_server(&ORDER).await;
    mount_dell_bios(&server, json!({})).await;
    mount_reset(&server, 0).await;

    let client = Redfish::connect(config(&server)).await.unwrap();
    let err = client
        .setup_pxe("00:11:22:33:44:55", PxeSetupOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BmcError::InvalidArgument(_)));

    let err = client
        .setup_pxe("not-a-mac", PxeSetupOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_check_reports_bound_slot() {
    let (server, _state) = dell_server(&ORDER).await;
    mount_dell_bios(
        &server,
        json!({
            "PxeDev2EnDis": "Enabled",
            "PxeDev2Interface": NIC_FQDD,
            "PxeDev2Protocol": "IPv6"
        }),
    )
    .await;

    let client = Redfish::connect(config(&server)).await.unwrap();
    let status = client.check_pxe("b07b25aabbcc").await.unwrap();

    assert!(status.pxe_enabled);
    assert_eq!(status.slot, Some(2));
    assert_eq!(status.interface_id, NIC_FQDD);
    assert_eq!(status.protocol.as_deref(), Some("IPv6"));
}

#[tokio::test]
async fn test_asus_has_no_pxe_setup() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Null))
        .expect(0)
        .mount(&server)
        .await;

    let client = Redfish::connect(config(&server).with_manufacturer(Some(Manufacturer::Asus)))
        .await
        .unwrap();
    let err = client
        .setup_pxe(NIC_MAC, PxeSetupOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BmcError::NotImplementedForVendor { .. }));
    assert_eq!(err.exit_code(), 3);
}
