//! PXE setup workflow.
//!
//! ```text
//! Init -> Probing -> AlreadyEnabled -> Completed
//!                 -> Staging        -> RebootIssued | Completed
//! (any error)     -> Failed
//! ```
//!
//! When PXE is already enabled on the NIC, its boot option is moved to the
//! front of the boot order. Otherwise the NIC is staged for network boot and a
//! one-time PXE boot is requested; the firmware only registers the new boot
//! option after a reboot, so promotion has to be requested again once the
//! system is back. The workflow never waits for the reboot.

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::BootOptionCache;
use crate::error::{BmcError, Result};
use crate::mac;
use crate::vendors::{BootManagement, BootOptionKind, BootSourceTarget, PxeProtocol, PxeSetup};

/// Workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PxeState {
    Init,
    Probing,
    AlreadyEnabled,
    Staging,
    Completed,
    /// Staged and rebooting; run again once the system is back.
    RebootIssued,
    Failed,
}

impl PxeState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Outcome of a PXE setup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PxeSetupResult {
    pub pxe_was_already_enabled: bool,
    pub boot_order_set: bool,
    pub reboot_issued: bool,
}

impl PxeSetupResult {
    /// Whether boot order promotion still has to be requested after the reboot.
    #[must_use]
    pub fn needs_followup(&self) -> bool {
        !self.boot_order_set
    }
}

/// Settings for a PXE setup run.
#[derive(Debug, Clone, Copy)]
pub struct PxeSetupOptions {
    /// Protocol staged on the NIC.
    pub protocol: PxeProtocol,
    /// Reset the system after staging.
    pub reboot: bool,
}

impl Default for PxeSetupOptions {
    fn default() -> Self {
        Self {
            protocol: PxeProtocol::IPv4,
            reboot: true,
        }
    }
}

/// Drives PXE enablement for one NIC.
pub struct PxeSetupOrchestrator<'a> {
    boot: &'a dyn BootManagement,
    pxe: &'a dyn PxeSetup,
    cache: &'a BootOptionCache,
    options: PxeSetupOptions,
    state: PxeState,
    history: Vec<PxeState>,
}

impl<'a> PxeSetupOrchestrator<'a> {
    #[must_use]
    pub fn new(
        boot: &'a dyn BootManagement,
        pxe: &'a dyn PxeSetup,
        cache: &'a BootOptionCache,
        options: PxeSetupOptions,
    ) -> Self {
        Self {
            boot,
            pxe,
            cache,
            options,
            state: PxeState::Init,
            history: vec![PxeState::Init],
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PxeState {
        self.state
    }

    /// States visited by the last run, starting with `Init`.
    #[must_use]
    pub fn history(&self) -> &[PxeState] {
        &self.history
    }

    fn transition(&mut self, next: PxeState) {
        info!(from = ?self.state, to = ?next, "PXE setup state change");
        self.state = next;
        self.history.push(next);
    }

    /// Enable PXE for the NIC owning `mac`.
    ///
    /// Every run starts again from `Init`, so calling this after the reboot
    /// promotes the now registered boot option.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] for an unknown NIC, plus any
    /// error from the vendor calls. The state is `Failed` afterwards.
    pub async fn run(&mut self, mac: &str) -> Result<PxeSetupResult> {
        self.state = PxeState::Init;
        self.history = vec![PxeState::Init];

        match self.execute(mac).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(mac = %mac, error = %e, "PXE setup failed");
                self.transition(PxeState::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self, mac: &str) -> Result<PxeSetupResult> {
        mac::normalize(mac)?;

        self.transition(PxeState::Probing);
        let nic = self.pxe.nic_pxe_status(mac).await?;

        if nic.pxe_enabled {
            self.transition(PxeState::AlreadyEnabled);
            promote_boot_option(self.boot, self.cache, mac).await?;
            self.transition(PxeState::Completed);
            return Ok(PxeSetupResult {
                pxe_was_already_enabled: true,
                boot_order_set: true,
                reboot_issued: false,
            });
        }

        self.transition(PxeState::Staging);
        self.pxe.stage_pxe(&nic, self.options.protocol).await?;
        self.boot.set_one_time_boot(BootSourceTarget::Pxe).await?;
        self.cache.invalidate_all().await;

        if !self.options.reboot {
            info!(mac = %mac, "PXE staged, reboot suppressed");
            self.transition(PxeState::Completed);
            return Ok(PxeSetupResult {
                pxe_was_already_enabled: false,
                boot_order_set: false,
                reboot_issued: false,
            });
        }

        let reset_type = self.boot.reset_system(None).await?;
        info!(mac = %mac, reset_type = %reset_type, "PXE staged, reboot issued");
        self.transition(PxeState::RebootIssued);
        Ok(PxeSetupResult {
            pxe_was_already_enabled: false,
            boot_order_set: false,
            reboot_issued: true,
        })
    }
}

/// Move the boot option of `mac` to the front of the boot order.
///
/// Network boot options win over other options with the same MAC. Other
/// entries keep their relative order. No write is issued when the option
/// already comes first.
///
/// # Errors
/// Returns [`BmcError::InvalidArgument`] if no boot option has this MAC.
pub async fn promote_boot_option(
    boot: &dyn BootManagement,
    cache: &BootOptionCache,
    mac: &str,
) -> Result<Vec<String>> {
    let options = cache.boot_options(boot, false).await?;
    let matching: Vec<_> = options.iter().filter(|o| o.matches_mac(mac)).collect();
    let target = matching
        .iter()
        .find(|o| o.kind == Some(BootOptionKind::Pxe))
        .or_else(|| matching.first())
        .ok_or_else(|| BmcError::InvalidArgument(format!("no boot option found with MAC {mac}")))?;

    let current = cache.boot_order(boot, true).await?;
    let order = promoted(&current, &target.reference);
    if order == current {
        info!(reference = %target.reference, "Boot option already first");
        return Ok(order);
    }

    info!(mac = %mac, reference = %target.reference, "Promoting boot option");
    cache.set_boot_order(boot, &order).await?;
    Ok(order)
}

/// `order` with `reference` moved (or prepended) to the front.
fn promoted(order: &[String], reference: &str) -> Vec<String> {
    std::iter::once(reference.to_string())
        .chain(order.iter().filter(|r| *r != reference).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendors::{BootOption, MockBootManagement, MockPxeSetup, NicPxeStatus, ResetType};

    const MAC: &str = "B0:7B:25:AA:BB:CC";

    fn refs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn options() -> Vec<BootOption> {
        vec![
            BootOption {
                reference: "Boot0001".into(),
                display_name: "Hard drive C:".into(),
                mac: None,
                kind: Some(BootOptionKind::Hdd),
                odata_id: "/redfish/v1/Systems/System.Embedded.1/BootOptions/Boot0001".into(),
            },
            BootOption {
                reference: "Boot0002".into(),
                display_name: "UEFI HTTPv4 NIC.Integrated.1-1-1".into(),
                mac: Some(MAC.into()),
                kind: Some(BootOptionKind::Http),
                odata_id: "/redfish/v1/Systems/System.Embedded.1/BootOptions/Boot0002".into(),
            },
            BootOption {
                reference: "Boot0003".into(),
                display_name: "PXE Device 1: Integrated NIC 1 Port 1".into(),
                mac: Some(MAC.into()),
                kind: Some(BootOptionKind::Pxe),
                odata_id: "/redfish/v1/Systems/System.Embedded.1/BootOptions/Boot0003".into(),
            },
        ]
    }

    fn nic(enabled: bool) -> NicPxeStatus {
        NicPxeStatus {
            mac: MAC.into(),
            interface_id: "NIC.Integrated.1-1-1".into(),
            pxe_enabled: enabled,
            slot: enabled.then_some(1),
            protocol: None,
        }
    }

    #[test]
    fn test_promoted_is_stable() {
        let order = refs(&["Boot0001", "Boot0002", "Boot0003", "Boot0004"]);
        assert_eq!(
            promoted(&order, "Boot0003"),
            refs(&["Boot0003", "Boot0001", "Boot0002", "Boot0004"])
        );
        assert_eq!(promoted(&order, "Boot0009")[0], "Boot0009");
        assert_eq!(promoted(&order, "Boot0009").len(), 5);
    }

    #[tokio::test]
    async fn test_already_enabled_promotes_without_reset() {
        let mut pxe = MockPxeSetup::new();
        pxe.expect_nic_pxe_status().times(1).returning(|_| Ok(nic(true)));
        pxe.expect_stage_pxe().times(0);

        let mut boot = MockBootManagement::new();
        boot.expect_boot_options().returning(|| Ok(options()));
        boot.expect_boot_order()
            .returning(|| Ok(refs(&["Boot0001", "Boot0002", "Boot0003"])));
        boot.expect_set_boot_order()
            .withf(|order| order.to_vec() == refs(&["Boot0003", "Boot0001", "Boot0002"]))
            .times(1)
            .returning(|_| Ok(()));
        boot.expect_reset_system().times(0);
        boot.expect_set_one_time_boot().times(0);

        let cache = BootOptionCache::new();
        let mut orchestrator =
            PxeSetupOrchestrator::new(&boot, &pxe, &cache, PxeSetupOptions::default());
        let result = orchestrator.run(MAC).await.unwrap();

        assert_eq!(
            result,
            PxeSetupResult {
                pxe_was_already_enabled: true,
                boot_order_set: true,
                reboot_issued: false,
            }
        );
        assert!(!result.needs_followup());
        assert_eq!(
            orchestrator.history(),
            &[
                PxeState::Init,
                PxeState::Probing,
                PxeState::AlreadyEnabled,
                PxeState::Completed
            ]
        );
    }

    #[tokio::test]
    async fn test_inactive_nic_is_staged_and_rebooted_once() {
        let mut pxe = MockPxeSetup::new();
        pxe.expect_nic_pxe_status().times(1).returning(|_| Ok(nic(false)));
        pxe.expect_stage_pxe()
            .withf(|nic, protocol| nic.interface_id == "NIC.Integrated.1-1-1" && *protocol == PxeProtocol::IPv4)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut boot = MockBootManagement::new();
        boot.expect_set_one_time_boot()
            .withf(|target| *target == BootSourceTarget::Pxe)
            .times(1)
            .returning(|_| Ok(()));
        boot.expect_reset_system()
            .times(1)
            .returning(|_| Ok(ResetType::GracefulRestart));
        boot.expect_set_boot_order().times(0);

        let cache = BootOptionCache::new();
        let mut orchestrator =
            PxeSetupOrchestrator::new(&boot, &pxe, &cache, PxeSetupOptions::default());
        let result = orchestrator.run(MAC).await.unwrap();

        assert_eq!(
            result,
            PxeSetupResult {
                pxe_was_already_enabled: false,
                boot_order_set: false,
                reboot_issued: true,
            }
        );
        assert!(result.needs_followup());
        assert_eq!(orchestrator.state(), PxeState::RebootIssued);
        assert!(!orchestrator.state().is_terminal());
    }

    #[tokio::test]
    async fn test_reboot_can_be_suppressed() {
        let mut pxe = MockPxeSetup::new();
        pxe.expect_nic_pxe_status().returning(|_| Ok(nic(false)));
        pxe.expect_stage_pxe().times(1).returning(|_, _| Ok(()));

        let mut boot = MockBootManagement::new();
        boot.expect_set_one_time_boot().times(1).returning(|_| Ok(()));
        boot.expect_reset_system().times(0);

        let cache = BootOptionCache::new();
        let options = PxeSetupOptions {
            protocol: PxeProtocol::IPv6,
            reboot: false,
        };
        let mut orchestrator = PxeSetupOrchestrator::new(&boot, &pxe, &cache, options);
        let result = orchestrator.run(MAC).await.unwrap();

        assert!(!result.reboot_issued);
        assert_eq!(orchestrator.state(), PxeState::Completed);
    }

    #[tokio::test]
    async fn test_unknown_nic_fails() {
        let mut pxe = MockPxeSetup::new();
        pxe.expect_nic_pxe_status()
            .returning(|mac| Err(BmcError::InvalidArgument(format!("no network interface with MAC {mac}"))));
        let boot = MockBootManagement::new();

        let cache = BootOptionCache::new();
        let mut orchestrator =
            PxeSetupOrchestrator::new(&boot, &pxe, &cache, PxeSetupOptions::default());
        let err = orchestrator.run("00:11:22:33:44:55").await.unwrap_err();

        assert!(matches!(err, BmcError::InvalidArgument(_)));
        assert_eq!(orchestrator.state(), PxeState::Failed);
        assert!(orchestrator.state().is_terminal());
    }

    #[tokio::test]
    async fn test_staging_conflict_stops_before_reset() {
        let mut pxe = MockPxeSetup::new();
        pxe.expect_nic_pxe_status().returning(|_| Ok(nic(false)));
        pxe.expect_stage_pxe()
            .times(1)
            .returning(|_, _| Err(BmcError::ETagConflict("/redfish/v1/Systems/System.Embedded.1/Bios/Settings".into())));

        let mut boot = MockBootManagement::new();
        boot.expect_set_one_time_boot().times(0);
        boot.expect_reset_system().times(0);

        let cache = BootOptionCache::new();
        let mut orchestrator =
            PxeSetupOrchestrator::new(&boot, &pxe, &cache, PxeSetupOptions::default());
        let err = orchestrator.run(MAC).await.unwrap_err();

        assert!(matches!(err, BmcError::ETagConflict(_)));
        assert_eq!(
            orchestrator.history(),
            &[PxeState::Init, PxeState::Probing, PxeState::Staging, PxeState::Failed]
        );
    }

    #[tokio::test]
    async fn test_malformed_mac_makes_no_calls() {
        let mut pxe = MockPxeSetup::new();
        pxe.expect_nic_pxe_status().times(0);
        let boot = MockBootManagement::new();

        let cache = BootOptionCache::new();
        let mut orchestrator =
            PxeSetupOrchestrator::new(&boot, &pxe, &cache, PxeSetupOptions::default());
        let err = orchestrator.run("not-a-mac").await.unwrap_err();

        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_ARGUMENTS);
    }

    #[tokio::test]
    async fn test_promotion_without_matching_option_fails() {
        let mut boot = MockBootManagement::new();
        boot.expect_boot_options().returning(|| Ok(options()));
        boot.expect_set_boot_order().times(0);

        let cache = BootOptionCache::new();
        let err = promote_boot_option(&boot, &cache, "00:11:22:33:44:55")
            .await
            .unwrap_err();
        assert!(matches!(err, BmcError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_promotion_is_idempotent() {
        let mut boot = MockBootManagement::new();
        boot.expect_boot_options().returning(|| Ok(options()));
        boot.expect_boot_order()
            .returning(|| Ok(refs(&["Boot0003", "Boot0001", "Boot0002"])));
        boot.expect_set_boot_order().times(0);

        let cache = BootOptionCache::new();
        let order = promote_boot_option(&boot, &cache, MAC).await.unwrap();
        assert_eq!(order[0], "Boot0003");
    }

    #[tokio::test]
    async fn test_promotion_rereads_cached_order() {
        let mut seq = mockall::Sequence::new();
        let mut boot = MockBootManagement::new();
        boot.expect_boot_options().returning(|| Ok(options()));
        boot.expect_boot_order()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(refs(&["Boot0001", "Boot0002", "Boot0003"])));
        boot.expect_boot_order()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(refs(&["Boot0003", "Boot0002", "Boot0001"])));
        boot.expect_set_boot_order().times(0);

        let cache = BootOptionCache::new();
        cache.boot_order(&boot, false).await.unwrap();

        let order = promote_boot_option(&boot, &cache, MAC).await.unwrap();
        assert_eq!(order, refs(&["Boot0003", "Boot0002", "Boot0001"]));
    }
}
