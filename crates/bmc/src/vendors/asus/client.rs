//! ASUS (AMI MegaRAC) client implementation.
//!
//! Boot and TPM changes are written to the pending `SD` resource with
//! `If-Match` and take effect on the next boot. Boot order reads prefer the
//! staged order so a write is visible before the reboot applies it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::error::{BmcError, Result};
use crate::etag::patch_if_match;
use crate::session::Session;
use crate::vendors::common;
use crate::vendors::traits::{
    BootManagement, BootOption, BootSourceTarget, ResetType, TpmManagement, TpmState,
};

/// ASUS BMC.
#[derive(Debug, Clone)]
pub struct Asus {
    session: Arc<Session>,
    system_path: String,
}

impl Asus {
    /// Create an ASUS implementation bound to `system_path`.
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

    /// Pending settings resource.
    #[must_use]
    pub fn pending_path(&self) -> String {
        format!("{}/SD", self.system_path)
    }

    async fn write_pending(&self, body: &serde_json::Value) -> Result<()> {
        let pending = self.pending_path();
        patch_if_match(&self.session, &pending, &pending, body).await?;
        Ok(())
    }
}

#[async_trait]
impl BootManagement for Asus {
    async fn boot_options(&self) -> Result<Vec<BootOption>> {
        common::boot_options(&self.session, &self.system_path).await
    }

    /// Staged order when one is pending, otherwise the live order.
    async fn boot_order(&self) -> Result<Vec<String>> {
        match common::boot_order(&self.session, &self.pending_path()).await {
            Ok(pending) if !pending.is_empty() => return Ok(pending),
            Ok(_) | Err(BmcError::Api { status: 404, .. }) => {}
            Err(e) => return Err(e),
        }
        common::boot_order(&self.session, &self.system_path).await
    }

    async fn set_boot_order(&self, order: &[String]) -> Result<()> {
        info!(system = %self.system_path, order = ?order, "Staging boot order");
        self.write_pending(&common::boot_order_body(order)).await
    }

    async fn pending_boot_order(&self) -> Result<Vec<String>> {
        common::boot_order(&self.session, &self.pending_path()).await
    }

    async fn set_one_time_boot(&self, target: BootSourceTarget) -> Result<()> {
        info!(system = %self.system_path, target = target.as_str(), "Staging one-time boot");
        self.write_pending(&common::one_time_boot_body(target)).await
    }

    async fn reset_types(&self) -> Result<Vec<ResetType>> {
        common::reset_types(&self.session, &self.system_path).await
    }

    async fn reset_system(&self, reset_type: Option<ResetType>) -> Result<ResetType> {
        common::reset_system(&self.session, &self.system_path, reset_type).await
    }
}

#[async_trait]
impl TpmManagement for Asus {
    async fn tpm_state(&self) -> Result<Option<TpmState>> {
        let system = common::system(&self.session, &self.system_path).await?;
        Ok(system
            .trusted_modules
            .first()
            .and_then(|tpm| tpm.status.state.as_deref())
            .and_then(|state| state.parse::<TpmState>().ok()))
    }

    async fn set_tpm_state(&self, state: TpmState) -> Result<()> {
        let value = match state {
            TpmState::Enabled => "Enabled",
            TpmState::Disabled => "Disabled",
        };
        info!(system = %self.system_path, state = value, "Staging TPM state");
        self.write_pending(&json!({
            "TrustedModules": [{ "Status": { "State": value } }]
        }))
        .await
    }
}
