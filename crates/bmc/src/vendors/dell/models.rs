//! Dell OEM payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `DellAttributes` and `DellNetworkAttributes` resources.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DellAttributes {
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl DellAttributes {
    /// Attribute value as text.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Role indices already taken (`Roles.<N>.Name`).
    #[must_use]
    pub fn used_role_indices(&self) -> Vec<u32> {
        self.attributes
            .keys()
            .filter_map(|key| {
                key.strip_prefix("Roles.")?
                    .strip_suffix(".Name")?
                    .parse()
                    .ok()
            })
            .collect()
    }
}

/// Result of creating an iDRAC role.
#[derive(Debug, Clone, Serialize)]
pub struct RoleCreated {
    /// `Roles.<N>` index that was written.
    pub role_index: u32,
    /// Response body, `null` when the BMC returned none.
    pub response: Value,
}

/// Result of toggling local iDRAC access.
#[derive(Debug, Clone, Serialize)]
pub struct LocalAccessChange {
    /// Attribute values that were written.
    pub applied: Map<String, Value>,
    /// Response body, `null` when the BMC returned none.
    pub response: Value,
}
