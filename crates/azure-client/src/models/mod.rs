//! Azure Resource Manager data models
//!
//! These mirror the JSON documents returned by the ARM REST API. Only the
//! fields the operator reads or writes are typed; resources that are sent
//! back with PUT keep unknown properties in a flattened map so a
//! read-modify-write cycle does not drop them.

pub mod compute;
pub mod dns;
pub mod network;
pub mod resources;

pub use compute::*;
pub use dns::*;
pub use network::*;
pub use resources::*;

use serde::{Deserialize, Serialize};

/// Provisioning state of a successfully created or updated resource
pub const PROVISIONING_SUCCEEDED: &str = "Succeeded";
/// Provisioning state of a failed resource
pub const PROVISIONING_FAILED: &str = "Failed";
/// Provisioning state of a canceled deployment
pub const PROVISIONING_CANCELED: &str = "Canceled";
/// Provisioning state of a resource being deleted
pub const PROVISIONING_DELETING: &str = "Deleting";

/// Paged list envelope used by all ARM list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    /// Items on this page
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// Absolute URL of the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

/// Reference to another ARM resource by ID
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SubResource {
    /// Full ARM resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SubResource {
    /// Reference to the resource with the given ID
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

/// Builds the ARM ID of a managed disk
#[must_use]
pub fn disk_id(subscription_id: &str, resource_group: &str, disk_name: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Compute/disks/{disk_name}"
    )
}
