//! Status types shared by the provider CRDs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted key/value state, keyed by handler name.
///
/// Each handler owns one inner map and stores its checkpoint there, e.g.
/// `{"masters": {"Stage": "StopMasters", "Touch": "..."}}`.
pub type ResourceStatuses = BTreeMap<String, BTreeMap<String, String>>;

/// Key holding the current state machine stage
pub const STAGE_KEY: &str = "Stage";
/// Key holding the checksum of the last applied ARM template
pub const TEMPLATE_CHECKSUM_KEY: &str = "TemplateChecksum";
/// Key holding the checksum of the last applied ARM parameters
pub const PARAMETERS_CHECKSUM_KEY: &str = "ParametersChecksum";
/// Key holding the timestamp of the last checkpoint
pub const TOUCH_KEY: &str = "Touch";

/// Kubernetes style condition.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (e.g. "Ready", "Drained")
    #[serde(rename = "type")]
    pub type_: String,

    /// "True", "False" or "Unknown"
    pub status: String,

    /// Machine readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last transition timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl Condition {
    /// Whether this condition has the given type and status "True".
    #[must_use]
    pub fn is_true(&self, type_: &str) -> bool {
        self.type_ == type_ && self.status == "True"
    }
}

/// Returns true when a condition of the given type is present and "True".
#[must_use]
pub fn has_true_condition(conditions: &[Condition], type_: &str) -> bool {
    conditions.iter().any(|c| c.is_true(type_))
}
