//! DNS record set models.

use serde::{Deserialize, Serialize};

/// DNS record set
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RecordSet {
    /// Relative record name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Entity tag used for optimistic concurrency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Record set properties
    #[serde(default)]
    pub properties: RecordSetProperties,
}

/// Record set properties
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RecordSetProperties {
    /// Time to live in seconds
    #[serde(default, rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    /// A records
    #[serde(default, rename = "ARecords")]
    pub a_records: Vec<ARecord>,
}

/// IPv4 address record
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ARecord {
    /// IPv4 address
    pub ipv4_address: String,
}

impl RecordSet {
    /// A record set with a single address
    pub fn a_record(name: impl Into<String>, ttl: i64, ipv4: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            etag: None,
            properties: RecordSetProperties {
                ttl: Some(ttl),
                a_records: vec![ARecord {
                    ipv4_address: ipv4.into(),
                }],
            },
        }
    }
}
