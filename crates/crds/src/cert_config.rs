//! CertConfig CRD
//!
//! Asks the certificate operator to issue a TLS bundle. The issued bundle is
//! written to a secret named `<cluster>-<component>`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "core.giantswarm.io",
    version = "v1alpha1",
    kind = "CertConfig",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CertConfigSpec {
    /// Certificate request
    pub cert: CertConfigSpecCert,

    /// Version bundle of the issuer contract
    pub version_bundle: CertConfigVersionBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertConfigSpecCert {
    /// Allow bare domains in the SAN list
    pub allow_bare_domains: bool,

    /// DNS subject alternative names
    #[serde(default)]
    pub alt_names: Vec<String>,

    /// Component the certificate is issued for (e.g. "etcd1")
    pub cluster_component: String,

    /// Tenant cluster ID
    pub cluster_id: String,

    /// Certificate common name
    pub common_name: String,

    /// Never rotate the certificate
    #[serde(default)]
    pub disable_regeneration: bool,

    /// IP subject alternative names
    #[serde(default, rename = "ipSans")]
    pub ip_sans: Vec<String>,

    /// Validity (e.g. "4320h")
    pub ttl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertConfigVersionBundle {
    /// Issuer version
    pub version: String,
}
