//! ETCD member TLS lookup
//!
//! Certificates are issued by an external certificate operator from
//! `CertConfig` requests and stored as secrets named `<cluster>-<cert>` in
//! the management cluster. This module only reads them.

use crate::error::TenantError;
use crate::tenant_trait::CertsSearcherTrait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Namespace the certificate operator writes its secrets to
pub const CERTS_NAMESPACE: &str = "default";

/// Certificate of one ETCD member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtcdCert {
    /// Member `etcd1`
    Etcd1,
    /// Member `etcd2`
    Etcd2,
    /// Member `etcd3`
    Etcd3,
}

impl EtcdCert {
    /// Certificate name, also the member name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Etcd1 => "etcd1",
            Self::Etcd2 => "etcd2",
            Self::Etcd3 => "etcd3",
        }
    }
}

impl fmt::Display for EtcdCert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EtcdCert {
    type Err = TenantError;

    fn from_str(member: &str) -> Result<Self, Self::Err> {
        match member {
            "etcd1" => Ok(Self::Etcd1),
            "etcd2" => Ok(Self::Etcd2),
            "etcd3" => Ok(Self::Etcd3),
            other => Err(TenantError::CertUnavailable(format!(
                "no certificate for etcd member {other}"
            ))),
        }
    }
}

/// PEM encoded TLS bundle
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Tls {
    /// CA certificate
    pub ca: String,
    /// Certificate
    pub crt: String,
    /// Private key
    pub key: String,
}

impl fmt::Debug for Tls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tls")
            .field("ca", &self.ca.len())
            .field("crt", &self.crt.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Reads TLS bundles from management cluster secrets
#[derive(Clone)]
pub struct KubeCertsSearcher {
    client: Client,
}

impl KubeCertsSearcher {
    /// Create a searcher on the management cluster
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl fmt::Debug for KubeCertsSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeCertsSearcher").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl CertsSearcherTrait for KubeCertsSearcher {
    async fn search_tls(&self, cluster_id: &str, cert: EtcdCert) -> Result<Tls, TenantError> {
        let name = format!("{cluster_id}-{cert}");
        debug!("Looking up TLS secret {}/{}", CERTS_NAMESPACE, name);

        let api: Api<Secret> = Api::namespaced(self.client.clone(), CERTS_NAMESPACE);
        let secret = match api.get_opt(&name).await? {
            Some(secret) => secret,
            None => {
                return Err(TenantError::CertUnavailable(format!(
                    "secret {CERTS_NAMESPACE}/{name} not found"
                )));
            }
        };

        let data = secret.data.unwrap_or_default();
        let field = |key: &str| {
            data.get(key)
                .and_then(|v| String::from_utf8(v.0.clone()).ok())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| TenantError::CertUnavailable(format!("secret {name} has no {key}")))
        };

        Ok(Tls {
            ca: field("ca")?,
            crt: field("crt")?,
            key: field("key")?,
        })
    }
}
