//! Readiness of a cluster for ETCD disk attachment.

use super::{disk_name, members_desired_count, EtcdDisks};
use crate::error::ControllerError;
use crate::reconciler::masters::master_vmss_name;
use crds::label::{self, DISK_ROLE_ETCD, DISK_ROLE_TAG, OPERATOR_VERSION_TAG};
use crds::{AzureConfig, CertConfig, CertConfigSpec, CertConfigSpecCert, CertConfigVersionBundle};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tenant_client::{EtcdCert, CERTS_NAMESPACE};
use tracing::debug;

const CERT_TTL: &str = "4320h";
const CERT_VERSION_BUNDLE: &str = "0.1.0";
const LOOPBACK_IP: &str = "127.0.0.1";

/// `CertConfig` requesting the TLS bundle of `member`
pub(crate) fn etcd_cert_config(cr: &AzureConfig, member: &str) -> CertConfig {
    let cluster_id = cr.cluster_id();
    let mut labels = BTreeMap::from([
        (label::CERTIFICATE.to_string(), member.to_string()),
        (label::CLUSTER.to_string(), cluster_id.to_string()),
        (label::MANAGED_BY.to_string(), label::OPERATOR_NAME.to_string()),
    ]);
    if let Some(organization) = &cr.spec.cluster.organization {
        labels.insert(label::ORGANIZATION.to_string(), organization.clone());
    }

    CertConfig {
        metadata: ObjectMeta {
            name: Some(format!("{cluster_id}-{member}")),
            namespace: Some(CERTS_NAMESPACE.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: CertConfigSpec {
            cert: CertConfigSpecCert {
                allow_bare_domains: true,
                alt_names: vec![format!("{member}.{}", cr.spec.cluster.dns_zone)],
                cluster_component: member.to_string(),
                cluster_id: cluster_id.to_string(),
                common_name: cr.spec.cluster.etcd.domain.clone(),
                disable_regeneration: false,
                ip_sans: vec![LOOPBACK_IP.to_string()],
                ttl: CERT_TTL.to_string(),
            },
            version_bundle: CertConfigVersionBundle {
                version: CERT_VERSION_BUNDLE.to_string(),
            },
        },
    }
}

/// Entries of `a` not matched by an entry of `b`, counting duplicates
pub(crate) fn difference(a: &[String], b: &[String]) -> Vec<String> {
    let mut remaining = b.to_vec();
    a.iter()
        .filter(|x| match remaining.iter().position(|y| y == *x) {
            Some(i) => {
                remaining.swap_remove(i);
                false
            }
            None => true,
        })
        .cloned()
        .collect()
}

impl EtcdDisks<'_> {
    /// Whether every master, member disk and certificate is in place
    ///
    /// Requests missing certificates and creates missing disks on the way,
    /// in the zones of the masters that have no disk yet.
    pub async fn verify_prerequisites(&self, cr: &AzureConfig) -> Result<bool, ControllerError> {
        let cluster_id = cr.cluster_id();
        let masters = cr.master_count();
        let members = members_desired_count(masters);

        let mut ready_certs = 0;
        for index in 1..=members {
            let member = disk_name(index);
            self.management.ensure_cert_config(&etcd_cert_config(cr, &member)).await?;

            let cert: EtcdCert = member.parse()?;
            match self.certs.search_tls(cluster_id, cert).await {
                Ok(_) => ready_certs += 1,
                Err(e) => debug!("TLS of ETCD member {} of cluster {} not ready: {}", member, cluster_id, e),
            }
        }

        let vmss_name = master_vmss_name(cluster_id);
        let vmss = match self.azure.get_vmss(cluster_id, &vmss_name).await {
            Ok(vmss) => vmss,
            Err(e) if e.is_not_found() => {
                debug!("Scale set {}/{} not found", cluster_id, vmss_name);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        if vmss.tags.get(OPERATOR_VERSION_TAG).map(String::as_str) != Some(self.operator_version) {
            debug!(
                "Scale set {}/{} is not at operator version {} yet",
                cluster_id, vmss_name, self.operator_version
            );
            return Ok(false);
        }

        let mut ready_instances = 0;
        let mut desired_zones = Vec::new();
        for instance in self.azure.list_vmss_vms(cluster_id, &vmss_name).await? {
            if !instance.has_tag(OPERATOR_VERSION_TAG, self.operator_version) {
                continue;
            }
            if instance.is_succeeded() {
                ready_instances += 1;
            }
            // Zones of instances still provisioning count as well
            if let Some(zone) = instance.zone() {
                desired_zones.push(zone.to_string());
            }
        }

        let mut ready_disks = 0;
        let mut existing_zones = Vec::new();
        for disk in self.azure.list_disks(cluster_id).await? {
            if !disk.has_tag(DISK_ROLE_TAG, DISK_ROLE_ETCD) {
                continue;
            }
            if disk.is_succeeded() {
                ready_disks += 1;
            }
            if let Some(zone) = disk.zone() {
                existing_zones.push(zone.to_string());
            }
        }

        if ready_instances != masters || ready_disks != members {
            debug!(
                "Cluster {} has {}/{} ready masters and {}/{} ready ETCD disks",
                cluster_id, ready_instances, masters, ready_disks, members
            );
            self.ensure_disks(cr, members, &difference(&desired_zones, &existing_zones))
                .await?;
            return Ok(false);
        }

        Ok(ready_certs == members)
    }
}
