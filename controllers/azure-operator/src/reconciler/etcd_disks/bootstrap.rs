//! Per member setup once a master holds a disk.

use super::EtcdDisks;
use crate::error::ControllerError;
use crate::reconciler::masters::{master_nic_name, master_vmss_name};
use azure_client::{RecordSet, RunCommandInput};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crds::AzureConfig;
use tenant_client::{EtcdCert, Tls};
use tracing::{debug, info};

const DNS_RECORD_TTL: i64 = 60;
const ETCD_PEER_PORT: u16 = 2380;
const ENV_FILE: &str = "/etc/etcd-bootstrap-env";
const RUN_SHELL_SCRIPT: &str = "RunShellScript";

/// Peer URL of `member`
#[must_use]
pub fn member_url(cr: &AzureConfig, member: &str) -> String {
    format!("https://{member}.{}:{ETCD_PEER_PORT}", cr.spec.cluster.dns_zone)
}

/// Command writing the ETCD bootstrap environment of `member`
///
/// `members` lists `name=url` of every member set up so far in this pass,
/// `member` included.
pub(crate) fn env_file_command(member: &str, url: &str, members: &[String], tls: &Tls) -> RunCommandInput {
    let state = if members.len() == 1 { "new" } else { "existing" };
    let vars = [
        format!("ETCD_NAME={member}"),
        format!("ETCD_PEER_URL={url}"),
        format!("ETCD_INITIAL_CLUSTER={}", members.join(",")),
        format!("ETCD_INITIAL_CLUSTER_STATE={state}"),
        "ETCD_PEER_CA_PATH=/var/lib/etcd/ssl/peer-ca.pem".to_string(),
        "ETCD_PEER_CERT_PATH=/var/lib/etcd/ssl/peer-crt.pem".to_string(),
        "ETCD_PEER_KEY_PATH=/var/lib/etcd/ssl/peer-key.pem".to_string(),
        format!("ETCD_PEER_CA={}", STANDARD.encode(&tls.ca)),
        format!("ETCD_PEER_CRT={}", STANDARD.encode(&tls.crt)),
        format!("ETCD_PEER_KEY={}", STANDARD.encode(&tls.key)),
    ];

    RunCommandInput {
        command_id: RUN_SHELL_SCRIPT.to_string(),
        script: vec![format!("echo -e '{}' | sudo tee {ENV_FILE}", vars.join("\\n"))],
    }
}

impl EtcdDisks<'_> {
    /// Points DNS at the member, then writes its env file to the instance
    ///
    /// `members` accumulates the members bootstrapped in the current pass.
    pub(crate) async fn bootstrap_member(
        &self,
        cr: &AzureConfig,
        instance_id: &str,
        member: &str,
        members: &mut Vec<String>,
    ) -> Result<(), ControllerError> {
        let ip = self.instance_ip(cr, instance_id).await?;
        self.ensure_dns_record(cr, member, &ip).await?;

        let cert: EtcdCert = member.parse()?;
        let tls = self.certs.search_tls(cr.cluster_id(), cert).await?;

        let url = member_url(cr, member);
        members.push(format!("{member}={url}"));

        debug!(
            "Writing ETCD env file of member {} to instance {} of cluster {}",
            member,
            instance_id,
            cr.cluster_id()
        );
        let command = env_file_command(member, &url, members, &tls);
        self.azure
            .run_command(cr.cluster_id(), &master_vmss_name(cr.cluster_id()), instance_id, &command)
            .await?;
        Ok(())
    }

    async fn instance_ip(&self, cr: &AzureConfig, instance_id: &str) -> Result<String, ControllerError> {
        let cluster_id = cr.cluster_id();
        let nic = self
            .azure
            .get_vmss_network_interface(
                cluster_id,
                &master_vmss_name(cluster_id),
                instance_id,
                &master_nic_name(cluster_id),
            )
            .await?;
        nic.primary_private_ip()
            .map(ToString::to_string)
            .ok_or_else(|| ControllerError::ExecutionFailed("ip address unavailable".to_string()))
    }

    async fn ensure_dns_record(&self, cr: &AzureConfig, member: &str, ip: &str) -> Result<(), ControllerError> {
        let cluster_id = cr.cluster_id();
        let zone = &cr.spec.cluster.dns_zone;
        info!("Ensuring A record {}.{} => {}", member, zone, ip);

        let mut record = match self.azure.get_a_record_set(cluster_id, zone, member).await {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => RecordSet::a_record(member, DNS_RECORD_TTL, ip),
            Err(e) => return Err(e.into()),
        };
        record.properties.a_records = RecordSet::a_record(member, DNS_RECORD_TTL, ip).properties.a_records;

        self.azure
            .create_or_update_a_record_set(cluster_id, zone, member, &record)
            .await?;
        Ok(())
    }
}
