//! Azure Resource Manager API client
//!
//! Implements [`AzureClientTrait`] on top of the ARM REST API. Reads are plain
//! `GET`s (following `nextLink` for lists), writes return an [`Operation`]
//! built from the `Azure-AsyncOperation` / `Location` response headers.

use crate::auth::{AzureCredentials, AzureEnvironment, TokenProvider};
use crate::azure_trait::AzureClientTrait;
use crate::error::AzureError;
use crate::models::*;
use crate::operation::{AsyncOperationStatus, Operation, OperationState, PollTarget};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

const COMPUTE_API_VERSION: &str = "2019-07-01";
const VMSS_NETWORK_API_VERSION: &str = "2018-10-01";
const NETWORK_API_VERSION: &str = "2020-05-01";
const DNS_API_VERSION: &str = "2018-05-01";
const RESOURCES_API_VERSION: &str = "2019-10-01";

/// Azure Resource Manager API client
pub struct AzureClient {
    client: Client,
    base_url: String,
    token: TokenProvider,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl AzureClient {
    /// Create a new Azure client
    ///
    /// # Arguments
    /// * `credentials` - Service principal of the target subscription
    /// * `environment` - ARM and AD endpoints of the Azure cloud
    pub fn new(credentials: AzureCredentials, environment: &AzureEnvironment) -> Result<Self, AzureError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: environment.resource_manager_url.trim_end_matches('/').to_string(),
            token: TokenProvider::new(credentials, environment),
            poll_interval: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(600),
        })
    }

    /// Override how often and how long long-running operations are polled
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resource_url(&self, resource_group: &str, path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}?api-version={}",
            self.base_url,
            self.token.subscription_id(),
            resource_group,
            path,
            api_version
        )
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, AzureError> {
        let token = self.token.token(&self.client).await?;
        Ok(request
            .bearer_auth(token)
            .header("Accept", "application/json"))
    }

    async fn check(response: Response, what: &str) -> Result<Response, AzureError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AzureError::from_status(status.as_u16(), format!("{what}: {body}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, AzureError> {
        debug!("GET {}", url);
        let response = self.authorized(self.client.get(url)).await?.send().await?;
        let response = Self::check(response, what).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch all pages of a list response
    async fn list_all<T: DeserializeOwned>(&self, url: String, what: &str) -> Result<Vec<T>, AzureError> {
        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let page: ListResult<T> = self.get_json(&url, what).await?;
            items.extend(page.value);
            next = page.next_link;
        }
        Ok(items)
    }

    async fn send_operation(&self, request: RequestBuilder, what: String) -> Result<Operation, AzureError> {
        let response = self.authorized(request).await?.send().await?;
        let response = Self::check(response, &what).await?;
        let headers = response.headers();

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        if let Some(url) = header("Azure-AsyncOperation") {
            return Ok(Operation::pending(what, PollTarget::AsyncOperation(url)));
        }
        if response.status().as_u16() == 202 {
            if let Some(url) = header("Location") {
                return Ok(Operation::pending(what, PollTarget::Location(url)));
            }
        }
        Ok(Operation::completed(what))
    }

    async fn put_operation<B: Serialize + Sync>(&self, url: &str, body: &B, what: String) -> Result<Operation, AzureError> {
        debug!("PUT {}", url);
        self.send_operation(self.client.put(url).json(body), what).await
    }

    async fn post_operation<B: Serialize + Sync>(&self, url: &str, body: Option<&B>, what: String) -> Result<Operation, AzureError> {
        debug!("POST {}", url);
        let request = match body {
            Some(body) => self.client.post(url).json(body),
            None => self.client.post(url).header("Content-Length", "0"),
        };
        self.send_operation(request, what).await
    }

    async fn delete_operation(&self, url: &str, what: String) -> Result<Operation, AzureError> {
        debug!("DELETE {}", url);
        self.send_operation(self.client.delete(url), what).await
    }

    /// Checks a poll endpoint once, returning true when the operation finished
    async fn poll_once(&self, target: &PollTarget, what: &str) -> Result<bool, AzureError> {
        match target {
            PollTarget::AsyncOperation(url) => {
                let status: AsyncOperationStatus = self.get_json(url, what).await?;
                match status.state() {
                    OperationState::Succeeded => Ok(true),
                    OperationState::InProgress => Ok(false),
                    OperationState::Failed(reason) => {
                        Err(AzureError::OperationFailed(format!("{what}: {reason}")))
                    }
                }
            }
            PollTarget::Location(url) => {
                let response = self.authorized(self.client.get(url)).await?.send().await?;
                if response.status().as_u16() == 202 {
                    return Ok(false);
                }
                Self::check(response, what).await?;
                Ok(true)
            }
        }
    }

    fn vmss_path(vmss: &str) -> String {
        format!("Microsoft.Compute/virtualMachineScaleSets/{vmss}")
    }

    fn vmss_vm_path(vmss: &str, instance_id: &str) -> String {
        format!("Microsoft.Compute/virtualMachineScaleSets/{vmss}/virtualMachines/{instance_id}")
    }
}

impl std::fmt::Debug for AzureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClient")
            .field("base_url", &self.base_url)
            .field("subscription_id", &self.token.subscription_id())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl AzureClientTrait for AzureClient {
    fn subscription_id(&self) -> &str {
        self.token.subscription_id()
    }

    async fn wait_for_completion(&self, operation: &Operation) -> Result<(), AzureError> {
        let Some(target) = operation.poll_target() else {
            return Ok(());
        };

        let deadline = Instant::now() + self.poll_timeout;
        loop {
            if self.poll_once(target, operation.description()).await? {
                debug!("Operation finished: {}", operation.description());
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AzureError::OperationFailed(format!(
                    "{}: timed out after {:?}",
                    operation.description(),
                    self.poll_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn get_vmss(&self, resource_group: &str, vmss: &str) -> Result<VirtualMachineScaleSet, AzureError> {
        let url = self.resource_url(resource_group, &Self::vmss_path(vmss), COMPUTE_API_VERSION);
        self.get_json(&url, &format!("get vmss {vmss}")).await
    }

    async fn create_or_update_vmss(&self, resource_group: &str, vmss: &str, scale_set: &VirtualMachineScaleSet) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &Self::vmss_path(vmss), COMPUTE_API_VERSION);
        self.put_operation(&url, scale_set, format!("update vmss {vmss}")).await
    }

    async fn update_vmss_instances(&self, resource_group: &str, vmss: &str, instance_ids: &[String]) -> Result<Operation, AzureError> {
        let path = format!("{}/manualupgrade", Self::vmss_path(vmss));
        let url = self.resource_url(resource_group, &path, COMPUTE_API_VERSION);
        let body = InstanceIds { instance_ids: instance_ids.to_vec() };
        self.post_operation(&url, Some(&body), format!("update instances {instance_ids:?} of vmss {vmss}")).await
    }

    async fn delete_vmss_instances(&self, resource_group: &str, vmss: &str, instance_ids: &[String]) -> Result<Operation, AzureError> {
        let path = format!("{}/delete", Self::vmss_path(vmss));
        let url = self.resource_url(resource_group, &path, COMPUTE_API_VERSION);
        let body = InstanceIds { instance_ids: instance_ids.to_vec() };
        self.post_operation(&url, Some(&body), format!("delete instances {instance_ids:?} of vmss {vmss}")).await
    }

    async fn list_vmss_vms(&self, resource_group: &str, vmss: &str) -> Result<Vec<VirtualMachineScaleSetVm>, AzureError> {
        let path = format!("{}/virtualMachines", Self::vmss_path(vmss));
        let url = self.resource_url(resource_group, &path, COMPUTE_API_VERSION);
        self.list_all(url, &format!("list instances of vmss {vmss}")).await
    }

    async fn get_vmss_vm_instance_view(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<InstanceView, AzureError> {
        let path = format!("{}/instanceView", Self::vmss_vm_path(vmss, instance_id));
        let url = self.resource_url(resource_group, &path, COMPUTE_API_VERSION);
        self.get_json(&url, &format!("get instance view of {vmss}/{instance_id}")).await
    }

    async fn update_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str, vm: &VirtualMachineScaleSetVm) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &Self::vmss_vm_path(vmss, instance_id), COMPUTE_API_VERSION);
        self.put_operation(&url, vm, format!("update instance {vmss}/{instance_id}")).await
    }

    async fn start_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError> {
        let path = format!("{}/start", Self::vmss_vm_path(vmss, instance_id));
        let url = self.resource_url(resource_group, &path, COMPUTE_API_VERSION);
        self.post_operation::<()>(&url, None, format!("start instance {vmss}/{instance_id}")).await
    }

    async fn deallocate_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError> {
        let path = format!("{}/deallocate", Self::vmss_vm_path(vmss, instance_id));
        let url = self.resource_url(resource_group, &path, COMPUTE_API_VERSION);
        self.post_operation::<()>(&url, None, format!("deallocate instance {vmss}/{instance_id}")).await
    }

    async fn reimage_vmss_vm(&self, resource_group: &str, vmss: &str, instance_id: &str) -> Result<Operation, AzureError> {
        let path = format!("{}/reimage", Self::vmss_vm_path(vmss, instance_id));
        let url = self.resource_url(resource_group, &path, COMPUTE_API_VERSION);
        self.post_operation::<()>(&url, None, format!("reimage instance {vmss}/{instance_id}")).await
    }

    async fn run_command(&self, resource_group: &str, vmss: &str, instance_id: &str, input: &RunCommandInput) -> Result<Operation, AzureError> {
        let path = format!("{}/runCommand", Self::vmss_vm_path(vmss, instance_id));
        let url = self.resource_url(resource_group, &path, COMPUTE_API_VERSION);
        self.post_operation(&url, Some(input), format!("run {} on {vmss}/{instance_id}", input.command_id)).await
    }

    async fn get_disk(&self, resource_group: &str, name: &str) -> Result<Disk, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Compute/disks/{name}"), COMPUTE_API_VERSION);
        self.get_json(&url, &format!("get disk {name}")).await
    }

    async fn list_disks(&self, resource_group: &str) -> Result<Vec<Disk>, AzureError> {
        let url = self.resource_url(resource_group, "Microsoft.Compute/disks", COMPUTE_API_VERSION);
        self.list_all(url, "list disks").await
    }

    async fn create_or_update_disk(&self, resource_group: &str, name: &str, disk: &Disk) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Compute/disks/{name}"), COMPUTE_API_VERSION);
        self.put_operation(&url, disk, format!("create or update disk {name}")).await
    }

    async fn delete_disk(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Compute/disks/{name}"), COMPUTE_API_VERSION);
        self.delete_operation(&url, format!("delete disk {name}")).await
    }

    async fn list_snapshots(&self, resource_group: &str) -> Result<Vec<Snapshot>, AzureError> {
        let url = self.resource_url(resource_group, "Microsoft.Compute/snapshots", COMPUTE_API_VERSION);
        self.list_all(url, "list snapshots").await
    }

    async fn create_or_update_snapshot(&self, resource_group: &str, name: &str, snapshot: &Snapshot) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Compute/snapshots/{name}"), COMPUTE_API_VERSION);
        self.put_operation(&url, snapshot, format!("create or update snapshot {name}")).await
    }

    async fn delete_snapshot(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Compute/snapshots/{name}"), COMPUTE_API_VERSION);
        self.delete_operation(&url, format!("delete snapshot {name}")).await
    }

    async fn get_a_record_set(&self, resource_group: &str, zone: &str, name: &str) -> Result<RecordSet, AzureError> {
        let path = format!("Microsoft.Network/dnsZones/{zone}/A/{name}");
        let url = self.resource_url(resource_group, &path, DNS_API_VERSION);
        self.get_json(&url, &format!("get A record {name}.{zone}")).await
    }

    async fn create_or_update_a_record_set(&self, resource_group: &str, zone: &str, name: &str, record_set: &RecordSet) -> Result<RecordSet, AzureError> {
        let path = format!("Microsoft.Network/dnsZones/{zone}/A/{name}");
        let url = self.resource_url(resource_group, &path, DNS_API_VERSION);
        debug!("PUT {}", url);
        let response = self
            .authorized(self.client.put(&url).json(record_set))
            .await?
            .send()
            .await?;
        let response = Self::check(response, &format!("update A record {name}.{zone}")).await?;
        Ok(response.json().await?)
    }

    async fn get_vmss_network_interface(&self, resource_group: &str, vmss: &str, instance_id: &str, nic: &str) -> Result<NetworkInterface, AzureError> {
        let path = format!("{}/networkInterfaces/{nic}", Self::vmss_vm_path(vmss, instance_id));
        let url = self.resource_url(resource_group, &path, VMSS_NETWORK_API_VERSION);
        self.get_json(&url, &format!("get nic {nic} of {vmss}/{instance_id}")).await
    }

    async fn get_virtual_network(&self, resource_group: &str, name: &str) -> Result<VirtualNetwork, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Network/virtualNetworks/{name}"), NETWORK_API_VERSION);
        self.get_json(&url, &format!("get vnet {name}")).await
    }

    async fn create_or_update_vnet_peering(&self, resource_group: &str, vnet: &str, name: &str, peering: &VirtualNetworkPeering) -> Result<Operation, AzureError> {
        let path = format!("Microsoft.Network/virtualNetworks/{vnet}/virtualNetworkPeerings/{name}");
        let url = self.resource_url(resource_group, &path, NETWORK_API_VERSION);
        self.put_operation(&url, peering, format!("create or update peering {vnet}/{name}")).await
    }

    async fn get_virtual_network_gateway(&self, resource_group: &str, name: &str) -> Result<VirtualNetworkGateway, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Network/virtualNetworkGateways/{name}"), NETWORK_API_VERSION);
        self.get_json(&url, &format!("get vpn gateway {name}")).await
    }

    async fn delete_virtual_network_gateway(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Network/virtualNetworkGateways/{name}"), NETWORK_API_VERSION);
        self.delete_operation(&url, format!("delete vpn gateway {name}")).await
    }

    async fn list_gateway_connections(&self, resource_group: &str) -> Result<Vec<VirtualNetworkGatewayConnection>, AzureError> {
        let url = self.resource_url(resource_group, "Microsoft.Network/connections", NETWORK_API_VERSION);
        self.list_all(url, "list gateway connections").await
    }

    async fn delete_gateway_connection(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Network/connections/{name}"), NETWORK_API_VERSION);
        self.delete_operation(&url, format!("delete gateway connection {name}")).await
    }

    async fn get_public_ip(&self, resource_group: &str, name: &str) -> Result<PublicIpAddress, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Network/publicIPAddresses/{name}"), NETWORK_API_VERSION);
        self.get_json(&url, &format!("get public ip {name}")).await
    }

    async fn delete_public_ip(&self, resource_group: &str, name: &str) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Network/publicIPAddresses/{name}"), NETWORK_API_VERSION);
        self.delete_operation(&url, format!("delete public ip {name}")).await
    }

    async fn get_deployment(&self, resource_group: &str, name: &str) -> Result<Deployment, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Resources/deployments/{name}"), RESOURCES_API_VERSION);
        self.get_json(&url, &format!("get deployment {name}")).await
    }

    async fn create_or_update_deployment(&self, resource_group: &str, name: &str, deployment: &Deployment) -> Result<Operation, AzureError> {
        let url = self.resource_url(resource_group, &format!("Microsoft.Resources/deployments/{name}"), RESOURCES_API_VERSION);
        self.put_operation(&url, deployment, format!("create or update deployment {name}")).await
    }
}
