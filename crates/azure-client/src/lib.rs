//! Azure Resource Manager REST Client
//!
//! A typed client for the parts of the Azure Resource Manager API the Azure
//! operator needs: scale sets and their instances, managed disks, snapshots,
//! DNS record sets, virtual networks, VPN gateways and template deployments.
//!
//! # Example
//!
//! ```no_run
//! use azure_client::{AzureClient, AzureClientTrait, AzureCredentials, AzureEnvironment};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = AzureCredentials {
//!     tenant_id: "tenant".to_string(),
//!     client_id: "client".to_string(),
//!     client_secret: "secret".to_string(),
//!     subscription_id: "subscription".to_string(),
//! };
//! let client = AzureClient::new(credentials, &AzureEnvironment::default())?;
//!
//! // Mutating calls return an operation handle
//! let operation = client.delete_disk("abc12", "etcd2").await?;
//! client.wait_for_completion(&operation).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Long running operations**: `Azure-AsyncOperation` and `Location` polling
//! - **Pagination**: `nextLink` lists are followed to the end
//! - **Token caching**: client-credential tokens are reused until shortly before expiry
//! - **`test-util`**: in-memory [`MockAzureClient`] recording every call

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod operation;
#[path = "trait.rs"]
pub mod azure_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use auth::{AzureCredentials, AzureEnvironment};
pub use client::AzureClient;
pub use error::AzureError;
pub use models::*;
pub use operation::{Operation, PollTarget};
pub use azure_trait::AzureClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockAzureClient;
