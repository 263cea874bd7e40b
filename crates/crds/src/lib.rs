//! Azure Operator CRD Definitions
//!
//! Custom resources owned by the operator (`AzureConfig`, `AzureMachinePool`)
//! and the external resources it reads or creates (`MachinePool`, `Cluster`,
//! `DrainerConfig`, `CertConfig`).

pub mod azure_config;
pub mod azure_machine_pool;
pub mod capi;
pub mod cert_config;
pub mod drainer_config;
pub mod label;
pub mod status;

pub use azure_config::*;
pub use azure_machine_pool::*;
pub use capi::*;
pub use cert_config::*;
pub use drainer_config::*;
pub use status::*;
