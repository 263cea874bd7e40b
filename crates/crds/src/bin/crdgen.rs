//! Prints the CRDs owned by the operator as a multi-document YAML stream.
//!
//! ```sh
//! cargo run -p crds --bin crdgen > config/crd/bases.yaml
//! ```

use crds::{AzureConfig, AzureMachinePool};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [AzureConfig::crd(), AzureMachinePool::crd()];
    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
