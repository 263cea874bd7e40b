//! Kubernetes resource watchers.
//!
//! Both CRDs are driven by `kube_runtime::Controller` over a reflector-backed
//! stream. Only spec changes (a new `metadata.generation`) trigger a pass;
//! status writes of the state machines themselves are filtered out and the
//! machines advance through the requeue delay they return instead.

use crate::error::ControllerError;
use crate::reconciler::{resource_key, Reconciler};
use crds::{AzureConfig, AzureMachinePool};
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{predicates, reflector, watcher, Controller, PredicateConfig, WatchStreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Runs a `kube_runtime::Controller` for `api` until its stream ends
///
/// Successful passes reset the per-resource backoff, failed ones requeue
/// after the next Fibonacci delay.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: kube::Resource<DynamicType = ()> + Clone + Send + Sync + std::fmt::Debug + serde::de::DeserializeOwned + 'static,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = resource_key(obj.as_ref());
        ctx.increment_error(&key);
        ctx.metrics.record_error(resource_name);
        let (backoff_seconds, error_count) = ctx.get_backoff_for_resource(&key);
        warn!(
            "Reconciliation of {} {} failed (error #{}), retrying in {}s: {}",
            resource_name, key, error_count, backoff_seconds, error
        );
        Action::requeue(Duration::from_secs(backoff_seconds))
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            let key = resource_key(obj.as_ref());
            debug!("Reconciling {} {}", resource_name, key);
            let action = reconcile_fn(Arc::clone(&ctx), obj).await?;
            ctx.reset_error(&key);
            Ok(action)
        }
    };

    let (reader, writer) = reflector::store();
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(predicates::generation, PredicateConfig::default());

    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::for_stream(stream, reader)
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Ok(())
}

/// Watches the operator's CRDs
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    azure_config_api: Api<AzureConfig>,
    azure_machine_pool_api: Api<AzureMachinePool>,
}

impl Watcher {
    /// Watch `namespace`, or every namespace when `None`
    pub fn new(reconciler: Arc<Reconciler>, client: Client, namespace: Option<&str>) -> Self {
        let (azure_config_api, azure_machine_pool_api) = match namespace {
            Some(ns) => (Api::namespaced(client.clone(), ns), Api::namespaced(client, ns)),
            None => (Api::all(client.clone()), Api::all(client)),
        };
        Self {
            reconciler,
            azure_config_api,
            azure_machine_pool_api,
        }
    }

    /// Drives ETCD disks, master upgrades and VNet peering of `AzureConfig`s
    pub async fn watch_azure_configs(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.azure_config_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, cr| Box::pin(async move { reconciler.reconcile_azure_config(&cr).await }),
            "AzureConfig",
        )
        .await
    }

    /// Drives node pool rollouts of `AzureMachinePool`s
    pub async fn watch_azure_machine_pools(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.azure_machine_pool_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, pool| Box::pin(async move { reconciler.reconcile_azure_machine_pool(&pool).await }),
            "AzureMachinePool",
        )
        .await
    }
}
