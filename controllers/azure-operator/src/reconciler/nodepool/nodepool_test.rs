//! Unit tests for node pool reconciliation, deployment stages and partitioning

#[cfg(test)]
mod tests {
    use super::super::{owner_machine_pool, worker_node_name, Partition, HANDLER};
    use crate::error::ControllerError;
    use crate::state_machine::ADVANCE_REQUEUE;
    use crate::test_utils::*;
    use azure_client::PROVISIONING_SUCCEEDED;
    use crds::label::OPERATOR_VERSION;
    use crds::{AzureMachinePool, STAGE_KEY, TEMPLATE_CHECKSUM_KEY};
    use kube_runtime::controller::Action;
    use semver::Version;
    use serde_json::json;

    const VMSS: &str = "nodepool-np1";

    fn pool_in_stage(stage: &str) -> AzureMachinePool {
        with_pool_stage(create_test_azure_machine_pool("np1", Some("np1")), stage)
    }

    fn force_stage(pool: &mut AzureMachinePool, stage: &str) {
        pool.status
            .get_or_insert_with(Default::default)
            .resources
            .entry(HANDLER.to_string())
            .or_default()
            .insert(STAGE_KEY.to_string(), stage.to_string());
    }

    #[test]
    fn test_owner_machine_pool_requires_owner_reference() {
        let owned = create_test_azure_machine_pool("np1", Some("mp-np1"));
        assert_eq!(owner_machine_pool(&owned).unwrap(), "mp-np1");

        let orphan = create_test_azure_machine_pool("np1", None);
        assert!(matches!(
            owner_machine_pool(&orphan),
            Err(ControllerError::OwnerReferenceNotSet(_))
        ));
    }

    #[tokio::test]
    async fn test_reconcile_without_owner_fails() {
        let ctx = create_test_context();
        let pool = create_test_azure_machine_pool("np1", None);

        let err = ctx.reconciler.reconcile_azure_machine_pool(&pool).await.unwrap_err();

        assert!(matches!(err, ControllerError::OwnerReferenceNotSet(_)));
    }

    #[tokio::test]
    async fn test_reconcile_waits_for_machine_pool_and_azure_config() {
        let ctx = create_test_context();
        let pool = create_test_azure_machine_pool("np1", Some("np1"));

        let action = ctx.reconciler.reconcile_azure_machine_pool(&pool).await.unwrap();
        assert_eq!(action, Action::requeue(TEST_WAIT_REQUEUE));

        ctx.management.add_machine_pool(create_test_machine_pool("np1", "abc12", Some(3)));
        let action = ctx.reconciler.reconcile_azure_machine_pool(&pool).await.unwrap();
        assert_eq!(action, Action::requeue(TEST_WAIT_REQUEUE));

        assert_eq!(ctx.status.save_count(), 0);
        assert!(ctx.azure.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_starts_node_pool_machine() {
        let ctx = create_test_context();
        ctx.management.add_machine_pool(create_test_machine_pool("np1", "abc12", Some(3)));
        ctx.management.add_azure_config(create_test_azure_config("abc12", 3, &[]));
        let pool = create_test_azure_machine_pool("np1", Some("np1"));

        let action = ctx.reconciler.reconcile_azure_machine_pool(&pool).await.unwrap();

        assert_eq!(action, Action::requeue(ADVANCE_REQUEUE));
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("DeploymentUninitialized"));
    }

    #[tokio::test]
    async fn test_pool_deployment_is_submitted_to_cluster_resource_group() {
        let ctx = create_test_context();
        ctx.azure.set_provisioning_state("Running");
        let machine_pool = create_test_machine_pool("np1", "abc12", Some(3));
        let mut pool = pool_in_stage("DeploymentUninitialized");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        let deployment = ctx.azure.deployment(VMSS).unwrap();
        assert_eq!(deployment.properties.parameters.unwrap()["vmSize"]["value"], json!(TEST_VM_SIZE));
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("DeploymentInitialized"));

        let requeue = ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();
        assert_eq!(requeue, TEST_WAIT_REQUEUE);

        ctx.azure.set_deployment_state(VMSS, PROVISIONING_SUCCEEDED);
        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("ScaleUpWorkerVMSS"));
    }

    #[tokio::test]
    async fn test_canceled_pool_deployment_is_resubmitted() {
        let ctx = create_test_context();
        let machine_pool = create_test_machine_pool("np1", "abc12", Some(3));
        let mut pool = pool_in_stage("DeploymentUninitialized");
        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();
        ctx.azure.set_deployment_state(VMSS, "Canceled");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        let saved = ctx.status.saved("np1", HANDLER).unwrap();
        assert_eq!(saved.get(STAGE_KEY).unwrap(), "DeploymentUninitialized");
        assert!(!saved.contains_key(TEMPLATE_CHECKSUM_KEY));
    }

    #[tokio::test]
    async fn test_unchanged_pool_settles_until_replicas_change() {
        let ctx = create_test_context();
        let machine_pool = create_test_machine_pool("np1", "abc12", Some(3));
        let mut pool = pool_in_stage("DeploymentUninitialized");
        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();
        force_stage(&mut pool, "DeploymentUninitialized");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("DeploymentCompleted"));

        let requeue = ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();
        assert_eq!(requeue, TEST_STEADY_REQUEUE);
        assert_eq!(ctx.azure.calls_matching("create_or_update_deployment").len(), 1);

        let resized = create_test_machine_pool("np1", "abc12", Some(5));
        ctx.run_node_pool(&mut pool, &resized).await.unwrap();
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("DeploymentUninitialized"));
    }

    #[test]
    fn test_partition_by_node_version_label() {
        let operator = Version::parse(TEST_OPERATOR_VERSION).unwrap();
        let instances = ["0", "1", "2", "3"]
            .iter()
            .map(|id| create_test_vm(id, None))
            .collect();
        let nodes = vec![
            create_test_worker_node(&worker_node_name(VMSS, "0"), "np1", OLD_OPERATOR_VERSION, true),
            create_test_worker_node(&worker_node_name(VMSS, "1"), "np1", TEST_OPERATOR_VERSION, true),
            create_test_node(&worker_node_name(VMSS, "2"), &[(OPERATOR_VERSION, "garbage")], true),
        ];

        let partition = Partition::of(VMSS, Some(TEST_VM_SIZE), instances, nodes, &operator);

        let old: Vec<_> = partition.old.iter().map(|w| w.instance.instance_id.as_str()).collect();
        let new: Vec<_> = partition.new.iter().map(|w| w.instance.instance_id.as_str()).collect();
        assert_eq!(old, vec!["0"]);
        assert_eq!(new, vec!["1"]);
    }

    #[test]
    fn test_partition_counts_resized_workers_as_old() {
        let operator = Version::parse(TEST_OPERATOR_VERSION).unwrap();
        let nodes = vec![create_test_worker_node(
            &worker_node_name(VMSS, "0"),
            "np1",
            TEST_OPERATOR_VERSION,
            true,
        )];

        let partition = Partition::of(
            VMSS,
            Some("Standard_D8s_v3"),
            vec![create_test_vm("0", None)],
            nodes,
            &operator,
        );

        assert_eq!(partition.old.len(), 1);
        assert!(partition.new.is_empty());
    }
}
