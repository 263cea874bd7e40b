//! Unit tests for the surge, cordon and scale-down stages

#[cfg(test)]
mod tests {
    use super::super::{worker_node_name, HANDLER};
    use crate::test_utils::*;
    use azure_client::{AzureClientTrait, Deployment, InstanceView, InstanceViewStatus, POWER_STATE_DEALLOCATED};
    use crds::label::AUTOSCALER_ENABLED_TAG;
    use crds::{AzureMachinePool, MachinePool};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use serde_json::json;

    const VMSS: &str = "nodepool-np1";

    /// Pool of `old` workers at the previous version, with a finished deployment
    async fn rolling_pool(ctx: &TestContext, old: usize) -> MachinePool {
        ctx.azure.add_vmss(VMSS, create_test_vmss(old as i64, TEST_OPERATOR_VERSION));
        for id in 0..old {
            let id = id.to_string();
            ctx.azure.add_instance(VMSS, create_test_vm(&id, None));
            ctx.tenant.add_node(create_test_worker_node(
                &worker_node_name(VMSS, &id),
                "np1",
                OLD_OPERATOR_VERSION,
                true,
            ));
        }
        ctx.azure
            .create_or_update_deployment("abc12", VMSS, &Deployment::incremental(json!({}), json!({})))
            .await
            .unwrap();
        ctx.management.add_cluster(create_test_cluster("abc12"));
        create_test_machine_pool("np1", "abc12", Some(old as i32))
    }

    /// Registers the nodes of instances `ids` at the current version
    fn join_new_workers(ctx: &TestContext, ids: &[&str], ready: bool) {
        for id in ids {
            ctx.tenant.add_node(create_test_worker_node(
                &worker_node_name(VMSS, id),
                "np1",
                TEST_OPERATOR_VERSION,
                ready,
            ));
        }
    }

    fn pool_in_stage(stage: &str) -> AzureMachinePool {
        with_pool_stage(create_test_azure_machine_pool("np1", Some("np1")), stage)
    }

    fn autoscaler_tag(ctx: &TestContext) -> Option<String> {
        ctx.azure.vmss(VMSS).and_then(|v| v.tags.get(AUTOSCALER_ENABLED_TAG).cloned())
    }

    #[tokio::test]
    async fn test_scale_up_doubles_old_workers_and_disables_autoscaler() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 3).await;
        let mut pool = pool_in_stage("ScaleUpWorkerVMSS");

        let requeue = ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert_eq!(requeue, TEST_WAIT_REQUEUE);
        assert_eq!(ctx.azure.vmss(VMSS).unwrap().capacity(), 6);
        assert_eq!(autoscaler_tag(&ctx).as_deref(), Some("false"));
        assert!(ctx.azure.calls().contains(&"wait:update vmss nodepool-np1".to_string()));
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("ScaleUpWorkerVMSS"));

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert_eq!(ctx.azure.calls_matching("create_or_update_vmss").len(), 1);
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("CordonOldWorkers"));
    }

    #[tokio::test]
    async fn test_scale_up_waits_for_stopped_instance() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 2).await;
        ctx.azure.set_instance_view(
            VMSS,
            "1",
            InstanceView {
                statuses: vec![InstanceViewStatus {
                    code: Some(POWER_STATE_DEALLOCATED.to_string()),
                    display_status: None,
                }],
            },
        );
        let mut pool = pool_in_stage("ScaleUpWorkerVMSS");

        let requeue = ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert_eq!(requeue, TEST_WAIT_REQUEUE);
        assert!(ctx.azure.calls_matching("create_or_update_vmss").is_empty());
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("ScaleUpWorkerVMSS"));
    }

    #[tokio::test]
    async fn test_scale_up_waits_while_machine_pool_is_deleted() {
        let ctx = create_test_context();
        let mut machine_pool = rolling_pool(&ctx, 2).await;
        let since: Time = serde_json::from_value(json!("2024-05-01T12:00:00Z")).unwrap();
        machine_pool.metadata.deletion_timestamp = Some(since);
        let mut pool = pool_in_stage("ScaleUpWorkerVMSS");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert!(ctx.azure.calls_matching("create_or_update_vmss").is_empty());
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("ScaleUpWorkerVMSS"));
    }

    #[tokio::test]
    async fn test_failed_deployment_during_scale_up_restarts_deployment() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 2).await;
        ctx.azure.set_deployment_state(VMSS, "Failed");
        let mut pool = pool_in_stage("ScaleUpWorkerVMSS");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert!(ctx.azure.calls_matching("create_or_update_vmss").is_empty());
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("DeploymentUninitialized"));
    }

    #[tokio::test]
    async fn test_cordon_waits_for_all_replacements() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 3).await;
        for id in ["3", "4"] {
            ctx.azure.add_instance(VMSS, create_test_vm(id, None));
        }
        join_new_workers(&ctx, &["3", "4"], true);
        let mut pool = pool_in_stage("CordonOldWorkers");

        let requeue = ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert_eq!(requeue, TEST_WAIT_REQUEUE);
        assert!(ctx.tenant.cordoned().is_empty());
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("CordonOldWorkers"));
    }

    #[tokio::test]
    async fn test_cordon_marks_every_old_worker() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 2).await;
        for id in ["2", "3"] {
            ctx.azure.add_instance(VMSS, create_test_vm(id, None));
        }
        join_new_workers(&ctx, &["2", "3"], false);
        let mut pool = pool_in_stage("CordonOldWorkers");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        let mut cordoned = ctx.tenant.cordoned();
        cordoned.sort();
        assert_eq!(cordoned, vec!["nodepool-np1-000000", "nodepool-np1-000001"]);
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("WaitForWorkersToBecomeReady"));
    }

    #[tokio::test]
    async fn test_worker_without_version_is_neither_old_nor_new() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 1).await;
        for id in ["1", "2"] {
            ctx.azure.add_instance(VMSS, create_test_vm(id, None));
        }
        ctx.tenant.add_node(create_test_node(
            &worker_node_name(VMSS, "1"),
            &[(crds::label::MACHINE_POOL, "np1")],
            true,
        ));
        join_new_workers(&ctx, &["2"], true);
        let mut pool = pool_in_stage("CordonOldWorkers");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert_eq!(ctx.tenant.cordoned(), vec!["nodepool-np1-000000"]);
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("WaitForWorkersToBecomeReady"));
    }

    #[tokio::test]
    async fn test_cordon_failure_is_returned() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 1).await;
        ctx.azure.add_instance(VMSS, create_test_vm("1", None));
        join_new_workers(&ctx, &["1"], true);
        ctx.tenant.fail_cordon("nodepool-np1-000000");
        let mut pool = pool_in_stage("CordonOldWorkers");

        assert!(ctx.run_node_pool(&mut pool, &machine_pool).await.is_err());
        assert_eq!(ctx.status.save_count(), 0);
    }

    #[tokio::test]
    async fn test_deleted_cluster_pauses_rolling() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 1).await;
        ctx.management.add_cluster(deleting(create_test_cluster("abc12")));
        ctx.azure.add_instance(VMSS, create_test_vm("1", None));
        join_new_workers(&ctx, &["1"], true);
        let mut pool = pool_in_stage("CordonOldWorkers");

        let requeue = ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert_eq!(requeue, TEST_WAIT_REQUEUE);
        assert!(ctx.tenant.cordoned().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_tenant_api_pauses_rolling() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 1).await;
        ctx.factory.set_tenant_available(false);
        let mut pool = pool_in_stage("WaitForWorkersToBecomeReady");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("WaitForWorkersToBecomeReady"));
    }

    #[tokio::test]
    async fn test_scale_down_waits_for_ready_replacements() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 2).await;
        for id in ["2", "3"] {
            ctx.azure.add_instance(VMSS, create_test_vm(id, None));
        }
        join_new_workers(&ctx, &["2"], true);
        join_new_workers(&ctx, &["3"], false);
        let mut pool = pool_in_stage("WaitForWorkersToBecomeReady");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("WaitForWorkersToBecomeReady"));

        join_new_workers(&ctx, &["3"], true);
        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("ScaleDownWorkerVMSS"));
    }

    #[tokio::test]
    async fn test_scale_down_removes_old_workers_and_restores_autoscaler() {
        let ctx = create_test_context();
        let machine_pool = rolling_pool(&ctx, 2).await;
        for id in ["2", "3"] {
            ctx.azure.add_instance(VMSS, create_test_vm(id, None));
        }
        join_new_workers(&ctx, &["2", "3"], true);
        let mut pool = pool_in_stage("ScaleDownWorkerVMSS");

        ctx.run_node_pool(&mut pool, &machine_pool).await.unwrap();

        assert_eq!(ctx.tenant.deleted(), vec!["nodepool-np1-000000", "nodepool-np1-000001"]);
        assert_eq!(
            ctx.azure.calls_matching("delete_vmss_instances"),
            vec!["delete_vmss_instances:nodepool-np1/0,1"]
        );
        let remaining: Vec<String> = ctx.azure.instances(VMSS).into_iter().map(|vm| vm.instance_id).collect();
        assert_eq!(remaining, vec!["2", "3"]);

        let vmss = ctx.azure.vmss(VMSS).unwrap();
        assert_eq!(vmss.capacity(), 2);
        assert_eq!(autoscaler_tag(&ctx).as_deref(), Some("true"));
        assert_eq!(ctx.stage("np1", HANDLER).as_deref(), Some("DeploymentUninitialized"));

        let text = ctx.metrics.render().unwrap();
        assert!(text.contains(r#"terminated_node="nodepool-np1-000000""#));
    }
}
