//! Unit tests for attaching member disks and bootstrapping members

#[cfg(test)]
mod tests {
    use super::super::{EtcdDisks, ETCD_DISK_LUN};
    use crate::reconciler::etcd_disks::bootstrap::member_url;
    use crate::test_utils::*;
    use azure_client::{disk_id, AzureClientTrait, Disk, DiskProperties, RecordSet, PROVISIONING_SUCCEEDED};
    use crds::label::{DISK_ROLE_ETCD, DISK_ROLE_TAG};
    use std::collections::HashMap;
    use tenant_client::EtcdCert;

    const VMSS: &str = "abc12-master";

    fn free_disk(name: &str, zone: &str) -> Disk {
        Disk {
            id: Some(disk_id("sub-tenant", "abc12", name)),
            name: Some(name.to_string()),
            location: "westeurope".to_string(),
            tags: HashMap::from([(DISK_ROLE_TAG.to_string(), DISK_ROLE_ETCD.to_string())]),
            zones: vec![zone.to_string()],
            managed_by: None,
            properties: DiskProperties {
                provisioning_state: Some(PROVISIONING_SUCCEEDED.to_string()),
                ..Default::default()
            },
        }
    }

    /// Three zoned masters with IPs, free disks and issued certificates
    fn three_masters(ctx: &TestContext) {
        ctx.azure.add_vmss(VMSS, create_test_vmss(3, TEST_OPERATOR_VERSION));
        for (id, zone) in [("0", "1"), ("1", "2"), ("2", "3")] {
            ctx.azure.add_instance(VMSS, create_test_vm(id, Some(zone)));
            ctx.azure.set_instance_ip(VMSS, id, format!("10.0.0.{}", 10 + id.parse::<u8>().unwrap()));
        }
        for (member, zone) in [("etcd1", "1"), ("etcd2", "2"), ("etcd3", "3")] {
            ctx.azure.add_disk(free_disk(member, zone));
        }
        for cert in [EtcdCert::Etcd1, EtcdCert::Etcd2, EtcdCert::Etcd3] {
            ctx.certs.add("abc12", cert, create_test_tls(cert.as_str()));
        }
    }

    fn member_on(ctx: &TestContext, instance_id: &str) -> Option<String> {
        ctx.azure
            .instances(VMSS)
            .into_iter()
            .find(|vm| vm.instance_id == instance_id)
            .and_then(|vm| vm.data_disk_at(ETCD_DISK_LUN).and_then(|d| d.name.clone()))
    }

    #[tokio::test]
    async fn test_attach_disks_matches_zones_and_bootstraps_members() {
        let ctx = create_test_context();
        let cr = create_test_azure_config("abc12", 3, &[1, 2, 3]);
        three_masters(&ctx);
        let disks = EtcdDisks::new(&ctx.azure, &ctx.certs, ctx.management.as_ref(), TEST_OPERATOR_VERSION);

        disks.attach_disks(&cr).await.unwrap();

        assert_eq!(member_on(&ctx, "0").as_deref(), Some("etcd1"));
        assert_eq!(member_on(&ctx, "1").as_deref(), Some("etcd2"));
        assert_eq!(member_on(&ctx, "2").as_deref(), Some("etcd3"));
        assert!(ctx.azure.disk("etcd2").unwrap().is_attached());

        let record = ctx.azure.record_set("abc12.k8s.westeurope.example.io", "etcd2").unwrap();
        assert_eq!(record.properties.a_records[0].ipv4_address, "10.0.0.11");
        assert_eq!(record.properties.ttl, Some(60));

        let commands = ctx.azure.run_commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].0, "0");
        assert!(commands[0].1.script[0].contains("ETCD_INITIAL_CLUSTER_STATE=new"));
        assert!(commands[1].1.script[0].contains("ETCD_INITIAL_CLUSTER_STATE=existing"));

        let all_members = ["etcd1", "etcd2", "etcd3"]
            .iter()
            .map(|m| format!("{m}={}", member_url(&cr, m)))
            .collect::<Vec<_>>()
            .join(",");
        assert!(commands[2].1.script[0].contains(&format!("ETCD_INITIAL_CLUSTER={all_members}")));
    }

    #[tokio::test]
    async fn test_instance_with_disk_is_only_bootstrapped() {
        let ctx = create_test_context();
        let cr = create_test_azure_config("abc12", 1, &[1]);
        ctx.azure.add_vmss(VMSS, create_test_vmss(1, TEST_OPERATOR_VERSION));
        let mut vm = create_test_vm("0", Some("1"));
        vm.attach_disk(ETCD_DISK_LUN, "etcd1", &disk_id("sub-tenant", "abc12", "etcd1"));
        ctx.azure.add_instance(VMSS, vm);
        ctx.azure.set_instance_ip(VMSS, "0", "10.0.0.10");
        ctx.certs.add("abc12", EtcdCert::Etcd1, create_test_tls("etcd1"));
        let disks = EtcdDisks::new(&ctx.azure, &ctx.certs, ctx.management.as_ref(), TEST_OPERATOR_VERSION);

        disks.attach_disks(&cr).await.unwrap();

        assert!(ctx.azure.calls_matching("update_vmss_vm").is_empty());
        assert_eq!(ctx.azure.run_commands().len(), 1);
    }

    #[tokio::test]
    async fn test_unprovisioned_instances_are_skipped() {
        let ctx = create_test_context();
        let cr = create_test_azure_config("abc12", 3, &[1, 2, 3]);
        three_masters(&ctx);
        let mut creating = create_test_vm("3", Some("1"));
        creating.properties.provisioning_state = Some("Creating".to_string());
        ctx.azure.add_instance(VMSS, creating);
        let disks = EtcdDisks::new(&ctx.azure, &ctx.certs, ctx.management.as_ref(), TEST_OPERATOR_VERSION);

        disks.attach_disks(&cr).await.unwrap();

        assert_eq!(member_on(&ctx, "3"), None);
        assert!(ctx.azure.calls_matching("update_vmss_vm:abc12-master/3").is_empty());
    }

    #[tokio::test]
    async fn test_missing_scale_set_attaches_nothing() {
        let ctx = create_test_context();
        let cr = create_test_azure_config("abc12", 3, &[1, 2, 3]);
        let disks = EtcdDisks::new(&ctx.azure, &ctx.certs, ctx.management.as_ref(), TEST_OPERATOR_VERSION);

        disks.attach_disks(&cr).await.unwrap();

        assert!(ctx.azure.calls_matching("update_vmss_vm").is_empty());
        assert!(ctx.azure.run_commands().is_empty());
    }

    #[tokio::test]
    async fn test_existing_dns_record_points_at_new_address() {
        let ctx = create_test_context();
        let cr = create_test_azure_config("abc12", 3, &[1, 2, 3]);
        three_masters(&ctx);
        let zone = "abc12.k8s.westeurope.example.io";
        let mut stale = RecordSet::a_record("etcd1", 300, "10.0.0.99");
        stale.etag = Some("etag-1".to_string());
        ctx.azure
            .create_or_update_a_record_set("abc12", zone, "etcd1", &stale)
            .await
            .unwrap();
        let disks = EtcdDisks::new(&ctx.azure, &ctx.certs, ctx.management.as_ref(), TEST_OPERATOR_VERSION);

        disks.attach_disks(&cr).await.unwrap();

        let record = ctx.azure.record_set(zone, "etcd1").unwrap();
        assert_eq!(record.properties.a_records.len(), 1);
        assert_eq!(record.properties.a_records[0].ipv4_address, "10.0.0.10");
        assert_eq!(record.etag.as_deref(), Some("etag-1"));
    }

    #[tokio::test]
    async fn test_instance_without_interface_fails() {
        let ctx = create_test_context();
        let cr = create_test_azure_config("abc12", 1, &[1]);
        ctx.azure.add_vmss(VMSS, create_test_vmss(1, TEST_OPERATOR_VERSION));
        ctx.azure.add_instance(VMSS, create_test_vm("0", Some("1")));
        ctx.azure.add_disk(free_disk("etcd1", "1"));
        let disks = EtcdDisks::new(&ctx.azure, &ctx.certs, ctx.management.as_ref(), TEST_OPERATOR_VERSION);

        let err = disks.attach_disks(&cr).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(ctx.azure.run_commands().is_empty());
    }
}
