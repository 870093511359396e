//!
//! End to end reconciliation scenarios against the in-memory platform.
//!
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use enroute_model::address::Address;
use enroute_model::space::{AddressSpace, AddressSpaceId};
use enroute_sc::config::ControllerConfig;
use enroute_sc::generator::{ClusterGenerator, LABEL_GROUP_ID};
use enroute_sc::platform::{MemoryPlatform, PlatformClient, ResourceKind};
use enroute_sc::start_main_loop;

fn test_config() -> ControllerConfig {
    ControllerConfig {
        flavor_wait: Duration::from_millis(200),
        reconnect_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

/// let every control loop drain its pending work (paused tokio time)
async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

async fn seed_flavors(platform: &Arc<MemoryPlatform>, config: &ControllerConfig) {
    platform
        .put_config(
            &config.namespace,
            &config.flavor_config_name,
            json!({
                "small-queue": {
                    "templateName": "queue-persisted",
                    "templateParameters": { "STORAGE_CAPACITY": "2Gi" }
                },
                "shared-queue": {
                    "templateName": "queue-shared",
                    "templateParameters": { "STORAGE_CAPACITY": "10Gi" }
                }
            }),
        )
        .await
        .expect("seed flavors");
}

async fn declare_spaces(
    platform: &Arc<MemoryPlatform>,
    config: &ControllerConfig,
    spaces: &[AddressSpace],
) {
    platform
        .put_config(
            &config.namespace,
            &config.space_config_name,
            serde_json::to_value(spaces).expect("encode spaces"),
        )
        .await
        .expect("declare spaces");
}

async fn declare_addresses(
    platform: &Arc<MemoryPlatform>,
    space: &AddressSpaceId,
    addresses: &[Address],
) {
    platform
        .put_config(
            space.namespace(),
            &ControllerConfig::address_config_name(space),
            serde_json::to_value(addresses).expect("encode addresses"),
        )
        .await
        .expect("declare addresses");
}

async fn space_status_ready(
    platform: &Arc<MemoryPlatform>,
    config: &ControllerConfig,
    space: &AddressSpaceId,
) -> Option<bool> {
    let doc = platform
        .get_config(&config.namespace, &config.space_config_name)
        .await
        .expect("get spaces")?;
    let spaces: Vec<AddressSpace> = serde_json::from_value(doc.data).expect("decode spaces");
    spaces
        .into_iter()
        .find(|candidate| &candidate.id() == space)
        .map(|space| space.status.ready)
}

#[tokio::test(start_paused = true)]
async fn test_queue_provisioned_once_and_idempotent() {
    let platform = MemoryPlatform::new_shared();
    let config = test_config();
    let (_ctx, controller) = start_main_loop(config.clone(), platform.clone());

    seed_flavors(&platform, &config).await;
    let space = AddressSpace::new("tenant-a", "ns-a");
    declare_spaces(&platform, &config, std::slice::from_ref(&space)).await;
    settle().await;
    assert_eq!(controller.worker_count().await, 1);

    let addr1 = Address::queue("addr1", "addr1", "small-queue");
    declare_addresses(&platform, &space.id(), std::slice::from_ref(&addr1)).await;
    settle().await;

    // the deployment carries the flavor parameter and the stable group label
    let digest = ClusterGenerator::group_digest(&space.id(), "addr1");
    let deployment = platform
        .resource("ns-a", ResourceKind::Deployment, &format!("broker-{digest}"))
        .await
        .expect("broker deployment");
    assert_eq!(deployment.label(LABEL_GROUP_ID), Some(digest.as_str()));
    let env = deployment.spec["env"].as_array().expect("env");
    assert!(
        env.iter()
            .any(|entry| entry["name"] == "STORAGE_CAPACITY" && entry["value"] == "2Gi")
    );

    let after_first = platform.mutation_counts();
    // deployment, persistent volume claim, service
    assert_eq!(after_first.creates, 3);
    assert_eq!(after_first.total(), 3);
    assert_eq!(
        space_status_ready(&platform, &config, &space.id()).await,
        Some(true)
    );

    // an identical snapshot produces a pass with zero cluster mutations
    declare_addresses(&platform, &space.id(), std::slice::from_ref(&addr1)).await;
    settle().await;
    assert_eq!(platform.mutation_counts(), after_first);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_removed_address_cluster_is_deleted_once() {
    let platform = MemoryPlatform::new_shared();
    let config = test_config();
    let (_ctx, controller) = start_main_loop(config.clone(), platform.clone());

    seed_flavors(&platform, &config).await;
    let space = AddressSpace::new("tenant-a", "ns-a");
    declare_spaces(&platform, &config, std::slice::from_ref(&space)).await;

    let addr1 = Address::queue("addr1", "addr1", "small-queue");
    declare_addresses(&platform, &space.id(), std::slice::from_ref(&addr1)).await;
    settle().await;

    let digest = ClusterGenerator::group_digest(&space.id(), "addr1");
    assert!(
        platform
            .resource("ns-a", ResourceKind::Deployment, &format!("broker-{digest}"))
            .await
            .is_some()
    );

    // desired set transitions to empty: the cluster is deleted exactly once
    declare_addresses(&platform, &space.id(), &[]).await;
    settle().await;

    assert!(
        platform
            .resource("ns-a", ResourceKind::Deployment, &format!("broker-{digest}"))
            .await
            .is_none()
    );
    let counts = platform.mutation_counts();
    assert_eq!(counts.deletes, 3);

    // a second empty snapshot issues nothing further
    declare_addresses(&platform, &space.id(), &[]).await;
    settle().await;
    assert_eq!(platform.mutation_counts(), counts);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_worker_cardinality_follows_snapshots() {
    let platform = MemoryPlatform::new_shared();
    let config = test_config();
    let (_ctx, controller) = start_main_loop(config.clone(), platform.clone());

    let tenant_a = AddressSpace::new("tenant-a", "ns-a");
    let tenant_b = AddressSpace::new("tenant-b", "ns-b");
    let tenant_c = AddressSpace::new("tenant-c", "ns-c");

    declare_spaces(&platform, &config, &[tenant_a.clone(), tenant_b.clone()]).await;
    settle().await;
    assert_eq!(controller.worker_count().await, 2);

    declare_spaces(
        &platform,
        &config,
        &[tenant_a.clone(), tenant_b.clone(), tenant_c.clone()],
    )
    .await;
    settle().await;
    assert_eq!(controller.worker_count().await, 3);

    declare_spaces(&platform, &config, std::slice::from_ref(&tenant_b)).await;
    settle().await;
    let managed = controller.address_spaces().await;
    assert_eq!(managed, vec![tenant_b.id()]);

    declare_spaces(&platform, &config, &[]).await;
    settle().await;
    assert_eq!(controller.worker_count().await, 0);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_retired_space_processes_no_further_callbacks() {
    let platform = MemoryPlatform::new_shared();
    let config = test_config();
    let (_ctx, controller) = start_main_loop(config.clone(), platform.clone());

    seed_flavors(&platform, &config).await;
    let space = AddressSpace::new("tenant-a", "ns-a");
    declare_spaces(&platform, &config, std::slice::from_ref(&space)).await;
    declare_addresses(
        &platform,
        &space.id(),
        &[Address::queue("addr1", "addr1", "small-queue")],
    )
    .await;
    settle().await;

    let addr1_digest = ClusterGenerator::group_digest(&space.id(), "addr1");
    assert!(
        platform
            .resource(
                "ns-a",
                ResourceKind::Deployment,
                &format!("broker-{addr1_digest}")
            )
            .await
            .is_some()
    );

    // the space disappears from the desired snapshot
    declare_spaces(&platform, &config, &[]).await;
    settle().await;
    assert_eq!(controller.worker_count().await, 0);

    // feeding more addresses into the retired space's document does nothing
    declare_addresses(
        &platform,
        &space.id(),
        &[
            Address::queue("addr1", "addr1", "small-queue"),
            Address::queue("addr2", "addr2", "small-queue"),
        ],
    )
    .await;
    settle().await;

    let addr2_digest = ClusterGenerator::group_digest(&space.id(), "addr2");
    assert!(
        platform
            .resource(
                "ns-a",
                ResourceKind::Deployment,
                &format!("broker-{addr2_digest}")
            )
            .await
            .is_none()
    );

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shared_cluster_survives_partial_removal() {
    let platform = MemoryPlatform::new_shared();
    let config = test_config();
    let (_ctx, controller) = start_main_loop(config.clone(), platform.clone());

    seed_flavors(&platform, &config).await;
    let space = AddressSpace::new("tenant-a", "ns-a");
    declare_spaces(&platform, &config, std::slice::from_ref(&space)).await;

    let addr_a = Address::queue("a", "g", "shared-queue");
    let addr_b = Address::queue("b", "g", "shared-queue");
    declare_addresses(&platform, &space.id(), &[addr_a.clone(), addr_b]).await;
    settle().await;

    let digest = ClusterGenerator::group_digest(&space.id(), "g");
    let broker_name = format!("broker-{digest}");
    let deployment = platform
        .resource("ns-a", ResourceKind::Deployment, &broker_name)
        .await
        .expect("shared broker");
    let env = deployment.spec["env"].as_array().expect("env");
    assert!(
        env.iter()
            .any(|entry| entry["name"] == "ADDRESS_LIST" && entry["value"] == "a,b")
    );
    assert_eq!(platform.mutation_counts().creates, 3);

    // dropping one member must not remove the broker the other still uses
    declare_addresses(&platform, &space.id(), std::slice::from_ref(&addr_a)).await;
    settle().await;

    let deployment = platform
        .resource("ns-a", ResourceKind::Deployment, &broker_name)
        .await
        .expect("broker still present");
    let env = deployment.spec["env"].as_array().expect("env");
    assert!(
        env.iter()
            .any(|entry| entry["name"] == "ADDRESS_LIST" && entry["value"] == "a")
    );
    let counts = platform.mutation_counts();
    assert_eq!(counts.deletes, 0);
    assert_eq!(counts.replaces, 3);

    // dropping the last member retires the whole cluster
    declare_addresses(&platform, &space.id(), &[]).await;
    settle().await;
    assert!(
        platform
            .resource("ns-a", ResourceKind::Deployment, &broker_name)
            .await
            .is_none()
    );
    assert_eq!(platform.mutation_counts().deletes, 3);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_conflict_is_isolated_per_group() {
    let platform = MemoryPlatform::new_shared();
    let config = test_config();
    let (_ctx, controller) = start_main_loop(config.clone(), platform.clone());

    seed_flavors(&platform, &config).await;
    let space = AddressSpace::new("tenant-a", "ns-a");
    declare_spaces(&platform, &config, std::slice::from_ref(&space)).await;
    settle().await;

    // an unlabeled stray occupies addr1's deployment name; the lister will
    // not see it, so the create runs into a conflict
    let addr1_digest = ClusterGenerator::group_digest(&space.id(), "addr1");
    platform
        .create_resource(
            "ns-a",
            enroute_sc::platform::Resource {
                kind: ResourceKind::Deployment,
                name: format!("broker-{addr1_digest}"),
                labels: Default::default(),
                spec: json!({"stray": true}),
            },
        )
        .await
        .expect("stray");

    declare_addresses(
        &platform,
        &space.id(),
        &[
            Address::queue("addr1", "addr1", "small-queue"),
            Address::queue("addr2", "addr2", "small-queue"),
        ],
    )
    .await;
    settle().await;

    // the sibling group still converged
    let addr2_digest = ClusterGenerator::group_digest(&space.id(), "addr2");
    assert!(
        platform
            .resource(
                "ns-a",
                ResourceKind::Deployment,
                &format!("broker-{addr2_digest}")
            )
            .await
            .is_some()
    );

    // the stray was never overwritten and the space reports not ready
    let stray = platform
        .resource(
            "ns-a",
            ResourceKind::Deployment,
            &format!("broker-{addr1_digest}"),
        )
        .await
        .expect("stray survives");
    assert_eq!(stray.spec["stray"], true);
    assert_eq!(
        space_status_ready(&platform, &config, &space.id()).await,
        Some(false)
    );

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_flavor_skips_only_that_address() {
    let platform = MemoryPlatform::new_shared();
    let config = test_config();
    let (_ctx, controller) = start_main_loop(config.clone(), platform.clone());

    // note: no flavor catalog yet
    let space = AddressSpace::new("tenant-a", "ns-a");
    declare_spaces(&platform, &config, std::slice::from_ref(&space)).await;

    let queue = Address::queue("addr1", "addr1", "small-queue");
    let pings = Address::anycast("pings");
    declare_addresses(&platform, &space.id(), &[queue.clone(), pings.clone()]).await;
    settle().await;

    // the direct address converged while the queue waited out its flavor
    let pings_digest = ClusterGenerator::group_digest(&space.id(), "pings");
    assert!(
        platform
            .resource("ns-a", ResourceKind::RouterConfig, "routes-pings")
            .await
            .is_some_and(|resource| resource.label(LABEL_GROUP_ID)
                == Some(pings_digest.as_str()))
    );
    let addr1_digest = ClusterGenerator::group_digest(&space.id(), "addr1");
    assert!(
        platform
            .resource(
                "ns-a",
                ResourceKind::Deployment,
                &format!("broker-{addr1_digest}")
            )
            .await
            .is_none()
    );

    // catalog arrives; the next delivered snapshot retries the skipped address
    seed_flavors(&platform, &config).await;
    declare_addresses(&platform, &space.id(), &[queue, pings]).await;
    settle().await;

    assert!(
        platform
            .resource(
                "ns-a",
                ResourceKind::Deployment,
                &format!("broker-{addr1_digest}")
            )
            .await
            .is_some()
    );

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_clusters_converge_after_watch_disconnect() {
    let platform = MemoryPlatform::new_shared();
    let config = test_config();
    let (_ctx, controller) = start_main_loop(config.clone(), platform.clone());

    seed_flavors(&platform, &config).await;
    let space = AddressSpace::new("tenant-a", "ns-a");
    declare_spaces(&platform, &config, std::slice::from_ref(&space)).await;
    settle().await;

    // every live watch stream breaks; the declaration lands while the
    // dispatchers are reconnecting
    platform.drop_watch_streams().await;
    declare_addresses(
        &platform,
        &space.id(),
        &[Address::queue("addr1", "addr1", "small-queue")],
    )
    .await;
    settle().await;

    let digest = ClusterGenerator::group_digest(&space.id(), "addr1");
    assert!(
        platform
            .resource("ns-a", ResourceKind::Deployment, &format!("broker-{digest}"))
            .await
            .is_some()
    );

    controller.shutdown().await;
}
