//!
//! # Address controller
//!
//! One worker per address space. Driven by a watch over the space's
//! desired-address document, each pass diffs the desired destination
//! groups against the clusters applied on the platform and converges
//! them. Failures are isolated per group and retried on the next
//! delivered snapshot.
//!
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::select;
use tracing::{debug, error, info, instrument, trace, warn};

use enroute_model::address::Address;
use enroute_model::event::StickySignal;
use enroute_model::flavor::Flavor;
use enroute_model::space::{AddressSpace, AddressSpaceId, SpaceStatus};
use enroute_model::store::{AddressStore, SharedAddressStore};

use crate::cluster::ResourceCluster;
use crate::config::ControllerConfig;
use crate::core::SharedContext;
use crate::dispatcher::{ConfigDispatcher, SnapshotSink};
use crate::error::ReconcileError;
use crate::generator::{ClusterGenerator, LABEL_GROUP_ID, SpaceParams};
use crate::platform::{ConfigDocument, PlatformClient, Resource};

/// Handle the space controller keeps for one running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    space: AddressSpaceId,
    shutdown: Arc<StickySignal>,
}

impl WorkerHandle {
    pub fn space(&self) -> &AddressSpaceId {
        &self.space
    }

    /// Signal shutdown and return immediately.
    ///
    /// In-flight cache waits and platform calls are cancelled at their
    /// next suspension point, and the raised flag fences every mutation,
    /// so nothing new is issued once this returns.
    pub fn stop(&self) {
        self.shutdown.raise();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_raised()
    }
}

pub struct AddressController<C> {
    space: AddressSpace,
    ctx: SharedContext<C>,
    addresses: SharedAddressStore,
    generator: ClusterGenerator,
    shutdown: Arc<StickySignal>,
}

impl<C: PlatformClient> AddressController<C> {
    /// Start the worker for one address space.
    ///
    /// Only the start itself is reported here; ongoing reconciliation
    /// runs on the worker's own task.
    pub fn start(
        space: AddressSpace,
        ctx: SharedContext<C>,
    ) -> Result<WorkerHandle, ReconcileError> {
        if space.namespace.is_empty() {
            return Err(ReconcileError::Config(format!(
                "address space '{}' has no namespace",
                space.name
            )));
        }

        let id = space.id();
        let shutdown = StickySignal::shared();
        let addresses = AddressStore::new_shared();

        ConfigDispatcher::start(
            ctx.client().clone(),
            space.namespace.clone(),
            ControllerConfig::address_config_name(&id),
            AddressSink {
                store: addresses.clone(),
            },
            ctx.config().reconnect_interval,
            shutdown.clone(),
        );

        let controller = Self {
            generator: ClusterGenerator::new(SpaceParams::from_space(&space)),
            space,
            ctx,
            addresses,
            shutdown: shutdown.clone(),
        };

        info!(space = %id, "starting address controller");
        tokio::spawn(controller.dispatch_loop());

        Ok(WorkerHandle { space: id, shutdown })
    }

    #[instrument(skip(self), fields(space = %self.space.id()))]
    async fn dispatch_loop(self) {
        let mut listener = self.addresses.change_listener();

        // an un-synced store must not be read as "desired set is empty"
        select! {
            _ = self.shutdown.listen() => {
                debug!("stopped before first snapshot");
                return;
            }
            _ = listener.wait_for_initial_sync() => {}
        }

        loop {
            select! {
                _ = self.shutdown.listen() => break,
                result = self.reconcile() => match result {
                    Ok(status) => self.write_status(status).await,
                    Err(ReconcileError::Cancelled) => break,
                    Err(err) => {
                        error!("reconciliation pass failed: {err}");
                        self.write_status(SpaceStatus::failed(err.to_string())).await;
                    }
                }
            }

            select! {
                _ = self.shutdown.listen() => break,
                _ = listener.listen() => listener.load_last(),
            }
        }

        debug!("address controller stopped");
    }

    /// one desired-versus-actual pass
    #[instrument(skip(self))]
    async fn reconcile(&self) -> Result<SpaceStatus, ReconcileError> {
        let desired = self.addresses.snapshot().await;
        debug!(addresses = desired.len(), "reconciling");

        let mut groups: HashMap<String, Vec<Address>> = HashMap::new();
        for address in desired {
            groups
                .entry(address.group.clone())
                .or_default()
                .push(address);
        }

        let actual = self.list_applied().await?;

        let mut pending = 0usize;
        let mut desired_ids = HashSet::new();

        for (group, addresses) in &groups {
            let group_id = ClusterGenerator::group_digest(&self.space.id(), group);
            desired_ids.insert(group_id.clone());

            if let Err(err) = self
                .converge_group(group, addresses, actual.get(&group_id))
                .await
            {
                if matches!(err, ReconcileError::Cancelled) {
                    return Err(err);
                }
                // isolated: the remaining groups still converge this pass
                warn!(group = %group, "group not converged: {err}");
                pending += 1;
            }
        }

        for (group_id, resources) in &actual {
            if desired_ids.contains(group_id) {
                continue;
            }

            let cluster = ResourceCluster::from_applied(self.space.id(), resources.clone());
            if let Err(err) = self.retire_cluster(&cluster, &groups).await {
                if matches!(err, ReconcileError::Cancelled) {
                    return Err(err);
                }
                warn!(group_id = %group_id, "cluster not retired: {err}");
                pending += 1;
            }
        }

        Ok(if pending == 0 {
            SpaceStatus::ready()
        } else {
            SpaceStatus::failed(format!("{pending} destination group(s) pending"))
        })
    }

    async fn converge_group(
        &self,
        group: &str,
        addresses: &[Address],
        applied: Option<&Vec<Resource>>,
    ) -> Result<(), ReconcileError> {
        let flavor = self.resolve_flavor(group, addresses).await?;
        let cluster = self.generator.generate(group, addresses, flavor.as_ref())?;

        match applied {
            None => {
                self.mutation_fence()?;
                info!(group = %group, shared = cluster.shared(), "creating cluster");
                cluster
                    .create(self.ctx.client().as_ref(), &self.space.namespace)
                    .await
            }
            Some(resources) => {
                let current = ResourceCluster::from_applied(self.space.id(), resources.clone());
                if current.config_hash() == cluster.config_hash() {
                    trace!(group = %group, "cluster unchanged");
                    Ok(())
                } else {
                    self.mutation_fence()?;
                    info!(group = %group, "replacing cluster");
                    cluster
                        .create_or_replace(self.ctx.client().as_ref(), &self.space.namespace)
                        .await
                }
            }
        }
    }

    /// flavors resolve through the bounded-wait cache; direct groups
    /// take none
    async fn resolve_flavor(
        &self,
        group: &str,
        addresses: &[Address],
    ) -> Result<Option<Flavor>, ReconcileError> {
        if addresses.iter().all(Address::is_brokerless) {
            return Ok(None);
        }

        let mut names: HashSet<&str> = HashSet::new();
        for address in addresses {
            names.insert(address.flavor.as_deref().ok_or_else(|| {
                ReconcileError::Config(format!(
                    "address '{}' stores and forwards but has no flavor",
                    address.name
                ))
            })?);
        }
        if names.len() > 1 {
            return Err(ReconcileError::Config(format!(
                "destination group '{group}' mixes flavors"
            )));
        }

        // the set holds exactly one name at this point
        let name = names.into_iter().next().unwrap_or_default();
        let flavor = self
            .ctx
            .flavors()
            .flavor(name, self.ctx.config().flavor_wait)
            .await?;
        Ok(Some(flavor))
    }

    async fn retire_cluster(
        &self,
        cluster: &ResourceCluster,
        groups: &HashMap<String, Vec<Address>>,
    ) -> Result<(), ReconcileError> {
        // a shared cluster must not disappear under destinations that
        // still reference it
        if cluster.shared() {
            let remaining: usize = groups
                .iter()
                .filter(|(group, _)| {
                    ClusterGenerator::group_digest(&self.space.id(), group) == cluster.group_id()
                })
                .map(|(_, addresses)| addresses.len())
                .sum();
            if remaining > 0 {
                return Err(ReconcileError::InUse {
                    cluster: cluster.group_id().to_owned(),
                    remaining,
                });
            }
        }

        self.mutation_fence()?;
        info!(group_id = %cluster.group_id(), "deleting retired cluster");
        cluster
            .delete(self.ctx.client().as_ref(), &self.space.namespace)
            .await
    }

    async fn list_applied(&self) -> Result<HashMap<String, Vec<Resource>>, ReconcileError> {
        let selector = ClusterGenerator::space_selector(&self.space.id());
        let resources = self
            .ctx
            .client()
            .list_resources(&self.space.namespace, &selector)
            .await?;

        let mut by_group: HashMap<String, Vec<Resource>> = HashMap::new();
        for resource in resources {
            match resource.label(LABEL_GROUP_ID) {
                Some(group_id) => by_group
                    .entry(group_id.to_owned())
                    .or_default()
                    .push(resource),
                None => trace!(name = %resource.name, "ignoring unlabeled resource"),
            }
        }
        Ok(by_group)
    }

    /// no mutation is issued once the worker has been stopped
    fn mutation_fence(&self) -> Result<(), ReconcileError> {
        if self.shutdown.is_raised() {
            Err(ReconcileError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// best effort readiness write-back on the space document
    async fn write_status(&self, status: SpaceStatus) {
        if let Err(err) = self.update_space_status(&status).await {
            warn!("could not write space status: {err}");
        }
    }

    async fn update_space_status(&self, status: &SpaceStatus) -> Result<(), ReconcileError> {
        let config = self.ctx.config();
        let Some(doc) = self
            .ctx
            .client()
            .get_config(&config.namespace, &config.space_config_name)
            .await?
        else {
            return Ok(());
        };

        let mut spaces: Vec<AddressSpace> = serde_json::from_value(doc.data).map_err(|err| {
            ReconcileError::Config(format!("corrupt address space document: {err}"))
        })?;

        let id = self.space.id();
        let Some(entry) = spaces.iter_mut().find(|space| space.id() == id) else {
            return Ok(());
        };
        if &entry.status == status {
            return Ok(());
        }

        entry.status = status.clone();
        let data = serde_json::to_value(&spaces)
            .map_err(|err| ReconcileError::Config(err.to_string()))?;
        self.ctx
            .client()
            .put_config(&config.namespace, &config.space_config_name, data)
            .await?;

        debug!(ready = status.ready, "space status written");
        Ok(())
    }
}

/// syncs delivered address snapshots into the worker's store
struct AddressSink {
    store: SharedAddressStore,
}

#[async_trait]
impl SnapshotSink for AddressSink {
    async fn apply(&self, doc: ConfigDocument) -> anyhow::Result<()> {
        let addresses: Vec<Address> = serde_json::from_value(doc.data)?;
        self.store.sync_all(addresses).await;
        Ok(())
    }
}
