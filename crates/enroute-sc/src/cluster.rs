//!
//! # Resource cluster
//!
//! Handle over the resource set implementing one destination group. The
//! handle is recomputed on every reconciliation pass; the platform itself
//! is the system of record for what is actually applied.
//!
use tracing::{debug, instrument, trace};

use enroute_model::space::AddressSpaceId;

use crate::error::ReconcileError;
use crate::generator::{LABEL_CONFIG_HASH, LABEL_GROUP_ID, LABEL_SHARED};
use crate::platform::{PlatformClient, PlatformError, Resource};

#[derive(Debug, Clone)]
pub struct ResourceCluster {
    space: AddressSpaceId,
    /// stable identifier for (space, destination group)
    group_id: String,
    shared: bool,
    config_hash: String,
    resources: Vec<Resource>,
}

impl ResourceCluster {
    pub(crate) fn new(
        space: AddressSpaceId,
        group_id: String,
        shared: bool,
        config_hash: String,
        resources: Vec<Resource>,
    ) -> Self {
        Self {
            space,
            group_id,
            shared,
            config_hash,
            resources,
        }
    }

    /// Rebuild a handle from resources listed off the platform.
    ///
    /// Used for the actual-minus-desired side of the diff, where the
    /// desired declaration (and its flavor) may no longer exist.
    pub fn from_applied(space: AddressSpaceId, resources: Vec<Resource>) -> Self {
        let group_id = resources
            .first()
            .and_then(|resource| resource.label(LABEL_GROUP_ID))
            .unwrap_or_default()
            .to_owned();
        let shared = resources
            .first()
            .and_then(|resource| resource.label(LABEL_SHARED))
            .is_some_and(|value| value == "true");
        let config_hash = resources
            .first()
            .and_then(|resource| resource.label(LABEL_CONFIG_HASH))
            .unwrap_or_default()
            .to_owned();

        Self {
            space,
            group_id,
            shared,
            config_hash,
            resources,
        }
    }

    pub fn space(&self) -> &AddressSpaceId {
        &self.space
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn shared(&self) -> bool {
        self.shared
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// First-time creation of every resource in the set.
    ///
    /// Any resource already present means the caller's actual-state read
    /// was stale; surfaced as `Conflict` and re-evaluated on the next pass.
    #[instrument(skip(self, client), fields(group = %self.group_id))]
    pub async fn create<C: PlatformClient>(
        &self,
        client: &C,
        namespace: &str,
    ) -> Result<(), ReconcileError> {
        for resource in &self.resources {
            match client.create_resource(namespace, resource.clone()).await {
                Ok(()) => trace!(kind = %resource.kind, name = %resource.name, "created"),
                Err(PlatformError::AlreadyExists { kind, name }) => {
                    return Err(ReconcileError::Conflict { kind, name });
                }
                Err(err) => return Err(err.into()),
            }
        }

        debug!(resources = self.resources.len(), "cluster created");
        Ok(())
    }

    /// upsert every resource; used when flavor parameters or the address
    /// membership of a shared cluster changed
    #[instrument(skip(self, client), fields(group = %self.group_id))]
    pub async fn create_or_replace<C: PlatformClient>(
        &self,
        client: &C,
        namespace: &str,
    ) -> Result<(), ReconcileError> {
        for resource in &self.resources {
            client.replace_resource(namespace, resource.clone()).await?;
        }

        debug!(resources = self.resources.len(), "cluster replaced");
        Ok(())
    }

    /// Remove every resource in the set.
    ///
    /// The shared-in-use guard lives in the reconciler; by the time this
    /// runs no desired destination may reference the cluster.
    #[instrument(skip(self, client), fields(group = %self.group_id))]
    pub async fn delete<C: PlatformClient>(
        &self,
        client: &C,
        namespace: &str,
    ) -> Result<(), ReconcileError> {
        for resource in &self.resources {
            match client
                .delete_resource(namespace, resource.kind, &resource.name)
                .await
            {
                Ok(()) => trace!(kind = %resource.kind, name = %resource.name, "deleted"),
                // tolerate a previously interrupted delete
                Err(PlatformError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }

        debug!(resources = self.resources.len(), "cluster deleted");
        Ok(())
    }
}
