//!
//! # Admin API
//!
//! Surface consumed by the user-facing façades. Address mutations are
//! read-modify-write operations on the space's desired-address document;
//! the reconciler reacts through its normal watch, so no direct cluster
//! mutation is reachable from here.
//!
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};
use uuid::Uuid;

use enroute_model::address::Address;
use enroute_model::flavor::Flavor;
use enroute_model::space::AddressSpaceId;

use crate::config::ControllerConfig;
use crate::controllers::SpaceController;
use crate::core::SharedContext;
use crate::error::ReconcileError;
use crate::platform::PlatformClient;

pub struct Admin<C> {
    ctx: SharedContext<C>,
    controller: Arc<SpaceController<C>>,
}

impl<C: PlatformClient> Admin<C> {
    pub fn new(ctx: SharedContext<C>, controller: Arc<SpaceController<C>>) -> Self {
        Self { ctx, controller }
    }

    pub async fn list_addresses(
        &self,
        space: &AddressSpaceId,
    ) -> Result<HashSet<Address>, ReconcileError> {
        Ok(self.read_addresses(space).await?.into_iter().collect())
    }

    /// Add one address to the desired set.
    ///
    /// The stable UUID is assigned here, exactly once; the flavor
    /// reference is validated against the catalog before anything is
    /// written.
    #[instrument(skip(self, address), fields(space = %space, address = %address.name))]
    pub async fn create_address(
        &self,
        space: &AddressSpaceId,
        mut address: Address,
    ) -> Result<Address, ReconcileError> {
        self.validate_flavor(&address).await?;

        let mut current = self.read_addresses(space).await?;
        if current.iter().any(|existing| existing.name == address.name) {
            return Err(ReconcileError::AddressExists(address.name));
        }

        if address.uuid.is_none() {
            address.uuid = Some(Uuid::new_v4());
        }
        current.push(address.clone());
        self.write_addresses(space, current).await?;

        debug!("address created");
        Ok(address)
    }

    /// Replace one address; the previously assigned UUID is preserved.
    #[instrument(skip(self, address), fields(space = %space, address = %address.name))]
    pub async fn replace_address(
        &self,
        space: &AddressSpaceId,
        mut address: Address,
    ) -> Result<Address, ReconcileError> {
        self.validate_flavor(&address).await?;

        let mut current = self.read_addresses(space).await?;
        let Some(existing) = current
            .iter_mut()
            .find(|existing| existing.name == address.name)
        else {
            return Err(ReconcileError::AddressNotFound(address.name));
        };

        // a UUID is assigned once and never reused
        address.uuid = existing.uuid.or(address.uuid);
        *existing = address.clone();
        self.write_addresses(space, current).await?;

        debug!("address replaced");
        Ok(address)
    }

    #[instrument(skip(self), fields(space = %space))]
    pub async fn delete_address(
        &self,
        space: &AddressSpaceId,
        name: &str,
    ) -> Result<(), ReconcileError> {
        let mut current = self.read_addresses(space).await?;
        let before = current.len();
        current.retain(|address| address.name != name);
        if current.len() == before {
            return Err(ReconcileError::AddressNotFound(name.to_owned()));
        }

        self.write_addresses(space, current).await?;
        debug!(address = %name, "address deleted");
        Ok(())
    }

    /// diagnostic snapshot of the currently managed spaces
    pub async fn address_spaces(&self) -> Vec<AddressSpaceId> {
        self.controller.address_spaces().await
    }

    /// bounded-wait flavor lookup for façades validating user input
    pub async fn flavor(&self, name: &str, wait: Duration) -> Result<Flavor, ReconcileError> {
        Ok(self.ctx.flavors().flavor(name, wait).await?)
    }

    async fn validate_flavor(&self, address: &Address) -> Result<(), ReconcileError> {
        if let Some(flavor) = &address.flavor {
            self.ctx
                .flavors()
                .flavor(flavor, self.ctx.config().flavor_wait)
                .await?;
        }
        Ok(())
    }

    async fn read_addresses(
        &self,
        space: &AddressSpaceId,
    ) -> Result<Vec<Address>, ReconcileError> {
        let name = ControllerConfig::address_config_name(space);
        match self
            .ctx
            .client()
            .get_config(space.namespace(), &name)
            .await?
        {
            Some(doc) => serde_json::from_value(doc.data).map_err(|err| {
                ReconcileError::Config(format!("corrupt address document '{name}': {err}"))
            }),
            None => Ok(vec![]),
        }
    }

    async fn write_addresses(
        &self,
        space: &AddressSpaceId,
        addresses: Vec<Address>,
    ) -> Result<(), ReconcileError> {
        let name = ControllerConfig::address_config_name(space);
        let data = serde_json::to_value(&addresses)
            .map_err(|err| ReconcileError::Config(err.to_string()))?;
        self.ctx
            .client()
            .put_config(space.namespace(), &name, data)
            .await?;
        Ok(())
    }
}
