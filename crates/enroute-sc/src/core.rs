//!
//! # Shared controller context
//!
//! Globally accessible handles: the platform client, the flavor store and
//! the process-level shutdown signal. The flavor store is the only state
//! shared across every per-space worker.
//!
use std::sync::Arc;

use enroute_model::event::StickySignal;
use enroute_model::store::{FlavorStore, SharedFlavorStore};

use crate::config::ControllerConfig;
use crate::platform::PlatformClient;

pub type SharedContext<C> = Arc<Context<C>>;

pub struct Context<C> {
    config: ControllerConfig,
    client: Arc<C>,
    flavors: SharedFlavorStore,
    shutdown: Arc<StickySignal>,
}

impl<C: PlatformClient> Context<C> {
    pub fn shared(config: ControllerConfig, client: Arc<C>) -> SharedContext<C> {
        Arc::new(Self {
            config,
            client,
            flavors: FlavorStore::new_shared(),
            shutdown: StickySignal::shared(),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn flavors(&self) -> &SharedFlavorStore {
        &self.flavors
    }

    pub fn shutdown(&self) -> &Arc<StickySignal> {
        &self.shutdown
    }
}
