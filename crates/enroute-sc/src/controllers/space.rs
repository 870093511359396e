//!
//! # Space controller
//!
//! Top level: watches the address space document and keeps exactly one
//! running address controller per declared space. The worker map is the
//! sole source of truth for which spaces are managed; one lock covers the
//! watch callback, worker bookkeeping and diagnostic reads.
//!
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_lock::Mutex;
use async_trait::async_trait;
use tracing::{debug, error, info, instrument};

use enroute_model::space::{AddressSpace, AddressSpaceId};

use crate::controllers::{AddressController, WorkerHandle};
use crate::core::SharedContext;
use crate::dispatcher::{ConfigDispatcher, SnapshotSink};
use crate::platform::{ConfigDocument, PlatformClient};

pub struct SpaceController<C> {
    ctx: SharedContext<C>,
    workers: Mutex<HashMap<AddressSpaceId, WorkerHandle>>,
}

impl<C: PlatformClient> SpaceController<C> {
    pub fn start(ctx: SharedContext<C>) -> Arc<Self> {
        let controller = Arc::new(Self {
            ctx: ctx.clone(),
            workers: Mutex::new(HashMap::new()),
        });

        ConfigDispatcher::start(
            ctx.client().clone(),
            ctx.config().namespace.clone(),
            ctx.config().space_config_name.clone(),
            SpaceSink {
                controller: controller.clone(),
            },
            ctx.config().reconnect_interval,
            ctx.shutdown().clone(),
        );

        info!("space controller started");
        controller
    }

    /// Diff the desired spaces against the running workers.
    ///
    /// Newly declared spaces get a worker deployed; workers whose space
    /// disappeared are stopped and dropped from the map. A failed start is
    /// logged and retried on the next snapshot.
    #[instrument(skip(self, desired))]
    async fn sync_spaces(&self, desired: Vec<AddressSpace>) {
        let mut workers = self.workers.lock().await;

        let desired_ids: HashSet<AddressSpaceId> =
            desired.iter().map(AddressSpace::id).collect();

        for space in desired {
            let id = space.id();
            if workers.contains_key(&id) {
                continue;
            }

            match AddressController::start(space, self.ctx.clone()) {
                Ok(handle) => {
                    info!(space = %id, "worker deployed");
                    workers.insert(id, handle);
                }
                Err(err) => error!(space = %id, "worker start failed: {err}"),
            }
        }

        workers.retain(|id, handle| {
            if desired_ids.contains(id) {
                true
            } else {
                info!(space = %id, "retiring worker");
                handle.stop();
                false
            }
        });

        debug!(running = workers.len(), "space sync complete");
    }

    /// diagnostic snapshot of the managed spaces, under the worker-map lock
    pub async fn address_spaces(&self) -> Vec<AddressSpaceId> {
        self.workers.lock().await.keys().cloned().collect()
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// stop every worker and the controller's own watch
    pub async fn shutdown(&self) {
        self.ctx.shutdown().raise();

        let mut workers = self.workers.lock().await;
        for handle in workers.values() {
            handle.stop();
        }
        workers.clear();

        info!("space controller stopped");
    }
}

struct SpaceSink<C> {
    controller: Arc<SpaceController<C>>,
}

#[async_trait]
impl<C: PlatformClient> SnapshotSink for SpaceSink<C> {
    async fn apply(&self, doc: ConfigDocument) -> anyhow::Result<()> {
        let spaces: Vec<AddressSpace> = serde_json::from_value(doc.data)?;
        self.controller.sync_spaces(spaces).await;
        Ok(())
    }
}
