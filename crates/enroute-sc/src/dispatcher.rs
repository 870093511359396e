//!
//! # Config dispatcher
//!
//! Keeps one named config document synced to its sink: fetch the document
//! if present, deliver it, then follow a watch stream. A stream that ends
//! for any reason other than shutdown is reopened after a short delay; the
//! sink only ever observes "current state" snapshots, never the breakage.
//!
//! The same dispatcher drives the flavor feed, the address space feed and
//! every per-space address feed.
//!
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::select;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use enroute_model::event::StickySignal;

use crate::platform::{ConfigDocument, PlatformClient, PlatformError};

/// Receives full-replacement snapshots of one config document.
///
/// Failures are logged by the dispatcher and never terminate the watch.
#[async_trait]
pub trait SnapshotSink: Send + Sync + 'static {
    async fn apply(&self, doc: ConfigDocument) -> anyhow::Result<()>;
}

pub struct ConfigDispatcher<C, S> {
    client: Arc<C>,
    namespace: String,
    name: String,
    sink: S,
    reconnect_interval: Duration,
    shutdown: Arc<StickySignal>,
}

impl<C, S> ConfigDispatcher<C, S>
where
    C: PlatformClient,
    S: SnapshotSink,
{
    pub fn start(
        client: Arc<C>,
        namespace: String,
        name: String,
        sink: S,
        reconnect_interval: Duration,
        shutdown: Arc<StickySignal>,
    ) {
        let dispatcher = Self {
            client,
            namespace,
            name,
            sink,
            reconnect_interval,
            shutdown,
        };

        tokio::spawn(dispatcher.dispatch_loop());
    }

    #[instrument(skip(self), fields(namespace = %self.namespace, config = %self.name))]
    async fn dispatch_loop(self) {
        loop {
            if self.shutdown.is_raised() {
                break;
            }

            if let Err(err) = self.sync_session().await {
                warn!("watch interrupted: {err}, reconnecting");
            }

            select! {
                _ = self.shutdown.listen() => break,
                _ = sleep(self.reconnect_interval) => {}
            }
        }

        debug!("dispatcher stopped");
    }

    /// one fetch-then-watch session; returns when the stream ends
    async fn sync_session(&self) -> Result<(), PlatformError> {
        if let Some(doc) = self.client.get_config(&self.namespace, &self.name).await? {
            self.deliver(doc).await;
        }

        let mut stream = self.client.watch_config(&self.namespace, &self.name).await;

        loop {
            select! {
                _ = self.shutdown.listen() => return Ok(()),
                item = stream.next() => match item {
                    Some(Ok(doc)) => self.deliver(doc).await,
                    Some(Err(err)) => return Err(err),
                    None => {
                        debug!("watch stream closed");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn deliver(&self, doc: ConfigDocument) {
        debug!(version = doc.version, "delivering snapshot");
        if let Err(err) = self.sink.apply(doc).await {
            error!("snapshot sink failed: {err:#}");
        }
    }
}
