//!
//! # In-memory platform
//!
//! Backs the test suites and the local run mode. Config watches are
//! channel-based; [`MemoryPlatform::drop_watch_streams`] closes every live
//! stream to simulate a broken watch. Mutation calls are counted so tests
//! can assert that a reconciliation pass issued no cluster changes.
//!
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_channel::{Sender, unbounded};
use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

use super::{
    ConfigDocument, Labels, PlatformClient, PlatformError, Resource, ResourceKind, WatchStream,
    selector_matches,
};

type ConfigKey = (String, String);
type ResourceKey = (String, ResourceKind, String);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MutationCounts {
    pub creates: u64,
    pub replaces: u64,
    pub deletes: u64,
}

impl MutationCounts {
    pub fn total(&self) -> u64 {
        self.creates + self.replaces + self.deletes
    }
}

#[derive(Debug, Default)]
pub struct MemoryPlatform {
    configs: RwLock<HashMap<ConfigKey, ConfigDocument>>,
    resources: RwLock<HashMap<ResourceKey, Resource>>,
    watchers: Mutex<HashMap<ConfigKey, Vec<Sender<ConfigDocument>>>>,
    creates: AtomicU64,
    replaces: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryPlatform {
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// number of mutation calls issued so far
    pub fn mutation_counts(&self) -> MutationCounts {
        MutationCounts {
            creates: self.creates.load(Ordering::SeqCst),
            replaces: self.replaces.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
        }
    }

    /// close every live watch stream without touching the documents
    pub async fn drop_watch_streams(&self) {
        self.watchers.lock().await.clear();
    }

    pub async fn resource(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Option<Resource> {
        self.resources
            .read()
            .await
            .get(&(namespace.to_owned(), kind, name.to_owned()))
            .cloned()
    }

    async fn publish(&self, key: &ConfigKey, doc: &ConfigDocument) {
        let mut watchers = self.watchers.lock().await;
        if let Some(senders) = watchers.get_mut(key) {
            senders.retain(|sender| sender.try_send(doc.clone()).is_ok());
        }
    }
}

#[async_trait]
impl PlatformClient for MemoryPlatform {
    async fn get_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigDocument>, PlatformError> {
        let key = (namespace.to_owned(), name.to_owned());
        Ok(self.configs.read().await.get(&key).cloned())
    }

    async fn put_config(
        &self,
        namespace: &str,
        name: &str,
        data: serde_json::Value,
    ) -> Result<(), PlatformError> {
        let key = (namespace.to_owned(), name.to_owned());

        let mut configs = self.configs.write().await;
        let version = configs.get(&key).map(|doc| doc.version + 1).unwrap_or(1);
        let doc = ConfigDocument {
            name: name.to_owned(),
            version,
            data,
        };
        configs.insert(key.clone(), doc.clone());
        drop(configs);

        debug!(namespace, name, version, "config document stored");
        self.publish(&key, &doc).await;
        Ok(())
    }

    async fn watch_config(&self, namespace: &str, name: &str) -> WatchStream {
        let key = (namespace.to_owned(), name.to_owned());
        let (sender, receiver) = unbounded();

        self.watchers
            .lock()
            .await
            .entry(key)
            .or_default()
            .push(sender);

        Box::pin(receiver.map(Ok::<_, PlatformError>))
    }

    async fn list_resources(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<Resource>, PlatformError> {
        Ok(self
            .resources
            .read()
            .await
            .iter()
            .filter(|((ns, _, _), resource)| {
                ns == namespace && selector_matches(&resource.labels, selector)
            })
            .map(|(_, resource)| resource.clone())
            .collect())
    }

    async fn create_resource(
        &self,
        namespace: &str,
        resource: Resource,
    ) -> Result<(), PlatformError> {
        self.creates.fetch_add(1, Ordering::SeqCst);

        let key = (namespace.to_owned(), resource.kind, resource.name.clone());
        let mut resources = self.resources.write().await;
        if resources.contains_key(&key) {
            return Err(PlatformError::AlreadyExists {
                kind: resource.kind,
                name: resource.name,
            });
        }
        resources.insert(key, resource);
        Ok(())
    }

    async fn replace_resource(
        &self,
        namespace: &str,
        resource: Resource,
    ) -> Result<(), PlatformError> {
        self.replaces.fetch_add(1, Ordering::SeqCst);

        let key = (namespace.to_owned(), resource.kind, resource.name.clone());
        self.resources.write().await.insert(key, resource);
        Ok(())
    }

    async fn delete_resource(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), PlatformError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);

        let key = (namespace.to_owned(), kind, name.to_owned());
        match self.resources.write().await.remove(&key) {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound {
                kind,
                name: name.to_owned(),
            }),
        }
    }
}
