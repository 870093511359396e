//!
//! # Flavor store
//!
//! Local cache of the flavor catalog, fed full-replacement snapshots by the
//! flavor config watch. Readers may arrive before the watch has delivered
//! anything; they block up to their timeout instead of failing fast.
//!
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_lock::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::event::ChangePublisher;
use crate::flavor::Flavor;

pub type SharedFlavorStore = Arc<FlavorStore>;

#[derive(Debug, Error)]
pub enum FlavorError {
    #[error("timed out after {waited:?} waiting for flavor '{name}'")]
    Timeout { name: String, waited: Duration },
}

#[derive(Debug, Default)]
pub struct FlavorStore {
    flavors: RwLock<HashMap<String, Flavor>>,
    publisher: ChangePublisher,
}

impl FlavorStore {
    pub fn new_shared() -> SharedFlavorStore {
        Arc::new(Self::default())
    }

    /// Replace the entire catalog and wake every blocked reader in one pass.
    ///
    /// An empty map is a valid catalog, not "uninitialized".
    pub async fn update(&self, definitions: HashMap<String, Flavor>) {
        let mut write = self.flavors.write().await;
        let count = definitions.len();
        *write = definitions;
        drop(write);

        self.publisher.bump();
        debug!(count, "flavor catalog replaced");
    }

    /// non-blocking lookup
    pub async fn get(&self, name: &str) -> Option<Flavor> {
        self.flavors.read().await.get(name).cloned()
    }

    pub async fn count(&self) -> usize {
        self.flavors.read().await.len()
    }

    /// Block until `name` appears in the catalog or `wait` elapses.
    ///
    /// Never observes a half-replaced catalog: lookups run against one
    /// read guard per attempt and updates swap the whole map.
    pub async fn flavor(&self, name: &str, wait: Duration) -> Result<Flavor, FlavorError> {
        match tokio::time::timeout(wait, self.wait_for(name)).await {
            Ok(flavor) => Ok(flavor),
            Err(_) => Err(FlavorError::Timeout {
                name: name.to_owned(),
                waited: wait,
            }),
        }
    }

    async fn wait_for(&self, name: &str) -> Flavor {
        loop {
            if let Some(flavor) = self.get(name).await {
                return flavor;
            }

            let listener = self.publisher.listen();

            // the update may have landed between lookup and listen
            if let Some(flavor) = self.get(name).await {
                return flavor;
            }

            listener.await;
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use tokio::time::{Instant, sleep};

    use super::*;

    fn small_queue() -> Flavor {
        Flavor::builder()
            .name("small-queue")
            .template_name("queue-persisted")
            .build()
            .expect("flavor")
    }

    fn catalog(flavors: Vec<Flavor>) -> HashMap<String, Flavor> {
        flavors
            .into_iter()
            .map(|flavor| (flavor.name().to_owned(), flavor))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_before_first_update_times_out() {
        let store = FlavorStore::new_shared();
        let wait = Duration::from_millis(500);

        let started = Instant::now();
        let result = store.flavor("small-queue", wait).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(FlavorError::Timeout { .. })));
        // never earlier than the requested wait
        assert!(elapsed >= wait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_wakes_blocked_reader() {
        let store = FlavorStore::new_shared();

        let reader = store.clone();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let flavor = reader
                .flavor("small-queue", Duration::from_secs(60))
                .await
                .expect("flavor");
            (flavor, started.elapsed())
        });

        sleep(Duration::from_millis(100)).await;
        store.update(catalog(vec![small_queue()])).await;

        let (flavor, elapsed) = handle.await.expect("reader");
        assert_eq!(flavor.name(), "small-queue");
        // woken by the update, not by the timeout
        assert!(elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_update_wakes_all_readers() {
        let store = FlavorStore::new_shared();

        let mut handles = vec![];
        for _ in 0..3 {
            let reader = store.clone();
            handles.push(tokio::spawn(async move {
                reader.flavor("small-queue", Duration::from_secs(60)).await
            }));
        }

        sleep(Duration::from_millis(10)).await;
        store.update(catalog(vec![small_queue()])).await;

        for handle in handles {
            let flavor = handle.await.expect("reader").expect("flavor");
            assert_eq!(flavor.template_name(), "queue-persisted");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_catalog_is_valid() {
        let store = FlavorStore::new_shared();
        store.update(HashMap::new()).await;

        assert_eq!(store.count().await, 0);
        // lookups against an empty catalog still honor the timeout
        let result = store
            .flavor("small-queue", Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(FlavorError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_present_flavor_returns_immediately() {
        let store = FlavorStore::new_shared();
        store.update(catalog(vec![small_queue()])).await;

        let flavor = store
            .flavor("small-queue", Duration::from_secs(5))
            .await
            .expect("flavor");
        assert_eq!(flavor.name(), "small-queue");
    }
}
