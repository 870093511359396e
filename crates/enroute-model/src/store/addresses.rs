//!
//! # Address store
//!
//! Holds the most recent desired-address snapshot for one address space.
//! The address config watch replaces the whole set on every delivery; the
//! per-space reconciler observes it through a [`ChangeListener`], so a burst
//! of snapshots collapses into one wakeup and only the latest set is read.
//!
use std::collections::HashSet;
use std::sync::Arc;

use async_lock::RwLock;
use tracing::{debug, trace};

use crate::address::Address;
use crate::event::ChangePublisher;

pub type SharedAddressStore = Arc<AddressStore>;

#[derive(Debug, Default)]
pub struct AddressStore {
    addresses: RwLock<HashSet<Address>>,
    publisher: ChangePublisher,
}

impl AddressStore {
    pub fn new_shared() -> SharedAddressStore {
        Arc::new(Self::default())
    }

    /// full replacement sync; the incoming set is the source of truth
    pub async fn sync_all(&self, incoming: Vec<Address>) {
        let mut write = self.addresses.write().await;
        let count = incoming.len();
        *write = incoming.into_iter().collect();
        drop(write);

        self.publisher.bump();
        debug!(count, "address snapshot synced");
    }

    pub async fn snapshot(&self) -> HashSet<Address> {
        self.addresses.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.addresses.read().await.len()
    }

    /// true once at least one snapshot has been delivered
    pub fn is_synced(&self) -> bool {
        self.publisher.current_change() > 0
    }

    pub fn change_listener(self: &Arc<Self>) -> ChangeListener {
        ChangeListener {
            store: self.clone(),
            last_change: 0,
        }
    }
}

/// Tracks how far one consumer has caught up with the store.
#[derive(Debug)]
pub struct ChangeListener {
    store: SharedAddressStore,
    last_change: i64,
}

impl ChangeListener {
    pub fn has_change(&self) -> bool {
        self.store.publisher.current_change() > self.last_change
    }

    /// mark everything up to now as seen
    pub fn load_last(&mut self) {
        self.last_change = self.store.publisher.current_change();
    }

    pub fn last_change(&self) -> i64 {
        self.last_change
    }

    /// Return once the store has changed past what this listener has seen.
    ///
    /// Check-listen-recheck so a sync landing between the check and the
    /// listener registration is never missed.
    pub async fn listen(&self) {
        if self.has_change() {
            trace!(last = self.last_change, "change already pending");
            return;
        }

        let listener = self.store.publisher.listen();

        if self.has_change() {
            trace!(last = self.last_change, "change arrived while registering");
            return;
        }

        listener.await;
    }

    /// Block until the first snapshot has been delivered.
    ///
    /// An un-synced store must never be read as "desired set is empty".
    pub async fn wait_for_initial_sync(&mut self) {
        while !self.store.is_synced() {
            self.listen().await;
        }
        self.load_last();
    }
}
