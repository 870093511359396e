//!
//! # Orchestration platform contract
//!
//! The controller consumes the platform through this trait: named config
//! documents delivered as full-replacement snapshots, and labeled
//! infrastructure resources. Retries for transient single-call failures are
//! the client's business; whole-watch-stream reconnection belongs to the
//! config dispatcher.
//!
mod memory;

pub use memory::{MemoryPlatform, MutationCounts};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Labels = BTreeMap<String, String>;

/// true when `labels` carries every entry of `selector`
pub fn selector_matches(labels: &Labels, selector: &Labels) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Deployment,
    Service,
    PersistentVolumeClaim,
    RouterConfig,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Deployment => write!(f, "deployment"),
            Self::Service => write!(f, "service"),
            Self::PersistentVolumeClaim => write!(f, "persistentvolumeclaim"),
            Self::RouterConfig => write!(f, "routerconfig"),
        }
    }
}

/// One infrastructure resource descriptor: kind, name, labels, spec payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub kind: ResourceKind,
    pub name: String,
    pub labels: Labels,
    pub spec: serde_json::Value,
}

impl Resource {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Named config document; the payload is always a complete snapshot,
/// never a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub name: String,
    pub version: i64,
    pub data: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

pub type WatchStream = BoxStream<'static, Result<ConfigDocument, PlatformError>>;

#[async_trait]
pub trait PlatformClient: Send + Sync + 'static {
    /// fetch one config document if it exists
    async fn get_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigDocument>, PlatformError>;

    /// create or replace one config document with a new full payload
    async fn put_config(
        &self,
        namespace: &str,
        name: &str,
        data: serde_json::Value,
    ) -> Result<(), PlatformError>;

    /// Open a watch over one config document.
    ///
    /// The stream yields full-replacement snapshots and may end at any
    /// time; callers are expected to resubscribe.
    async fn watch_config(&self, namespace: &str, name: &str) -> WatchStream;

    async fn list_resources(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<Resource>, PlatformError>;

    /// first-time creation; `AlreadyExists` when the resource is present
    async fn create_resource(
        &self,
        namespace: &str,
        resource: Resource,
    ) -> Result<(), PlatformError>;

    /// upsert
    async fn replace_resource(
        &self,
        namespace: &str,
        resource: Resource,
    ) -> Result<(), PlatformError>;

    async fn delete_resource(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), PlatformError>;
}
