//!
//! # Address model
//!
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One routable destination (queue, topic, anycast or multicast link)
/// inside an address space.
///
/// Equality and hashing exclude the UUID: the UUID is a stable join key
/// assigned once by the admin API, while the reconciliation diff must
/// recognize the same logical destination no matter which path declared it.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: String,
    pub group: String,
    pub store_and_forward: bool,
    pub multicast: bool,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub uuid: Option<Uuid>,
}

impl Address {
    /// store and forward destination backed by a broker
    pub fn queue(
        name: impl Into<String>,
        group: impl Into<String>,
        flavor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            store_and_forward: true,
            multicast: false,
            flavor: Some(flavor.into()),
            uuid: None,
        }
    }

    pub fn topic(
        name: impl Into<String>,
        group: impl Into<String>,
        flavor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            store_and_forward: true,
            multicast: true,
            flavor: Some(flavor.into()),
            uuid: None,
        }
    }

    /// direct routed, point to point
    pub fn anycast(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            group: name.clone(),
            name,
            store_and_forward: false,
            multicast: false,
            flavor: None,
            uuid: None,
        }
    }

    /// direct routed, fan out
    pub fn multicast(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            group: name.clone(),
            name,
            store_and_forward: false,
            multicast: true,
            flavor: None,
            uuid: None,
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    /// direct routed addresses need no broker cluster
    pub fn is_brokerless(&self) -> bool {
        !self.store_and_forward
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.group == other.group
            && self.store_and_forward == other.store_and_forward
            && self.multicast == other.multicast
            && self.flavor == other.flavor
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.group.hash(state);
        self.store_and_forward.hash(state);
        self.multicast.hash(state);
        self.flavor.hash(state);
    }
}
