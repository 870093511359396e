//!
//! # Address Space model
//!
//! An address space is a tenant boundary: a named set of addresses with its
//! own messaging infrastructure, provisioned inside one platform namespace.
//!
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an address space: (name, namespace).
///
/// Used as the worker map key in the top level controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpaceId {
    name: String,
    namespace: String,
}

impl AddressSpaceId {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for AddressSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressSpaceType {
    #[default]
    Standard,
    Brokered,
}

/// Reference to the authentication service the space's routers delegate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthServiceRef {
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
}

/// Externally reachable endpoint requested for the space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    pub service: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceStatus {
    pub ready: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl SpaceStatus {
    pub fn ready() -> Self {
        Self {
            ready: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ready: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type", default)]
    pub space_type: AddressSpaceType,
    #[serde(default)]
    pub auth_service: Option<AuthServiceRef>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub status: SpaceStatus,
}

impl AddressSpace {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            space_type: AddressSpaceType::default(),
            auth_service: None,
            endpoints: vec![],
            status: SpaceStatus::default(),
        }
    }

    pub fn id(&self) -> AddressSpaceId {
        AddressSpaceId::new(self.name.clone(), self.namespace.clone())
    }
}
