//!
//! # Controller configuration
//!
use std::time::Duration;

use enroute_model::space::AddressSpaceId;

pub const DEFAULT_NAMESPACE: &str = "enroute";
pub const DEFAULT_FLAVOR_CONFIG: &str = "flavor-config";
pub const DEFAULT_SPACE_CONFIG: &str = "address-space-config";

const DEFAULT_FLAVOR_WAIT_MS: u64 = 10_000;
const DEFAULT_RECONNECT_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// namespace holding the controller's own config documents
    pub namespace: String,
    /// name of the flavor catalog document
    pub flavor_config_name: String,
    /// name of the address space document
    pub space_config_name: String,
    /// how long a reconciliation pass waits for a flavor definition
    pub flavor_wait: Duration,
    /// delay between watch reconnect attempts
    pub reconnect_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            flavor_config_name: DEFAULT_FLAVOR_CONFIG.to_owned(),
            space_config_name: DEFAULT_SPACE_CONFIG.to_owned(),
            flavor_wait: Duration::from_millis(DEFAULT_FLAVOR_WAIT_MS),
            reconnect_interval: Duration::from_millis(DEFAULT_RECONNECT_MS),
        }
    }
}

impl ControllerConfig {
    /// name of the desired-address document for one space, watched inside
    /// the space's own namespace
    pub fn address_config_name(space: &AddressSpaceId) -> String {
        format!("addresses-{}", space.name())
    }
}
