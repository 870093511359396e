//!
//! # CLI for the space controller
//!
//! Parameters layer in sequence: default values first, then cli
//! parameters on top.
//!
use std::time::Duration;

use clap::Parser;

use crate::config::ControllerConfig;

#[derive(Debug, Parser)]
#[command(name = "enroute-sc", about = "Enroute Space Controller")]
pub struct ScOpt {
    /// namespace holding the controller's config documents
    #[arg(
        short = 'n',
        long = "namespace",
        value_name = "namespace",
        env = "ENROUTE_NAMESPACE"
    )]
    namespace: Option<String>,

    /// name of the flavor catalog document
    #[arg(long)]
    flavor_config: Option<String>,

    /// name of the address space document
    #[arg(long)]
    space_config: Option<String>,

    /// milliseconds a reconciliation pass waits for a flavor definition
    #[arg(long)]
    flavor_wait_ms: Option<u64>,

    /// milliseconds between watch reconnect attempts
    #[arg(long)]
    reconnect_ms: Option<u64>,
}

impl ScOpt {
    pub fn as_config(self) -> ControllerConfig {
        let mut config = ControllerConfig::default();

        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }
        if let Some(name) = self.flavor_config {
            config.flavor_config_name = name;
        }
        if let Some(name) = self.space_config {
            config.space_config_name = name;
        }
        if let Some(ms) = self.flavor_wait_ms {
            config.flavor_wait = Duration::from_millis(ms);
        }
        if let Some(ms) = self.reconnect_ms {
            config.reconnect_interval = Duration::from_millis(ms);
        }

        config
    }
}
