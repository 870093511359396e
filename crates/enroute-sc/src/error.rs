use thiserror::Error;

use enroute_model::store::FlavorError;

use crate::platform::{PlatformError, ResourceKind};

/// Errors raised while converging one address space.
///
/// Per-address and per-cluster failures are isolated and logged by the
/// address controller; none of them is fatal to the process.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// bad or missing flavor/template definition; needs an operator fix
    #[error("configuration error: {0}")]
    Config(String),

    /// cache wait expired; self-heals once the flavor feed delivers
    #[error(transparent)]
    FlavorWait(#[from] FlavorError),

    /// resource existed on create; the actual-state read was stale
    #[error("{kind} '{name}' already exists, actual state was stale")]
    Conflict { kind: ResourceKind, name: String },

    /// delete of a shared cluster that other destinations still use
    #[error("cluster '{cluster}' still serves {remaining} other address(es)")]
    InUse { cluster: String, remaining: usize },

    #[error("address '{0}' not found")]
    AddressNotFound(String),

    #[error("address '{0}' already exists")]
    AddressExists(String),

    /// the owning worker was stopped; abandon the pass quietly
    #[error("worker stopped")]
    Cancelled,

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl ReconcileError {
    /// retryable errors are expected to clear on a later snapshot
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FlavorWait(_) | Self::Conflict { .. } | Self::InUse { .. } | Self::Platform(_)
        )
    }
}
