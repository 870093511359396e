//!
//! # Cluster generator
//!
//! Pure transformation from one destination group plus its resolved flavor
//! into the resource set implementing it. No platform calls happen here;
//! the output is applied or discarded as a whole by the caller.
//!
mod templates;

pub use templates::{
    DEFAULT_BROKER_IMAGE, PARAM_BROKER_IMAGE, PARAM_STORAGE_CAPACITY, Template, TemplateCatalog,
};

use serde_json::json;
use sha2::{Digest, Sha256};

use enroute_model::address::Address;
use enroute_model::flavor::Flavor;
use enroute_model::space::{AddressSpace, AddressSpaceId, AuthServiceRef};

use crate::cluster::ResourceCluster;
use crate::error::ReconcileError;
use crate::platform::{Labels, Resource, ResourceKind};

pub const LABEL_APP: &str = "app";
pub const APP_NAME: &str = "enroute";
pub const LABEL_SPACE: &str = "enroute.io/space";
/// stable identifier derived from (space id, destination group id); the
/// diff key for matching applied resources back to their group
pub const LABEL_GROUP_ID: &str = "enroute.io/group-id";
pub const LABEL_SHARED: &str = "enroute.io/shared";
/// digest of the applied template, parameters and address membership
pub const LABEL_CONFIG_HASH: &str = "enroute.io/config-hash";

/// space-wide parameters stamped into every generated resource
#[derive(Debug, Clone)]
pub struct SpaceParams {
    pub space: AddressSpaceId,
    pub auth_service: Option<AuthServiceRef>,
}

impl SpaceParams {
    pub fn from_space(space: &AddressSpace) -> Self {
        Self {
            space: space.id(),
            auth_service: space.auth_service.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ClusterGenerator {
    catalog: TemplateCatalog,
    params: SpaceParams,
}

impl ClusterGenerator {
    pub fn new(params: SpaceParams) -> Self {
        Self {
            catalog: TemplateCatalog::default(),
            params,
        }
    }

    /// Stable per-group identifier, independent of how resource names are
    /// sanitized.
    pub fn group_digest(space: &AddressSpaceId, group: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(space.namespace().as_bytes());
        hasher.update(b"/");
        hasher.update(space.name().as_bytes());
        hasher.update(b"/");
        hasher.update(group.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_owned()
    }

    /// selector matching every resource this controller applied for a space
    pub fn space_selector(space: &AddressSpaceId) -> Labels {
        [
            (LABEL_APP.to_owned(), APP_NAME.to_owned()),
            (LABEL_SPACE.to_owned(), space_label(space)),
        ]
        .into()
    }

    /// Generate the cluster for one destination group.
    ///
    /// `flavor` is `None` for direct (brokerless) groups; partial output is
    /// never returned.
    pub fn generate(
        &self,
        group: &str,
        addresses: &[Address],
        flavor: Option<&Flavor>,
    ) -> Result<ResourceCluster, ReconcileError> {
        if addresses.is_empty() {
            return Err(ReconcileError::Config(format!(
                "destination group '{group}' has no addresses"
            )));
        }

        // deterministic output regardless of snapshot iteration order
        let mut addresses: Vec<Address> = addresses.to_vec();
        addresses.sort_by(|a, b| a.name.cmp(&b.name));

        let direct = addresses.iter().filter(|a| a.is_brokerless()).count();
        if direct == addresses.len() {
            self.router_cluster(group, &addresses, flavor)
        } else if direct == 0 {
            let flavor = flavor.ok_or_else(|| {
                ReconcileError::Config(format!(
                    "destination group '{group}' stores and forwards but has no flavor"
                ))
            })?;
            self.broker_cluster(group, &addresses, flavor)
        } else {
            Err(ReconcileError::Config(format!(
                "destination group '{group}' mixes store-and-forward and direct addresses"
            )))
        }
    }

    /// routing configuration only; direct addresses never get a broker
    fn router_cluster(
        &self,
        group: &str,
        addresses: &[Address],
        flavor: Option<&Flavor>,
    ) -> Result<ResourceCluster, ReconcileError> {
        if let Some(flavor) = flavor {
            return Err(ReconcileError::Config(format!(
                "direct destination group '{group}' takes no flavor, got '{}'",
                flavor.name()
            )));
        }

        let digest = Self::group_digest(&self.params.space, group);
        let config_hash = config_hash("direct", &[], addresses);
        let labels = self.cluster_labels(&digest, false, &config_hash);

        let entries: Vec<serde_json::Value> = addresses
            .iter()
            .map(|address| {
                json!({
                    "name": address.name,
                    "distribution": (if address.multicast { "multicast" } else { "balanced" }),
                })
            })
            .collect();

        let resources = vec![Resource {
            kind: ResourceKind::RouterConfig,
            name: sanitize_name(&format!("routes-{group}")),
            labels,
            spec: json!({ "addresses": entries }),
        }];

        Ok(ResourceCluster::new(
            self.params.space.clone(),
            digest,
            false,
            config_hash,
            resources,
        ))
    }

    /// broker deployment, optional persistent volume claim, and service
    fn broker_cluster(
        &self,
        group: &str,
        addresses: &[Address],
        flavor: &Flavor,
    ) -> Result<ResourceCluster, ReconcileError> {
        if let Some(direct) = addresses.iter().find(|a| a.is_brokerless()) {
            return Err(ReconcileError::Config(format!(
                "address '{}' is direct and needs no broker cluster",
                direct.name
            )));
        }

        let template = self.catalog.get(flavor.template_name()).ok_or_else(|| {
            ReconcileError::Config(format!(
                "flavor '{}' references unknown template '{}'",
                flavor.name(),
                flavor.template_name()
            ))
        })?;

        let parameters = flavor.template_parameters();
        for required in template.required_params {
            if !parameters.contains_key(*required) {
                return Err(ReconcileError::Config(format!(
                    "template '{}' requires parameter '{required}'",
                    template.name
                )));
            }
        }

        if addresses.len() > 1 && !template.shared_capable {
            return Err(ReconcileError::Config(format!(
                "template '{}' cannot serve {} addresses in group '{group}'",
                template.name,
                addresses.len()
            )));
        }

        let shared = template.shared_capable;
        let digest = Self::group_digest(&self.params.space, group);
        let param_pairs: Vec<(&str, &str)> = parameters
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        let config_hash = config_hash(template.name, &param_pairs, addresses);
        let labels = self.cluster_labels(&digest, shared, &config_hash);

        let image = parameters
            .get(PARAM_BROKER_IMAGE)
            .map(String::as_str)
            .unwrap_or(DEFAULT_BROKER_IMAGE);

        let mut env: Vec<serde_json::Value> = parameters
            .iter()
            .map(|(key, value)| json!({ "name": key, "value": value }))
            .collect();
        env.push(json!({
            "name": "ADDRESS_SPACE",
            "value": space_label(&self.params.space),
        }));
        env.push(json!({
            "name": "ADDRESS_LIST",
            "value": addresses
                .iter()
                .map(|address| address.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        }));
        if let Some(auth) = &self.params.auth_service {
            env.push(json!({ "name": "AUTH_SERVICE", "value": auth.name }));
        }

        let broker_name = format!("broker-{digest}");
        let mut resources = vec![Resource {
            kind: ResourceKind::Deployment,
            name: broker_name.clone(),
            labels: labels.clone(),
            spec: json!({
                "replicas": 1,
                "image": image,
                "env": env,
            }),
        }];

        if template.persisted {
            let capacity = parameters.get(PARAM_STORAGE_CAPACITY).ok_or_else(|| {
                ReconcileError::Config(format!(
                    "template '{}' persists but sets no {PARAM_STORAGE_CAPACITY}",
                    template.name
                ))
            })?;
            resources.push(Resource {
                kind: ResourceKind::PersistentVolumeClaim,
                name: format!("broker-data-{digest}"),
                labels: labels.clone(),
                spec: json!({ "storage": capacity }),
            });
        }

        resources.push(Resource {
            kind: ResourceKind::Service,
            name: broker_name,
            labels: labels.clone(),
            spec: json!({
                "ports": [ { "name": "amqp", "port": 5672 } ],
                "selector": { (LABEL_GROUP_ID): digest.clone() },
            }),
        });

        Ok(ResourceCluster::new(
            self.params.space.clone(),
            digest,
            shared,
            config_hash,
            resources,
        ))
    }

    fn cluster_labels(&self, digest: &str, shared: bool, config_hash: &str) -> Labels {
        let mut labels = Self::space_selector(&self.params.space);
        labels.insert(LABEL_GROUP_ID.to_owned(), digest.to_owned());
        labels.insert(LABEL_SHARED.to_owned(), shared.to_string());
        labels.insert(LABEL_CONFIG_HASH.to_owned(), config_hash.to_owned());
        labels
    }
}

fn space_label(space: &AddressSpaceId) -> String {
    format!("{}.{}", space.namespace(), space.name())
}

/// digest over everything that, when changed, requires re-applying the set
fn config_hash(template: &str, parameters: &[(&str, &str)], addresses: &[Address]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.as_bytes());
    for (key, value) in parameters {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b";");
    }

    let mut entries: Vec<String> = addresses
        .iter()
        .map(|address| {
            format!(
                "{}|{}|{}",
                address.name, address.store_and_forward, address.multicast
            )
        })
        .collect();
    entries.sort();
    for entry in entries {
        hasher.update(entry.as_bytes());
        hasher.update(b";");
    }

    let digest = hex::encode(hasher.finalize());
    digest[..16].to_owned()
}

/// platform resource names allow lowercase alphanumerics and dashes
fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}
