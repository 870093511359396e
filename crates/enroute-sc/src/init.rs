//!
//! # Initialization
//!
//! All control loops are hooked up here: the flavor feed into the flavor
//! store, and the address space feed into the space controller (which in
//! turn deploys one address controller per declared space).
//!
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use enroute_model::flavor::{Flavor, FlavorType};
use enroute_model::store::SharedFlavorStore;

use crate::config::ControllerConfig;
use crate::controllers::SpaceController;
use crate::core::{Context, SharedContext};
use crate::dispatcher::{ConfigDispatcher, SnapshotSink};
use crate::platform::{ConfigDocument, PlatformClient};

pub fn start_main_loop<C: PlatformClient>(
    config: ControllerConfig,
    client: Arc<C>,
) -> (SharedContext<C>, Arc<SpaceController<C>>) {
    let ctx = Context::shared(config, client);

    ConfigDispatcher::start(
        ctx.client().clone(),
        ctx.config().namespace.clone(),
        ctx.config().flavor_config_name.clone(),
        FlavorSink {
            flavors: ctx.flavors().clone(),
        },
        ctx.config().reconnect_interval,
        ctx.shutdown().clone(),
    );

    let controller = SpaceController::start(ctx.clone());

    info!(namespace = %ctx.config().namespace, "control loops started");
    (ctx, controller)
}

/// wire shape of one flavor definition inside the catalog document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlavorDef {
    template_name: String,
    #[serde(default)]
    template_parameters: BTreeMap<String, String>,
    #[serde(rename = "type", default)]
    flavor_type: FlavorType,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    uuid: Option<Uuid>,
}

/// decodes catalog snapshots and replaces the flavor store contents
struct FlavorSink {
    flavors: SharedFlavorStore,
}

#[async_trait]
impl SnapshotSink for FlavorSink {
    async fn apply(&self, doc: ConfigDocument) -> anyhow::Result<()> {
        let defs: HashMap<String, FlavorDef> = serde_json::from_value(doc.data)?;

        let mut catalog = HashMap::new();
        for (name, def) in defs {
            let flavor = Flavor::builder()
                .name(name.clone())
                .flavor_type(def.flavor_type)
                .template_name(def.template_name)
                .template_parameters(def.template_parameters)
                .description(def.description)
                .uuid(def.uuid)
                .build();

            match flavor {
                Ok(flavor) => {
                    catalog.insert(name, flavor);
                }
                // one malformed definition must not block the catalog
                Err(err) => warn!(flavor = %name, "skipping malformed flavor: {err}"),
            }
        }

        self.flavors.update(catalog).await;
        Ok(())
    }
}
