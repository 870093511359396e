//!
//! # Infrastructure templates
//!
//! Built-in catalog of the templates flavors may reference. A template
//! declares its required parameters and whether the broker it provisions
//! can serve a whole destination group (shared-capable).
//!
use std::collections::BTreeMap;

pub const PARAM_STORAGE_CAPACITY: &str = "STORAGE_CAPACITY";
pub const PARAM_BROKER_IMAGE: &str = "BROKER_IMAGE";

pub const DEFAULT_BROKER_IMAGE: &str = "enroute/broker:latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub required_params: &'static [&'static str],
    /// one broker instance may serve multiple addresses
    pub shared_capable: bool,
    /// backed by a persistent volume claim
    pub persisted: bool,
}

#[derive(Debug)]
pub struct TemplateCatalog {
    templates: BTreeMap<&'static str, Template>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        let templates = [
            Template {
                name: "queue-persisted",
                required_params: &[PARAM_STORAGE_CAPACITY],
                shared_capable: false,
                persisted: true,
            },
            Template {
                name: "queue-inmemory",
                required_params: &[],
                shared_capable: false,
                persisted: false,
            },
            Template {
                name: "queue-shared",
                required_params: &[PARAM_STORAGE_CAPACITY],
                shared_capable: true,
                persisted: true,
            },
            Template {
                name: "topic-persisted",
                required_params: &[PARAM_STORAGE_CAPACITY],
                shared_capable: false,
                persisted: true,
            },
        ];

        Self {
            templates: templates
                .into_iter()
                .map(|template| (template.name, template))
                .collect(),
        }
    }
}

impl TemplateCatalog {
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.templates.keys().copied()
    }
}
