//!
//! # Flavor model
//!
//! A flavor names an infrastructure template plus the parameters to
//! instantiate it. Flavors arrive through the flavor config feed and are
//! never created or deleted by the controller itself.
//!
use std::collections::BTreeMap;
use std::fmt;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlavorType {
    #[default]
    Queue,
    Topic,
}

impl fmt::Display for FlavorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Topic => write!(f, "topic"),
        }
    }
}

/// Immutable once built; construct through [`Flavor::builder`].
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct Flavor {
    name: String,
    #[builder(default)]
    flavor_type: FlavorType,
    template_name: String,
    #[builder(default)]
    template_parameters: BTreeMap<String, String>,
    #[builder(default)]
    description: Option<String>,
    #[builder(default)]
    uuid: Option<Uuid>,
}

impl Flavor {
    pub fn builder() -> FlavorBuilder {
        FlavorBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flavor_type(&self) -> FlavorType {
        self.flavor_type
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn template_parameters(&self) -> &BTreeMap<String, String> {
        &self.template_parameters
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn uuid(&self) -> Option<&Uuid> {
        self.uuid.as_ref()
    }
}
