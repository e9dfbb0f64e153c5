//! Desired-state documents
//!
//! A document is JSON: an optional `provider` section and a list of
//! resources, each with a type, a name unique within its type, and
//! attributes.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tideline_core::resource::{Resource, ResourceId, Value};
use tideline_provider_aws::settings::ProviderSettings;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub provider: ProviderSettings,
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let document: Document =
            serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;
        document.provider.validate()?;

        let mut seen = HashSet::new();
        for spec in &document.resources {
            let id = ResourceId::new(&spec.resource_type, &spec.name);
            if !seen.insert(id.clone()) {
                return Err(format!("Duplicate resource {}", id));
            }
        }
        Ok(document)
    }

    /// Resources in document order
    pub fn resources(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .map(|spec| Resource {
                id: ResourceId::new(&spec.resource_type, &spec.name),
                attributes: spec.attributes.clone(),
            })
            .collect()
    }
}
