//! Resource Registry
//!
//! Builds each resource from its embedded manifest on first request and hands
//! out the same instance afterwards. The registry is an explicit value owned by
//! the caller, so tests and hosts can hold independent registries.

use super::{Resource, ResourceType};
use crate::error::{NodeError, NodeResult};
use serde_json::{json, Value};
use std::sync::OnceLock;

pub struct ResourceRegistry {
    slots: [OnceLock<Resource>; ResourceType::COUNT],
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    /// Get a resource by its type name, building it on first access
    pub fn get_resource(&self, resource_type: &str) -> NodeResult<&Resource> {
        let kind = ResourceType::from_str(resource_type)
            .ok_or_else(|| NodeError::UnsupportedResourceType(resource_type.to_string()))?;
        self.resource(kind)
    }

    /// Typed lookup
    pub fn resource(&self, kind: ResourceType) -> NodeResult<&Resource> {
        let slot = &self.slots[kind.index()];
        if let Some(resource) = slot.get() {
            return Ok(resource);
        }

        // Two callers racing here both parse; the first stored instance wins
        let resource = Resource::load(kind)?;
        tracing::debug!("Loaded resource {}", kind.as_str());
        Ok(slot.get_or_init(|| resource))
    }

    pub fn is_resource_supported(&self, resource_type: &str) -> bool {
        ResourceType::from_str(resource_type).is_some()
    }

    /// All supported type names, in display order
    pub fn supported_resources(&self) -> Vec<&'static str> {
        ResourceType::ALL.iter().map(|r| r.as_str()).collect()
    }

    /// `[{name, value}]` pairs for the host's resource selector
    pub fn resource_display_names(&self) -> NodeResult<Vec<Value>> {
        ResourceType::ALL
            .iter()
            .map(|kind| {
                let resource = self.resource(*kind)?;
                Ok(json!({
                    "name": resource.display_name(),
                    "value": kind.as_str(),
                }))
            })
            .collect()
    }

    /// Full node description: resource selector followed by each resource's
    /// operation selector and fields
    pub fn node_description(&self) -> NodeResult<Value> {
        let mut properties = vec![json!({
            "displayName": "Resource",
            "name": "resource",
            "type": "options",
            "noDataExpression": true,
            "options": self.resource_display_names()?,
            "default": ResourceType::Collection.as_str(),
        })];

        for kind in ResourceType::ALL {
            let manifest = self.resource(kind)?.manifest();
            properties.push(manifest.operation_field());
            for field in manifest.host_fields() {
                properties.push(serde_json::to_value(field).map_err(|e| {
                    NodeError::Configuration(format!("Failed to serialize field: {}", e))
                })?);
            }
        }

        Ok(json!({
            "displayName": "Typesense",
            "name": "typesense",
            "group": ["transform"],
            "version": 1,
            "subtitle": "={{$parameter[\"operation\"] + \": \" + $parameter[\"resource\"]}}",
            "description": "Manage collections, documents and search in Typesense",
            "defaults": { "name": "Typesense" },
            "inputs": ["main"],
            "outputs": ["main"],
            "credentials": [{ "name": "typesenseApi", "required": true }],
            "properties": properties,
        }))
    }
}
