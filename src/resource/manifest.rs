//! Resource Manifests
//!
//! The declarative half of a resource: operations and UI fields as the host's
//! form renderer consumes them. Loaded from JSON files embedded at compile
//! time.

use super::ResourceType;
use crate::error::{NodeError, NodeResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Embedded manifest for a resource type (compiled into the binary)
fn manifest_source(kind: ResourceType) -> &'static str {
    match kind {
        ResourceType::Collection => include_str!("../resources/collection.json"),
        ResourceType::Document => include_str!("../resources/document.json"),
        ResourceType::Search => include_str!("../resources/search.json"),
        ResourceType::Analytics => include_str!("../resources/analytics.json"),
        ResourceType::ApiKey => include_str!("../resources/api_key.json"),
        ResourceType::Alias => include_str!("../resources/alias.json"),
        ResourceType::Synonym => include_str!("../resources/synonym.json"),
        ResourceType::Override => include_str!("../resources/override.json"),
        ResourceType::Conversation => include_str!("../resources/conversation.json"),
    }
}

/// Field types understood by the host's form renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Options,
    MultiOptions,
    Collection,
    FixedCollection,
    Json,
    DateTime,
    Notice,
}

/// Selectable value of an `options` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    pub name: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Conditional visibility: show when every listed sibling has one of the
/// listed values, hide when any listed sibling matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub show: BTreeMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hide: BTreeMap<String, Vec<Value>>,
}

/// Named group of a `fixedCollection`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldGroup {
    pub name: String,
    pub display_name: String,
    pub values: Vec<FieldDef>,
}

/// One UI field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub display_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub default: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
    /// Choices of an `options`/`multiOptions` field, or the child fields of
    /// a `collection`/`fixedCollection`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_options: Option<Map<String, Value>>,
}

/// Entry of a field's `options` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldOption {
    Group(FieldGroup),
    Field(Box<FieldDef>),
    Value(OptionValue),
}

impl FieldDef {
    /// Whether the field is shown for the given sibling values
    ///
    /// Siblings absent from `values` do not hide the field; the host fills
    /// them in from their defaults before evaluating.
    pub fn is_visible(&self, values: &Map<String, Value>) -> bool {
        let Some(display) = &self.display_options else {
            return true;
        };

        let shown = display.show.iter().all(|(key, allowed)| match values.get(key) {
            Some(actual) => allowed.contains(actual),
            None => true,
        });
        let hidden = display.hide.iter().any(|(key, denied)| {
            values
                .get(key)
                .map(|actual| denied.contains(actual))
                .unwrap_or(false)
        });

        shown && !hidden
    }

    /// Values allowed by an `options` field
    pub fn option_values(&self) -> Vec<&Value> {
        self.options
            .iter()
            .filter_map(|opt| match opt {
                FieldOption::Value(v) => Some(&v.value),
                _ => None,
            })
            .collect()
    }
}

/// Operation entry of the `operation` selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDef {
    pub name: String,
    pub value: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceManifest {
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub default_operation: String,
    pub operations: Vec<OperationDef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ResourceManifest {
    pub fn load(kind: ResourceType) -> NodeResult<Self> {
        let manifest: Self = serde_json::from_str(manifest_source(kind)).map_err(|e| {
            NodeError::Configuration(format!(
                "Failed to parse embedded manifest for {}: {}",
                kind.as_str(),
                e
            ))
        })?;

        if manifest.name != kind.as_str() {
            return Err(NodeError::Configuration(format!(
                "Manifest for {} declares name {:?}",
                kind.as_str(),
                manifest.name
            )));
        }
        Ok(manifest)
    }

    /// Fields shown for an operation (ignoring sibling conditions)
    pub fn fields_for(&self, operation: &str) -> Vec<&FieldDef> {
        let mut values = Map::new();
        values.insert("operation".to_string(), Value::String(operation.to_string()));
        self.fields
            .iter()
            .filter(|field| field.is_visible(&values))
            .collect()
    }

    /// The `operation` selector shown when this resource is picked
    pub fn operation_field(&self) -> Value {
        serde_json::json!({
            "displayName": "Operation",
            "name": "operation",
            "type": "options",
            "noDataExpression": true,
            "displayOptions": { "show": { "resource": [self.name] } },
            "options": self.operations,
            "default": self.default_operation,
        })
    }

    /// Fields with the resource condition injected, ready for the host
    pub fn host_fields(&self) -> Vec<FieldDef> {
        self.fields
            .iter()
            .cloned()
            .map(|mut field| {
                let display = field.display_options.get_or_insert_with(DisplayOptions::default);
                display
                    .show
                    .insert("resource".to_string(), vec![Value::String(self.name.clone())]);
                field
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_manifests_parse() {
        for kind in ResourceType::ALL {
            let manifest = ResourceManifest::load(kind).expect("manifest should parse");
            assert!(!manifest.operations.is_empty(), "{} has no operations", kind.as_str());
            assert!(
                manifest
                    .operations
                    .iter()
                    .any(|op| op.value == manifest.default_operation),
                "{} default operation is not offered",
                kind.as_str()
            );
        }
    }

    #[test]
    fn test_field_names_unique_per_operation() {
        for kind in ResourceType::ALL {
            let manifest = ResourceManifest::load(kind).unwrap();
            for op in &manifest.operations {
                let fields = manifest.fields_for(&op.value);
                for (i, field) in fields.iter().enumerate() {
                    let clash = fields[i + 1..].iter().any(|other| {
                        other.name == field.name
                            && other.display_options.as_ref().map(|d| &d.show)
                                == field.display_options.as_ref().map(|d| &d.show)
                    });
                    assert!(!clash, "{}/{} repeats field {}", kind.as_str(), op.value, field.name);
                }
            }
        }
    }

    #[test]
    fn test_visibility_rules() {
        let field: FieldDef = serde_json::from_value(json!({
            "displayName": "Limit",
            "name": "limit",
            "type": "number",
            "default": 50,
            "displayOptions": {"show": {"operation": ["getAll"], "returnAll": [false]}}
        }))
        .unwrap();

        let mut values = Map::new();
        values.insert("operation".to_string(), json!("getAll"));
        assert!(field.is_visible(&values));

        values.insert("returnAll".to_string(), json!(true));
        assert!(!field.is_visible(&values));

        values.insert("operation".to_string(), json!("get"));
        values.insert("returnAll".to_string(), json!(false));
        assert!(!field.is_visible(&values));
    }

    #[test]
    fn test_host_fields_carry_resource_condition() {
        let manifest = ResourceManifest::load(ResourceType::Alias).unwrap();
        for field in manifest.host_fields() {
            let show = &field.display_options.unwrap().show;
            assert_eq!(show.get("resource"), Some(&vec![json!("alias")]));
        }
    }
}
