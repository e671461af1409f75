//! Collection Schema Builders
//!
//! Turns the flattened UI fields of the collection create/update forms into
//! the payloads Typesense expects.

use crate::error::{NodeError, NodeResult};
use crate::params::{coerce_bool, coerce_positive_int, Parameters};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Typesense field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "int32[]")]
    Int32Array,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "int64[]")]
    Int64Array,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "float[]")]
    FloatArray,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "bool[]")]
    BoolArray,
    #[serde(rename = "geopoint")]
    Geopoint,
    #[serde(rename = "geopoint[]")]
    GeopointArray,
    #[serde(rename = "geopolygon")]
    Geopolygon,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "object[]")]
    ObjectArray,
    #[serde(rename = "string*")]
    StringAuto,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "auto")]
    Auto,
}

impl FieldType {
    pub const ALL: &'static [FieldType] = &[
        Self::String,
        Self::StringArray,
        Self::Int32,
        Self::Int32Array,
        Self::Int64,
        Self::Int64Array,
        Self::Float,
        Self::FloatArray,
        Self::Bool,
        Self::BoolArray,
        Self::Geopoint,
        Self::GeopointArray,
        Self::Geopolygon,
        Self::Object,
        Self::ObjectArray,
        Self::StringAuto,
        Self::Image,
        Self::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::StringArray => "string[]",
            Self::Int32 => "int32",
            Self::Int32Array => "int32[]",
            Self::Int64 => "int64",
            Self::Int64Array => "int64[]",
            Self::Float => "float",
            Self::FloatArray => "float[]",
            Self::Bool => "bool",
            Self::BoolArray => "bool[]",
            Self::Geopoint => "geopoint",
            Self::GeopointArray => "geopoint[]",
            Self::Geopolygon => "geopolygon",
            Self::Object => "object",
            Self::ObjectArray => "object[]",
            Self::StringAuto => "string*",
            Self::Image => "image",
            Self::Auto => "auto",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

/// One field of a collection schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infix: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_dim: Option<u64>,
    /// Only meaningful in update payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop: Option<bool>,
    /// Attributes without a UI field (`embed`, `reference`, `stem`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldSpec {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type: Some(field_type),
            facet: None,
            optional: None,
            sort: None,
            infix: None,
            index: None,
            locale: None,
            num_dim: None,
            drop: None,
            extra: Map::new(),
        }
    }
}

/// Create/update payload for a collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_nested_fields: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_sorting_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_separators: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols_to_index: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionSchema {
    /// True when the payload carries nothing to send
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.fields.is_empty()
            && self.enable_nested_fields.is_none()
            && self.default_sorting_field.is_none()
            && self.token_separators.is_none()
            && self.symbols_to_index.is_none()
            && self.metadata.is_none()
            && self.extra.is_empty()
    }
}

/// Build the payload for `POST /collections`
///
/// `fields` are the raw UI field rows; `additional` holds `name` plus the
/// optional collection attributes.
pub fn build_create_schema(
    fields: &[Map<String, Value>],
    additional: &Parameters,
) -> NodeResult<CollectionSchema> {
    let name = additional
        .optional_str("name")
        .ok_or_else(|| NodeError::validation("Collection name is required"))?;

    let fields = normalize_fields(fields, false);
    if fields.is_empty() {
        return Err(NodeError::validation(
            "At least one field with a name and a type is required to create a collection",
        ));
    }

    let mut schema = CollectionSchema {
        name: Some(name),
        fields,
        ..Default::default()
    };
    apply_attributes(&mut schema, additional)?;

    Ok(schema)
}

/// Build the payload for `PATCH /collections/{name}`
///
/// Only supplied attributes appear. An empty result is valid here; the
/// update operation refuses to send it.
pub fn build_update_schema(
    fields: &[Map<String, Value>],
    additional: &Parameters,
) -> NodeResult<CollectionSchema> {
    let mut schema = CollectionSchema {
        fields: normalize_fields(fields, true),
        ..Default::default()
    };
    apply_attributes(&mut schema, additional)?;

    Ok(schema)
}

/// Take a complete schema written as JSON by the user
///
/// `fallback_name` fills in `name` when the JSON leaves it out. Field rows go
/// through the same normalization as the form rows; attributes without a form
/// field are passed through untouched.
pub fn parse_schema_json(value: Value, fallback_name: Option<String>) -> NodeResult<CollectionSchema> {
    let Value::Object(mut object) = value else {
        return Err(NodeError::validation(
            "Invalid collection schema: expected a JSON object",
        ));
    };
    let rows: Vec<Map<String, Value>> = match object.remove("fields") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(NodeError::validation(
                "Invalid collection schema: fields must be an array",
            ))
        }
    };

    let mut schema: CollectionSchema = serde_json::from_value(Value::Object(object))
        .map_err(|e| NodeError::validation(format!("Invalid collection schema: {}", e)))?;

    if schema.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        schema.name = fallback_name;
    }
    if schema.name.is_none() {
        return Err(NodeError::validation("Collection name is required"));
    }

    schema.fields = normalize_fields(&rows, false);
    if schema.fields.is_empty() {
        return Err(NodeError::validation(
            "At least one field with a name and a type is required to create a collection",
        ));
    }

    Ok(schema)
}

fn apply_attributes(schema: &mut CollectionSchema, additional: &Parameters) -> NodeResult<()> {
    schema.enable_nested_fields = additional.optional_bool("enableNestedFields");
    schema.default_sorting_field = additional.optional_str("defaultSortingField");
    schema.token_separators = non_empty_list(additional, "tokenSeparators");
    schema.symbols_to_index = non_empty_list(additional, "symbolsToIndex");
    schema.metadata = additional.optional_json("metadata", "Metadata")?;
    Ok(())
}

fn non_empty_list(params: &Parameters, name: &str) -> Option<Vec<String>> {
    let list = params.comma_list(name);
    (!list.is_empty()).then_some(list)
}

/// Drop incomplete rows and coerce attribute types
///
/// With `allow_drop`, a row flagged `drop` only needs a name.
fn normalize_fields(rows: &[Map<String, Value>], allow_drop: bool) -> Vec<FieldSpec> {
    rows.iter()
        .filter_map(|row| normalize_field(row, allow_drop))
        .collect()
}

/// Row keys that map onto [`FieldSpec`] members
const FIELD_KEYS: &[&str] = &[
    "name", "type", "facet", "optional", "sort", "infix", "index", "locale", "numDim", "num_dim",
    "drop",
];

fn normalize_field(row: &Map<String, Value>, allow_drop: bool) -> Option<FieldSpec> {
    let name = row
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())?;

    let flag = |key: &str| row.get(key).and_then(coerce_bool);

    if allow_drop && flag("drop") == Some(true) {
        return Some(FieldSpec {
            field_type: None,
            drop: Some(true),
            ..FieldSpec::new(name, FieldType::Auto)
        });
    }

    let raw_type = row
        .get("type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())?;
    let Some(field_type) = FieldType::from_str(raw_type) else {
        tracing::warn!("Dropping field {:?}: unknown type {:?}", name, raw_type);
        return None;
    };

    let num_dim = row.get("numDim").or_else(|| row.get("num_dim"));
    if let Some(raw) = num_dim.filter(|v| !is_blank(v)) {
        if coerce_positive_int(raw).is_none() {
            tracing::warn!("Ignoring invalid numDim {} on field {:?}", raw, name);
        }
    }

    Some(FieldSpec {
        name: name.to_string(),
        field_type: Some(field_type),
        facet: flag("facet"),
        optional: flag("optional"),
        sort: flag("sort"),
        infix: flag("infix"),
        index: flag("index"),
        locale: row
            .get("locale")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string),
        num_dim: num_dim.and_then(coerce_positive_int),
        drop: None,
        extra: row
            .iter()
            .filter(|(key, _)| !FIELD_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    fn additional(value: Value) -> Parameters {
        Parameters::from_value(value).unwrap()
    }

    #[test]
    fn test_create_minimal_payload_has_no_spurious_keys() {
        let schema = build_create_schema(
            &rows(json!([{"name": "title", "type": "string"}])),
            &additional(json!({"name": "books"})),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"name": "books", "fields": [{"name": "title", "type": "string"}]})
        );
    }

    #[test]
    fn test_create_requires_name() {
        let err = build_create_schema(
            &rows(json!([{"name": "title", "type": "string"}])),
            &additional(json!({})),
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
    }

    #[test]
    fn test_create_requires_a_complete_field() {
        let err = build_create_schema(
            &rows(json!([{"name": "title"}, {"type": "int32"}, {"name": "", "type": "string"}])),
            &additional(json!({"name": "books"})),
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
    }

    #[test]
    fn test_field_attributes_are_coerced() {
        let schema = build_create_schema(
            &rows(json!([
                {"name": "title", "type": "string", "facet": "true", "optional": 0, "locale": " fr "},
                {"name": "embedding", "type": "float[]", "numDim": "384", "index": true},
                {"name": "bad_dim", "type": "float[]", "numDim": -2},
                {"name": "mystery", "type": "varchar"}
            ])),
            &additional(json!({"name": "books"})),
        )
        .unwrap();

        assert_eq!(schema.fields.len(), 3);
        assert_eq!(schema.fields[0].facet, Some(true));
        assert_eq!(schema.fields[0].optional, Some(false));
        assert_eq!(schema.fields[0].locale.as_deref(), Some("fr"));
        assert_eq!(schema.fields[1].num_dim, Some(384));
        assert_eq!(schema.fields[1].index, Some(true));
        assert_eq!(schema.fields[2].num_dim, None);
    }

    #[test]
    fn test_comma_lists_and_metadata() {
        let schema = build_create_schema(
            &rows(json!([{"name": "title", "type": "string"}])),
            &additional(json!({
                "name": "books",
                "tokenSeparators": "a, b ,c",
                "symbolsToIndex": "   ",
                "metadata": "{\"owner\": \"search-team\"}",
                "enableNestedFields": true,
                "defaultSortingField": "rating"
            })),
        )
        .unwrap();

        assert_eq!(
            schema.token_separators,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(schema.symbols_to_index, None);
        assert_eq!(schema.metadata, Some(json!({"owner": "search-team"})));

        let value = serde_json::to_value(&schema).unwrap();
        assert!(value.get("symbols_to_index").is_none());
        assert_eq!(value["enable_nested_fields"], json!(true));
        assert_eq!(value["default_sorting_field"], json!("rating"));
    }

    #[test]
    fn test_invalid_metadata_is_a_validation_error() {
        let err = build_create_schema(
            &rows(json!([{"name": "title", "type": "string"}])),
            &additional(json!({"name": "books", "metadata": "{oops"})),
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
    }

    #[test]
    fn test_schema_json_passes_unknown_attributes_through() {
        let schema = parse_schema_json(
            json!({
                "fields": [{
                    "name": "embedding",
                    "type": "float[]",
                    "embed": {"from": ["title"], "model_config": {"model_name": "ts/e5-small"}}
                }]
            }),
            Some("books".to_string()),
        )
        .unwrap();

        assert_eq!(schema.name.as_deref(), Some("books"));
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["fields"][0]["embed"]["from"], json!(["title"]));
    }

    #[test]
    fn test_schema_json_fields_are_normalized() {
        let schema = parse_schema_json(
            json!({
                "name": "books",
                "fields": [
                    {"name": "title"},
                    {"name": "v", "type": "float[]", "num_dim": 0},
                    {"name": "author", "type": "string", "reference": "authors.id"},
                    "not a row"
                ]
            }),
            None,
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "name": "books",
                "fields": [
                    {"name": "v", "type": "float[]"},
                    {"name": "author", "type": "string", "reference": "authors.id"}
                ]
            })
        );
    }

    #[test]
    fn test_schema_json_needs_a_complete_field() {
        let err = parse_schema_json(
            json!({"name": "books", "fields": [{"name": "title"}, {"type": "string"}]}),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
    }

    #[test]
    fn test_schema_json_requires_fields() {
        let err = parse_schema_json(json!({"name": "books", "fields": []}), None).unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
    }

    #[test]
    fn test_update_on_empty_input_is_empty() {
        let schema = build_update_schema(&[], &additional(json!({}))).unwrap();
        assert!(schema.is_empty());
        assert_eq!(serde_json::to_value(&schema).unwrap(), json!({}));
    }

    #[test]
    fn test_update_keeps_drop_rows_without_type() {
        let schema = build_update_schema(
            &rows(json!([{"name": "legacy", "drop": true}, {"name": "year", "type": "int32"}])),
            &additional(json!({})),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"fields": [{"name": "legacy", "drop": true}, {"name": "year", "type": "int32"}]})
        );
    }
}
