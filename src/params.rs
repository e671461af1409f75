//! Parameter Bag
//!
//! The host hands every item's node parameters over as a loose JSON object.
//! Operation parsers read it through these accessors so that "required",
//! "optional" and "defaulted" are decided in one place with one set of
//! error messages.

use crate::error::{NodeError, NodeResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters of one input item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value, which must be an object
    pub fn from_value(value: Value) -> NodeResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(NodeError::validation(format!(
                "Item parameters must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Builder-style insert, mostly for tests and the CLI
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Value::is_null)
    }

    /// Raw lookup; `null` counts as absent
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Trimmed, non-empty string (numbers and booleans are stringified)
    pub fn optional_str(&self, name: &str) -> Option<String> {
        self.get(name).and_then(scalar_to_string)
    }

    /// Like [`optional_str`](Self::optional_str) but fails with `"{label} is required"`
    pub fn required_str(&self, name: &str, label: &str) -> NodeResult<String> {
        self.optional_str(name)
            .ok_or_else(|| NodeError::validation(format!("{} is required", label)))
    }

    pub fn str_or(&self, name: &str, default: &str) -> String {
        self.optional_str(name).unwrap_or_else(|| default.to_string())
    }

    pub fn optional_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(coerce_bool)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.optional_bool(name).unwrap_or(default)
    }

    /// Non-negative integer; a present but unparsable value is an error
    pub fn optional_u64(&self, name: &str) -> NodeResult<Option<u64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(value) => coerce_u64(value).map(Some).ok_or_else(|| {
                NodeError::validation(format!(
                    "Parameter \"{}\" must be a non-negative integer",
                    name
                ))
            }),
        }
    }

    pub fn u64_or(&self, name: &str, default: u64) -> NodeResult<u64> {
        Ok(self.optional_u64(name)?.unwrap_or(default))
    }

    pub fn required_u64(&self, name: &str, label: &str) -> NodeResult<u64> {
        self.optional_u64(name)?
            .ok_or_else(|| NodeError::validation(format!("{} is required", label)))
    }

    pub fn optional_f64(&self, name: &str) -> NodeResult<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| {
                NodeError::validation(format!("Parameter \"{}\" must be a number", name))
            }),
            Some(_) => Err(NodeError::validation(format!(
                "Parameter \"{}\" must be a number",
                name
            ))),
        }
    }

    /// A `collection`-type UI field: a nested object of optional values
    pub fn collection(&self, name: &str) -> Parameters {
        match self.get(name) {
            Some(Value::Object(map)) => Parameters(map.clone()),
            _ => Parameters::default(),
        }
    }

    /// Entries of a `fixedCollection` group
    ///
    /// Accepts the host's `{group: [..]}` shape, a single `{group: {..}}`
    /// entry, or a bare array of objects.
    pub fn fixed_collection(&self, name: &str, group: &str) -> Vec<Map<String, Value>> {
        let entries = match self.get(name) {
            Some(Value::Object(map)) => match map.get(group) {
                Some(Value::Array(items)) => items.clone(),
                Some(Value::Object(single)) => vec![Value::Object(single.clone())],
                _ => Vec::new(),
            },
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()
    }

    /// JSON-typed field: either inline JSON or a string holding JSON
    pub fn optional_json(&self, name: &str, label: &str) -> NodeResult<Option<Value>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => serde_json::from_str(s)
                .map(Some)
                .map_err(|e| NodeError::validation(format!("{} must be valid JSON: {}", label, e))),
            Some(other) => Ok(Some(other.clone())),
        }
    }

    pub fn required_json(&self, name: &str, label: &str) -> NodeResult<Value> {
        self.optional_json(name, label)?
            .ok_or_else(|| NodeError::validation(format!("{} is required", label)))
    }

    /// JSON field that must decode to an object
    pub fn required_json_object(&self, name: &str, label: &str) -> NodeResult<Map<String, Value>> {
        match self.required_json(name, label)? {
            Value::Object(map) => Ok(map),
            other => Err(NodeError::validation(format!(
                "{} must be a JSON object, got {}",
                label,
                json_kind(&other)
            ))),
        }
    }

    /// Unix timestamp in seconds from a number, numeric string, RFC 3339
    /// date-time or plain `YYYY-MM-DD` date (taken as UTC midnight)
    pub fn optional_timestamp(&self, name: &str, label: &str) -> NodeResult<Option<i64>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let invalid = || {
            NodeError::validation(format!(
                "{} must be a Unix timestamp or an ISO 8601 date-time",
                label
            ))
        };

        match value {
            Value::Number(n) => n.as_i64().map(Some).ok_or_else(invalid),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => parse_timestamp(s.trim()).map(Some).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    /// Comma-separated string (or array of strings) as a trimmed list
    pub fn comma_list(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(scalar_to_string)
                .collect(),
            Some(value) => scalar_to_string(value)
                .map(|s| parse_comma_list(&s))
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

/// Split on commas, trim, drop empties
pub fn parse_comma_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_timestamp(input: &str) -> Option<i64> {
    if let Ok(seconds) = input.parse::<i64>() {
        return Some(seconds);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Some(datetime.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp())
}

/// Booleans as the UI may send them
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Non-negative whole number from a number or numeric string
pub fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<u64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// Strictly positive whole number, `None` for anything else
pub fn coerce_positive_int(value: &Value) -> Option<u64> {
    coerce_u64(value).filter(|n| *n > 0)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        Parameters::from_value(value).unwrap()
    }

    #[test]
    fn test_required_str_rejects_blank() {
        let p = params(json!({"collectionName": "  ", "other": "x"}));
        let err = p.required_str("collectionName", "Collection name").unwrap_err();
        assert_eq!(err.to_string(), "Collection name is required");
        assert_eq!(p.required_str("other", "Other").unwrap(), "x");
    }

    #[test]
    fn test_numbers_accept_strings() {
        let p = params(json!({"limit": "25", "bad": "abc", "float": 3.0, "empty": ""}));
        assert_eq!(p.u64_or("limit", 50).unwrap(), 25);
        assert_eq!(p.u64_or("float", 50).unwrap(), 3);
        assert_eq!(p.u64_or("empty", 50).unwrap(), 50);
        assert_eq!(p.u64_or("missing", 50).unwrap(), 50);
        assert!(p.u64_or("bad", 50).is_err());
    }

    #[test]
    fn test_bool_coercion() {
        let p = params(json!({"a": "true", "b": 0, "c": "maybe", "d": true}));
        assert!(p.bool_or("a", false));
        assert!(!p.bool_or("b", true));
        assert!(p.bool_or("c", true));
        assert!(p.bool_or("d", false));
    }

    #[test]
    fn test_fixed_collection_shapes() {
        let host_shape = params(json!({"fields": {"field": [{"name": "a"}, {"name": "b"}]}}));
        assert_eq!(host_shape.fixed_collection("fields", "field").len(), 2);

        let single = params(json!({"fields": {"field": {"name": "a"}}}));
        assert_eq!(single.fixed_collection("fields", "field").len(), 1);

        let bare = params(json!({"fields": [{"name": "a"}, 3]}));
        assert_eq!(bare.fixed_collection("fields", "field").len(), 1);

        let absent = params(json!({}));
        assert!(absent.fixed_collection("fields", "field").is_empty());
    }

    #[test]
    fn test_json_field_parses_strings() {
        let p = params(json!({
            "doc": "{\"id\": \"1\"}",
            "inline": {"id": "2"},
            "broken": "{not json",
            "list": "[1, 2]"
        }));
        assert_eq!(p.required_json("doc", "Document").unwrap(), json!({"id": "1"}));
        assert_eq!(p.required_json("inline", "Document").unwrap(), json!({"id": "2"}));
        let err = p.required_json("broken", "Document").unwrap_err();
        assert!(err.to_string().starts_with("Document must be valid JSON"));
        assert!(p.required_json_object("list", "Document").is_err());
    }

    #[test]
    fn test_comma_list() {
        assert_eq!(parse_comma_list("a, b ,c"), vec!["a", "b", "c"]);
        assert!(parse_comma_list("  ,  , ").is_empty());

        let p = params(json!({"arr": ["x", " y ", ""], "s": "1,2"}));
        assert_eq!(p.comma_list("arr"), vec!["x", "y"]);
        assert_eq!(p.comma_list("s"), vec!["1", "2"]);
    }

    #[test]
    fn test_positive_int() {
        assert_eq!(coerce_positive_int(&json!(384)), Some(384));
        assert_eq!(coerce_positive_int(&json!("768")), Some(768));
        assert_eq!(coerce_positive_int(&json!(0)), None);
        assert_eq!(coerce_positive_int(&json!(-3)), None);
        assert_eq!(coerce_positive_int(&json!(1.5)), None);
    }

    #[test]
    fn test_timestamps() {
        let p = params(json!({
            "unix": 1906054106,
            "text": "1906054106",
            "rfc": "2030-05-27T10:08:26+00:00",
            "local": "2030-05-27T10:08:26",
            "date": "2030-05-27",
            "bad": "next tuesday"
        }));
        assert_eq!(p.optional_timestamp("unix", "Expires at").unwrap(), Some(1906054106));
        assert_eq!(p.optional_timestamp("text", "Expires at").unwrap(), Some(1906054106));
        assert_eq!(p.optional_timestamp("rfc", "Expires at").unwrap(), Some(1906106906));
        assert_eq!(p.optional_timestamp("local", "Expires at").unwrap(), Some(1906106906));
        assert_eq!(p.optional_timestamp("date", "Expires at").unwrap(), Some(1906070400));
        assert_eq!(p.optional_timestamp("missing", "Expires at").unwrap(), None);
        assert!(p.optional_timestamp("bad", "Expires at").is_err());
    }

    #[test]
    fn test_from_value_rejects_scalars() {
        assert!(Parameters::from_value(json!("nope")).is_err());
        assert!(Parameters::from_value(Value::Null).unwrap().is_empty());
    }
}
