//! List post-processing
//!
//! Typesense list endpoints return everything at once, so `returnAll`,
//! `limit`, prefix filters and column selection are applied here after the
//! response arrives.

use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use serde_json::{Map, Value};

pub const DEFAULT_LIMIT: u64 = 50;

/// `returnAll` / `limit` pair shared by every getAll operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub return_all: bool,
    pub limit: u64,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            return_all: false,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListOptions {
    pub fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let return_all = params.bool_or("returnAll", false);
        let limit = params.u64_or("limit", DEFAULT_LIMIT)?;
        if !return_all && limit == 0 {
            return Err(NodeError::validation("Limit must be at least 1"));
        }
        Ok(Self { return_all, limit })
    }

    pub fn apply(&self, items: Vec<Value>) -> Vec<Value> {
        apply_limit(items, self.return_all, self.limit)
    }
}

/// Keep the first `limit` items unless `return_all` is set
pub fn apply_limit(mut items: Vec<Value>, return_all: bool, limit: u64) -> Vec<Value> {
    if !return_all {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        items.truncate(limit);
    }
    items
}

/// Keep items whose string field starts with `prefix`
///
/// An empty prefix keeps everything. Items without the field are dropped
/// once a prefix is given.
pub fn filter_by_prefix(items: Vec<Value>, field: &str, prefix: &str) -> Vec<Value> {
    if prefix.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            item.get(field)
                .and_then(|v| v.as_str())
                .map(|s| s.starts_with(prefix))
                .unwrap_or(false)
        })
        .collect()
}

/// Reduce each object to the listed top-level or dot-path columns
pub fn project_columns(items: Vec<Value>, columns: &[String]) -> Vec<Value> {
    if columns.is_empty() {
        return items;
    }
    items
        .into_iter()
        .map(|item| {
            let mut projected = Map::new();
            for column in columns {
                if let Some(value) = extract_path(&item, column) {
                    projected.insert(column.clone(), value.clone());
                }
            }
            Value::Object(projected)
        })
        .collect()
}

/// Walk a dot-notation path; numeric segments index arrays
pub fn extract_path<'v>(item: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = item;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(idx) if current.is_array() => current.get(idx)?,
            _ => current.get(part)?,
        };
    }
    Some(current)
}

/// Prefix filter, then truncation, then projection
pub fn finish_listing(
    items: Vec<Value>,
    prefix: Option<(&str, &str)>,
    options: ListOptions,
    columns: &[String],
) -> Vec<Value> {
    let items = match prefix {
        Some((field, prefix)) => filter_by_prefix(items, field, prefix),
        None => items,
    };
    project_columns(options.apply(items), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(names: &[&str]) -> Vec<Value> {
        names.iter().map(|n| json!({"name": n, "num_documents": 1})).collect()
    }

    #[test]
    fn test_limit_truncates_in_order() {
        let items = named(&["a", "b", "c"]);
        let out = apply_limit(items, false, 2);
        assert_eq!(out, named(&["a", "b"]));
    }

    #[test]
    fn test_return_all_ignores_limit() {
        let items = named(&["a", "b", "c"]);
        assert_eq!(apply_limit(items.clone(), true, 1), items);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let params = Parameters::new().with("limit", 0);
        assert!(ListOptions::from_parameters(&params).is_err());

        let params = Parameters::new().with("limit", 0).with("returnAll", true);
        assert!(ListOptions::from_parameters(&params).is_ok());
    }

    #[test]
    fn test_default_limit() {
        let options = ListOptions::from_parameters(&Parameters::new()).unwrap();
        assert_eq!(options, ListOptions::default());
    }

    #[test]
    fn test_prefix_filter_runs_before_limit() {
        let items = named(&["books", "authors", "books_v2", "books_v3"]);
        let out = finish_listing(items, Some(("name", "books")), ListOptions { return_all: false, limit: 2 }, &[]);
        assert_eq!(out, named(&["books", "books_v2"]));
    }

    #[test]
    fn test_projection_keeps_requested_columns() {
        let items = vec![json!({"name": "books", "num_documents": 4, "fields": [{"name": "title"}]})];
        let out = project_columns(items, &["name".to_string(), "fields.0.name".to_string(), "missing".to_string()]);
        assert_eq!(out, vec![json!({"name": "books", "fields.0.name": "title"})]);
    }

    #[test]
    fn test_extract_path() {
        let item = json!({"a": {"b": [10, 20]}});
        assert_eq!(extract_path(&item, "a.b.1"), Some(&json!(20)));
        assert_eq!(extract_path(&item, "a.c"), None);
    }
}
