//! Override (curation) operations, per collection

use super::listing::{finish_listing, ListOptions};
use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::{NodeError, NodeResult};
use crate::params::{coerce_positive_int, Parameters};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};

pub const HANDLERS: HandlerTable = &[
    ("upsert", upsert),
    ("get", get),
    ("getAll", get_all),
    ("delete", delete),
];

const MATCH_TYPES: [&str; 2] = ["exact", "contains"];

/// Group name of the `includes` fixedCollection rows
const INCLUDE_GROUP: &str = "include";

struct UpsertOverride {
    collection: String,
    id: String,
    body: Value,
}

impl FromParameters for UpsertOverride {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let collection = params.required_str("collectionName", "Collection name")?;
        let id = params.required_str("overrideId", "Override ID")?;

        let mut body = Map::new();
        body.insert("rule".to_string(), build_rule(&params.collection("rule"))?);

        let includes = build_includes(params)?;
        if !includes.is_empty() {
            body.insert("includes".to_string(), Value::Array(includes));
        }

        let excludes: Vec<Value> = params
            .comma_list("excludes")
            .into_iter()
            .map(|id| json!({ "id": id }))
            .collect();
        if !excludes.is_empty() {
            body.insert("excludes".to_string(), Value::Array(excludes));
        }

        apply_additional(&mut body, &params.collection("additionalFields"))?;

        Ok(Self {
            collection,
            id,
            body: Value::Object(body),
        })
    }
}

fn build_rule(rule: &Parameters) -> NodeResult<Value> {
    let mut out = Map::new();

    if let Some(query) = rule.optional_str("query") {
        let match_type = rule.str_or("match", MATCH_TYPES[0]);
        if !MATCH_TYPES.contains(&match_type.as_str()) {
            return Err(NodeError::validation(format!(
                "Match must be \"exact\" or \"contains\", got \"{}\"",
                match_type
            )));
        }
        out.insert("query".to_string(), Value::String(query));
        out.insert("match".to_string(), Value::String(match_type));
    }
    if let Some(filter_by) = rule.optional_str("filterBy") {
        out.insert("filter_by".to_string(), Value::String(filter_by));
    }
    let tags = rule.comma_list("tags");
    if !tags.is_empty() {
        out.insert("tags".to_string(), json!(tags));
    }

    if out.is_empty() {
        return Err(NodeError::validation(
            "The rule needs at least one of query, filter by or tags",
        ));
    }
    Ok(Value::Object(out))
}

fn build_includes(params: &Parameters) -> NodeResult<Vec<Value>> {
    params
        .fixed_collection("includes", INCLUDE_GROUP)
        .into_iter()
        .map(|row| {
            let row = Parameters::from(row);
            let id = row.required_str("id", "Included document ID")?;
            let position = row
                .get("position")
                .and_then(coerce_positive_int)
                .ok_or_else(|| {
                    NodeError::validation(format!(
                        "Position of included document \"{}\" must be a positive integer",
                        id
                    ))
                })?;
            Ok(json!({ "id": id, "position": position }))
        })
        .collect()
}

fn apply_additional(body: &mut Map<String, Value>, additional: &Parameters) -> NodeResult<()> {
    for (ui_name, api_name) in [
        ("filterBy", "filter_by"),
        ("sortBy", "sort_by"),
        ("replaceQuery", "replace_query"),
    ] {
        if let Some(value) = additional.optional_str(ui_name) {
            body.insert(api_name.to_string(), Value::String(value));
        }
    }

    for (ui_name, api_name) in [
        ("removeMatchedTokens", "remove_matched_tokens"),
        ("filterCuratedHits", "filter_curated_hits"),
        ("stopProcessing", "stop_processing"),
    ] {
        if let Some(flag) = additional.optional_bool(ui_name) {
            body.insert(api_name.to_string(), Value::Bool(flag));
        }
    }

    if let Some(from) = additional.optional_timestamp("effectiveFromTs", "Effective from")? {
        body.insert("effective_from_ts".to_string(), json!(from));
    }
    if let Some(to) = additional.optional_timestamp("effectiveToTs", "Effective to")? {
        body.insert("effective_to_ts".to_string(), json!(to));
    }

    if let Some(metadata) = additional.optional_json("metadata", "Metadata")? {
        if !metadata.is_object() {
            return Err(NodeError::validation("Metadata must be a JSON object"));
        }
        body.insert("metadata".to_string(), metadata);
    }
    Ok(())
}

struct OverrideRef {
    collection: String,
    id: String,
}

impl FromParameters for OverrideRef {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            id: params.required_str("overrideId", "Override ID")?,
        })
    }
}

struct ListOverrides {
    collection: String,
    options: ListOptions,
    id_prefix: Option<String>,
}

impl FromParameters for ListOverrides {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            options: ListOptions::from_parameters(params)?,
            id_prefix: params.collection("filters").optional_str("idPrefix"),
        })
    }
}

fn upsert<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = UpsertOverride::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.upsert_override(&p.collection, &p.id, &p.body).await?,
        ))
    }
    .boxed()
}

fn get<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = OverrideRef::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.retrieve_override(&p.collection, &p.id).await?,
        ))
    }
    .boxed()
}

fn get_all<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ListOverrides::from_parameters(ctx.params)?;
        let overrides = ctx.client.list_overrides(&p.collection).await?;
        let prefix = p.id_prefix.as_deref().map(|prefix| ("id", prefix));
        Ok(NodeOutput::Many(finish_listing(overrides, prefix, p.options, &[])))
    }
    .boxed()
}

fn delete<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = OverrideRef::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.delete_override(&p.collection, &p.id).await?,
        ))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Parameters {
        Parameters::new()
            .with("collectionName", "products")
            .with("overrideId", "promote-apple")
    }

    #[test]
    fn test_full_override_body() {
        let params = base()
            .with("rule", json!({"query": "apple", "tags": "seasonal"}))
            .with("includes", json!({"include": [{"id": "422", "position": "1"}]}))
            .with("excludes", "287, 288")
            .with(
                "additionalFields",
                json!({"removeMatchedTokens": true, "effectiveFromTs": 1906070400}),
            );
        let p = UpsertOverride::from_parameters(&params).unwrap();

        assert_eq!(
            p.body,
            json!({
                "rule": {"query": "apple", "match": "exact", "tags": ["seasonal"]},
                "includes": [{"id": "422", "position": 1}],
                "excludes": [{"id": "287"}, {"id": "288"}],
                "remove_matched_tokens": true,
                "effective_from_ts": 1906070400
            })
        );
    }

    #[test]
    fn test_rule_needs_a_condition() {
        let params = base().with("rule", json!({"match": "contains"}));
        let err = UpsertOverride::from_parameters(&params).err().unwrap();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_rule_filter_only() {
        let params = base().with("rule", json!({"filterBy": "brand:=apple"}));
        let p = UpsertOverride::from_parameters(&params).unwrap();
        assert_eq!(p.body["rule"], json!({"filter_by": "brand:=apple"}));
    }

    #[test]
    fn test_include_position_must_be_positive() {
        let params = base()
            .with("rule", json!({"query": "apple"}))
            .with("includes", json!({"include": [{"id": "422", "position": 0}]}));
        assert!(UpsertOverride::from_parameters(&params).is_err());
    }

    #[test]
    fn test_unknown_match_rejected() {
        let params = base().with("rule", json!({"query": "apple", "match": "fuzzy"}));
        assert!(UpsertOverride::from_parameters(&params).is_err());
    }
}
