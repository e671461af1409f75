//! Search
//!
//! Every search flavour (single collection, multi-collection, vector, semantic,
//! advanced and conversational) builds its request through
//! [`build_search_params`], so option names and coercion live in one table.

use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use crate::typesense::Query;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};

pub const HANDLERS: HandlerTable = &[
    ("search", search),
    ("multiSearch", multi_search),
    ("vectorSearch", vector_search),
    ("semanticSearch", semantic_search),
    ("advancedSearch", advanced_search),
];

pub const DEFAULT_QUERY: &str = "*";
pub const DEFAULT_VECTOR_K: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionKind {
    Text,
    Number,
    Flag,
}

/// UI option name, Typesense parameter name, value kind
const SEARCH_OPTIONS: &[(&str, &str, OptionKind)] = &[
    ("filterBy", "filter_by", OptionKind::Text),
    ("sortBy", "sort_by", OptionKind::Text),
    ("facetBy", "facet_by", OptionKind::Text),
    ("maxFacetValues", "max_facet_values", OptionKind::Number),
    ("page", "page", OptionKind::Number),
    ("perPage", "per_page", OptionKind::Number),
    ("groupBy", "group_by", OptionKind::Text),
    ("groupLimit", "group_limit", OptionKind::Number),
    ("includeFields", "include_fields", OptionKind::Text),
    ("excludeFields", "exclude_fields", OptionKind::Text),
    ("highlightFields", "highlight_fields", OptionKind::Text),
    ("numTypos", "num_typos", OptionKind::Text),
    ("prefix", "prefix", OptionKind::Text),
    ("infix", "infix", OptionKind::Text),
    ("dropTokensThreshold", "drop_tokens_threshold", OptionKind::Number),
    ("typoTokensThreshold", "typo_tokens_threshold", OptionKind::Number),
    ("prioritizeExactMatch", "prioritize_exact_match", OptionKind::Flag),
    ("exhaustiveSearch", "exhaustive_search", OptionKind::Flag),
    ("searchCutoffMs", "search_cutoff_ms", OptionKind::Number),
    ("useCache", "use_cache", OptionKind::Flag),
    ("cacheTtl", "cache_ttl", OptionKind::Number),
    ("preset", "preset", OptionKind::Text),
    ("textMatchType", "text_match_type", OptionKind::Text),
    ("queryByWeights", "query_by_weights", OptionKind::Text),
    ("pinnedHits", "pinned_hits", OptionKind::Text),
    ("hiddenHits", "hidden_hits", OptionKind::Text),
    ("limitHits", "limit_hits", OptionKind::Number),
    ("snippetThreshold", "snippet_threshold", OptionKind::Number),
    ("highlightStartTag", "highlight_start_tag", OptionKind::Text),
    ("highlightEndTag", "highlight_end_tag", OptionKind::Text),
];

/// Flat Typesense search parameters
///
/// `q` and `query_by` come first, then every recognised entry of `options`
/// translated to its API name, then `overrides` which replace anything
/// already set.
pub fn build_search_params(
    query: &str,
    query_by: Option<&str>,
    options: &Parameters,
    overrides: Map<String, Value>,
) -> NodeResult<Map<String, Value>> {
    let mut params = Map::new();
    params.insert("q".to_string(), Value::String(query.to_string()));
    if let Some(query_by) = query_by.filter(|q| !q.is_empty()) {
        params.insert("query_by".to_string(), Value::String(query_by.to_string()));
    }

    for (ui_name, api_name, kind) in SEARCH_OPTIONS {
        let value = match kind {
            OptionKind::Text => options.optional_str(ui_name).map(Value::String),
            OptionKind::Number => options.optional_u64(ui_name)?.map(Value::from),
            OptionKind::Flag => options.optional_bool(ui_name).map(Value::Bool),
        };
        if let Some(value) = value {
            params.insert(api_name.to_string(), value);
        }
    }

    params.extend(overrides);
    Ok(params)
}

/// Hit documents of a search response, flattening grouped hits
pub fn hit_documents(response: &Value) -> Vec<Value> {
    let direct = response
        .get("hits")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();
    let grouped = response
        .get("grouped_hits")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|group| group.get("hits").and_then(Value::as_array))
        .flatten();

    direct
        .chain(grouped)
        .filter_map(|hit| hit.get("document").cloned())
        .collect()
}

/// Wrap a search response, optionally reduced to its documents
pub fn search_output(response: Value, hits_only: bool) -> NodeOutput {
    if hits_only {
        NodeOutput::Many(hit_documents(&response))
    } else {
        NodeOutput::Single(response)
    }
}

/// A multi_search result entry carries its own error instead of an HTTP status
fn check_embedded_error(result: Value) -> NodeResult<Value> {
    match result.get("error").and_then(Value::as_str) {
        Some(message) => Err(NodeError::Upstream {
            status: result
                .get("code")
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok()),
            message: message.to_string(),
        }),
        None => Ok(result),
    }
}

// =============================================================================
// Parameters
// =============================================================================

struct CollectionSearch {
    collection: String,
    query: String,
    query_by: String,
    options: Parameters,
    hits_only: bool,
}

impl FromParameters for CollectionSearch {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            query: params.str_or("query", DEFAULT_QUERY),
            query_by: params.required_str("queryBy", "Query by")?,
            options: params.collection("searchOptions"),
            hits_only: params.bool_or("hitsOnly", false),
        })
    }
}

struct MultiSearch {
    collections: Vec<String>,
    query: String,
    query_by: String,
    options: Parameters,
    hits_only: bool,
}

impl FromParameters for MultiSearch {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let collections = params.comma_list("collections");
        if collections.is_empty() {
            return Err(NodeError::validation("At least one collection is required"));
        }
        Ok(Self {
            collections,
            query: params.str_or("query", DEFAULT_QUERY),
            query_by: params.required_str("queryBy", "Query by")?,
            options: params.collection("searchOptions"),
            hits_only: params.bool_or("hitsOnly", false),
        })
    }
}

struct VectorSearch {
    collection: String,
    vector_field: String,
    vector: Vec<f64>,
    k: u64,
    distance_threshold: Option<f64>,
    query: String,
    options: Parameters,
    hits_only: bool,
}

impl VectorSearch {
    /// `field:([v1,v2,...], k:N[, distance_threshold:X])`
    fn vector_query(&self) -> String {
        let values: Vec<String> = self.vector.iter().map(|v| v.to_string()).collect();
        let mut out = format!("{}:([{}], k:{}", self.vector_field, values.join(","), self.k);
        if let Some(threshold) = self.distance_threshold {
            out.push_str(&format!(", distance_threshold:{}", threshold));
        }
        out.push(')');
        out
    }
}

impl FromParameters for VectorSearch {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let k = params.u64_or("k", DEFAULT_VECTOR_K)?;
        if k == 0 {
            return Err(NodeError::validation("K must be at least 1"));
        }
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            vector_field: params.required_str("vectorField", "Vector field")?,
            vector: parse_vector(params)?,
            k,
            distance_threshold: params.optional_f64("distanceThreshold")?,
            query: params.str_or("query", DEFAULT_QUERY),
            options: params.collection("searchOptions"),
            hits_only: params.bool_or("hitsOnly", false),
        })
    }
}

/// Vector given as a JSON array of numbers or a comma-separated string
fn parse_vector(params: &Parameters) -> NodeResult<Vec<f64>> {
    let invalid = || NodeError::validation("Vector must be a list of numbers");
    let values: Vec<f64> = match params.get("vector") {
        Some(Value::String(s)) if s.trim_start().starts_with('[') => {
            let parsed: Vec<Value> = serde_json::from_str(s).map_err(|_| invalid())?;
            parsed
                .iter()
                .map(|v| v.as_f64().ok_or_else(invalid))
                .collect::<NodeResult<_>>()?
        }
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_f64().ok_or_else(invalid))
            .collect::<NodeResult<_>>()?,
        Some(_) => params
            .comma_list("vector")
            .iter()
            .map(|s| s.parse::<f64>().map_err(|_| invalid()))
            .collect::<NodeResult<_>>()?,
        None => Vec::new(),
    };

    if values.is_empty() {
        return Err(NodeError::validation("Vector is required"));
    }
    if !values.iter().all(|v| v.is_finite()) {
        return Err(invalid());
    }
    Ok(values)
}

struct SemanticSearch {
    collection: String,
    semantic_query: String,
    embedding_field: String,
    options: Parameters,
    hits_only: bool,
}

impl FromParameters for SemanticSearch {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            semantic_query: params.required_str("semanticQuery", "Semantic query")?,
            embedding_field: params.required_str("embeddingField", "Embedding field")?,
            options: params.collection("searchOptions"),
            hits_only: params.bool_or("hitsOnly", false),
        })
    }
}

struct AdvancedSearch {
    collection: String,
    query: String,
    query_by: Option<String>,
    search_parameters: Map<String, Value>,
    options: Parameters,
    hits_only: bool,
}

impl FromParameters for AdvancedSearch {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            query: params.str_or("query", DEFAULT_QUERY),
            query_by: params.optional_str("queryBy"),
            search_parameters: params.required_json_object("searchParameters", "Search parameters")?,
            options: params.collection("searchOptions"),
            hits_only: params.bool_or("hitsOnly", false),
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn search<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = CollectionSearch::from_parameters(ctx.params)?;
        let params = build_search_params(&p.query, Some(&p.query_by), &p.options, Map::new())?;
        let response = ctx
            .client
            .search(&p.collection, &Query::from_map(&params))
            .await?;
        Ok(search_output(response, p.hits_only))
    }
    .boxed()
}

fn multi_search<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = MultiSearch::from_parameters(ctx.params)?;
        let params = build_search_params(&p.query, Some(&p.query_by), &p.options, Map::new())?;

        let searches = p
            .collections
            .iter()
            .map(|collection| {
                let mut search = params.clone();
                search.insert("collection".to_string(), Value::String(collection.clone()));
                Value::Object(search)
            })
            .collect();

        let response = ctx.client.multi_search(searches, &Query::new()).await?;
        if !p.hits_only {
            return Ok(NodeOutput::Single(response));
        }

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut documents = Vec::new();
        for result in results {
            documents.extend(hit_documents(&check_embedded_error(result)?));
        }
        Ok(NodeOutput::Many(documents))
    }
    .boxed()
}

fn vector_search<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = VectorSearch::from_parameters(ctx.params)?;

        let mut overrides = Map::new();
        overrides.insert("collection".to_string(), Value::String(p.collection.clone()));
        overrides.insert("vector_query".to_string(), Value::String(p.vector_query()));
        let params = build_search_params(&p.query, None, &p.options, overrides)?;

        // Long vectors overflow a GET query string, so go through multi_search
        let response = ctx
            .client
            .multi_search(vec![Value::Object(params)], &Query::new())
            .await?;
        let result = response
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .cloned()
            .ok_or_else(|| NodeError::upstream("Vector search returned no results"))?;

        Ok(search_output(check_embedded_error(result)?, p.hits_only))
    }
    .boxed()
}

fn semantic_search<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = SemanticSearch::from_parameters(ctx.params)?;
        let params = build_search_params(
            &p.semantic_query,
            Some(&p.embedding_field),
            &p.options,
            Map::new(),
        )?;
        let response = ctx
            .client
            .search(&p.collection, &Query::from_map(&params))
            .await?;
        Ok(search_output(response, p.hits_only))
    }
    .boxed()
}

fn advanced_search<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = AdvancedSearch::from_parameters(ctx.params)?;
        let params = build_search_params(
            &p.query,
            p.query_by.as_deref(),
            &p.options,
            p.search_parameters,
        )?;
        if !params.contains_key("query_by") {
            return Err(NodeError::validation(
                "Query by is required, either as a field or inside the search parameters",
            ));
        }
        let response = ctx
            .client
            .search(&p.collection, &Query::from_map(&params))
            .await?;
        Ok(search_output(response, p.hits_only))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_translated_to_api_names() {
        let options = Parameters::new()
            .with("filterBy", "year:>2000")
            .with("perPage", 5)
            .with("prioritizeExactMatch", "false")
            .with("unknownOption", "ignored");
        let params = build_search_params("harry", Some("title"), &options, Map::new()).unwrap();

        assert_eq!(
            Value::Object(params),
            json!({
                "q": "harry",
                "query_by": "title",
                "filter_by": "year:>2000",
                "per_page": 5,
                "prioritize_exact_match": false
            })
        );
    }

    #[test]
    fn test_overrides_win() {
        let options = Parameters::new().with("perPage", 5);
        let mut overrides = Map::new();
        overrides.insert("per_page".to_string(), json!(100));
        overrides.insert("q".to_string(), json!("potter"));
        let params = build_search_params("harry", None, &options, overrides).unwrap();

        assert_eq!(params["q"], "potter");
        assert_eq!(params["per_page"], 100);
        assert!(!params.contains_key("query_by"));
    }

    #[test]
    fn test_non_numeric_option_rejected() {
        let options = Parameters::new().with("page", "two");
        assert!(build_search_params("*", Some("title"), &options, Map::new()).is_err());
    }

    #[test]
    fn test_vector_query_format() {
        let params = Parameters::new()
            .with("collectionName", "products")
            .with("vectorField", "embedding")
            .with("vector", "[0.1, 0.25, -1]")
            .with("distanceThreshold", 0.3);
        let p = VectorSearch::from_parameters(&params).unwrap();
        assert_eq!(
            p.vector_query(),
            "embedding:([0.1,0.25,-1], k:10, distance_threshold:0.3)"
        );
    }

    #[test]
    fn test_vector_accepts_comma_list_and_rejects_garbage() {
        let params = Parameters::new().with("vector", "1, 2.5");
        assert_eq!(parse_vector(&params).unwrap(), vec![1.0, 2.5]);

        let params = Parameters::new().with("vector", "1, abc");
        assert!(parse_vector(&params).is_err());

        assert!(parse_vector(&Parameters::new()).is_err());
    }

    #[test]
    fn test_vector_rejects_non_finite_values() {
        for raw in ["1, NaN", "inf, 2", "1, -infinity"] {
            let params = Parameters::new().with("vector", raw);
            let err = parse_vector(&params).unwrap_err();
            assert_eq!(err.to_string(), "Vector must be a list of numbers");
        }
    }

    #[test]
    fn test_hit_documents_include_grouped_hits() {
        let response = json!({
            "hits": [{"document": {"id": "1"}}],
            "grouped_hits": [{"hits": [{"document": {"id": "2"}}, {"document": {"id": "3"}}]}]
        });
        let ids: Vec<_> = hit_documents(&response)
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_embedded_error_becomes_upstream() {
        let err = check_embedded_error(json!({"code": 404, "error": "Not found."})).unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(check_embedded_error(json!({"hits": []})).is_ok());
    }

    #[test]
    fn test_multi_search_requires_collections() {
        let params = Parameters::new().with("collections", " , ").with("queryBy", "title");
        assert!(MultiSearch::from_parameters(&params).is_err());
    }
}
