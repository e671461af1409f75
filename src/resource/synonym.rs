//! Synonym operations (per collection)

use super::listing::{finish_listing, ListOptions};
use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};

pub const HANDLERS: HandlerTable = &[
    ("upsert", upsert),
    ("get", get),
    ("getAll", get_all),
    ("delete", delete),
];

struct UpsertSynonym {
    collection: String,
    id: String,
    body: Value,
}

impl FromParameters for UpsertSynonym {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let collection = params.required_str("collectionName", "Collection name")?;
        let id = params.required_str("synonymId", "Synonym ID")?;

        let synonyms = params.comma_list("synonyms");
        if synonyms.is_empty() {
            return Err(NodeError::validation("At least one synonym is required"));
        }

        let mut body = Map::new();
        body.insert("synonyms".to_string(), json!(synonyms));

        // A root makes the synonym one-way: root -> synonyms
        let additional = params.collection("additionalFields");
        if let Some(root) = additional.optional_str("root") {
            body.insert("root".to_string(), Value::String(root));
        }
        if let Some(locale) = additional.optional_str("locale") {
            body.insert("locale".to_string(), Value::String(locale));
        }
        let symbols = additional.comma_list("symbolsToIndex");
        if !symbols.is_empty() {
            body.insert("symbols_to_index".to_string(), json!(symbols));
        }

        Ok(Self {
            collection,
            id,
            body: Value::Object(body),
        })
    }
}

struct SynonymRef {
    collection: String,
    id: String,
}

impl FromParameters for SynonymRef {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            id: params.required_str("synonymId", "Synonym ID")?,
        })
    }
}

struct ListSynonyms {
    collection: String,
    options: ListOptions,
    id_prefix: Option<String>,
}

impl FromParameters for ListSynonyms {
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
        let p = UpsertSynonym::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.upsert_synonym(&p.collection, &p.id, &p.body).await?,
        ))
    }
    .boxed()
}

fn get<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = SynonymRef::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.retrieve_synonym(&p.collection, &p.id).await?,
        ))
    }
    .boxed()
}

fn get_all<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ListSynonyms::from_parameters(ctx.params)?;
        let synonyms = ctx.client.list_synonyms(&p.collection).await?;
        let prefix = p.id_prefix.as_deref().map(|prefix| ("id", prefix));
        Ok(NodeOutput::Many(finish_listing(synonyms, prefix, p.options, &[])))
    }
    .boxed()
}

fn delete<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = SynonymRef::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.delete_synonym(&p.collection, &p.id).await?,
        ))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_way_synonym_body() {
        let params = Parameters::new()
            .with("collectionName", "products")
            .with("synonymId", "smart-phone")
            .with("synonyms", "iphone, android")
            .with("additionalFields", json!({"root": "smart phone", "symbolsToIndex": "+"}));
        let p = UpsertSynonym::from_parameters(&params).unwrap();
        assert_eq!(
            p.body,
            json!({"synonyms": ["iphone", "android"], "root": "smart phone", "symbols_to_index": ["+"]})
        );
    }

    #[test]
    fn test_synonyms_required() {
        let params = Parameters::new()
            .with("collectionName", "products")
            .with("synonymId", "empty")
            .with("synonyms", "");
        assert!(UpsertSynonym::from_parameters(&params).is_err());
    }
}
