//! Conversational search: model management and `ask`

use super::listing::ListOptions;
use super::search::build_search_params;
use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use crate::typesense::Query;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};

pub const HANDLERS: HandlerTable = &[
    ("createModel", create_model),
    ("getModel", get_model),
    ("getAllModels", get_all_models),
    ("updateModel", update_model),
    ("deleteModel", delete_model),
    ("ask", ask),
];

pub const DEFAULT_MAX_BYTES: u64 = 16384;

/// Text attributes of a model: UI name, API name
const TEXT_ATTRIBUTES: &[(&str, &str)] = &[
    ("modelName", "model_name"),
    ("historyCollection", "history_collection"),
    ("llmApiKey", "api_key"),
    ("systemPrompt", "system_prompt"),
    ("modelId", "id"),
    ("accountId", "account_id"),
    ("vllmUrl", "vllm_url"),
];

/// Numeric attributes of a model: UI name, API name
const NUMBER_ATTRIBUTES: &[(&str, &str)] = &[("maxBytes", "max_bytes"), ("ttl", "ttl")];

/// Copy every supplied model attribute into `body`
fn model_attributes(source: &Parameters, body: &mut Map<String, Value>) -> NodeResult<()> {
    for (ui_name, api_name) in TEXT_ATTRIBUTES {
        if let Some(value) = source.optional_str(ui_name) {
            body.insert(api_name.to_string(), Value::String(value));
        }
    }
    for (ui_name, api_name) in NUMBER_ATTRIBUTES {
        if let Some(value) = source.optional_u64(ui_name)? {
            body.insert(api_name.to_string(), json!(value));
        }
    }
    Ok(())
}

struct CreateModel {
    body: Value,
}

impl FromParameters for CreateModel {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let mut body = Map::new();
        body.insert(
            "model_name".to_string(),
            Value::String(params.required_str("modelName", "Model name")?),
        );
        body.insert(
            "history_collection".to_string(),
            Value::String(params.required_str("historyCollection", "History collection")?),
        );
        body.insert(
            "max_bytes".to_string(),
            json!(params.u64_or("maxBytes", DEFAULT_MAX_BYTES)?),
        );
        model_attributes(params, &mut body)?;
        model_attributes(&params.collection("additionalFields"), &mut body)?;

        Ok(Self {
            body: Value::Object(body),
        })
    }
}

struct ModelId {
    id: String,
}

impl FromParameters for ModelId {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            id: params.required_str("modelId", "Model ID")?,
        })
    }
}

struct UpdateModel {
    id: String,
    body: Value,
}

impl FromParameters for UpdateModel {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let id = params.required_str("modelId", "Model ID")?;
        let mut body = Map::new();
        model_attributes(&params.collection("updateFields"), &mut body)?;
        // The path already names the model
        body.remove("id");
        if body.is_empty() {
            return Err(NodeError::validation(
                "Nothing to update: add at least one field",
            ));
        }
        Ok(Self {
            id,
            body: Value::Object(body),
        })
    }
}

struct Ask {
    collection: String,
    params: Map<String, Value>,
}

impl FromParameters for Ask {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let collection = params.required_str("collectionName", "Collection name")?;
        let query = params.required_str("query", "Query")?;
        let query_by = params.required_str("queryBy", "Query by")?;

        let mut overrides = Map::new();
        overrides.insert("conversation".to_string(), Value::Bool(true));
        overrides.insert(
            "conversation_model_id".to_string(),
            Value::String(params.required_str("modelId", "Model ID")?),
        );
        if let Some(conversation_id) = params.optional_str("conversationId") {
            overrides.insert("conversation_id".to_string(), Value::String(conversation_id));
        }

        Ok(Self {
            collection,
            params: build_search_params(
                &query,
                Some(&query_by),
                &params.collection("searchOptions"),
                overrides,
            )?,
        })
    }
}

fn create_model<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = CreateModel::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.create_conversation_model(&p.body).await?,
        ))
    }
    .boxed()
}

fn get_model<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ModelId::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.retrieve_conversation_model(&p.id).await?,
        ))
    }
    .boxed()
}

fn get_all_models<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let options = ListOptions::from_parameters(ctx.params)?;
        let models = ctx.client.list_conversation_models().await?;
        Ok(NodeOutput::Many(options.apply(models)))
    }
    .boxed()
}

fn update_model<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = UpdateModel::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.update_conversation_model(&p.id, &p.body).await?,
        ))
    }
    .boxed()
}

fn delete_model<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ModelId::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.delete_conversation_model(&p.id).await?,
        ))
    }
    .boxed()
}

fn ask<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = Ask::from_parameters(ctx.params)?;
        let response = ctx
            .client
            .search(&p.collection, &Query::from_map(&p.params))
            .await?;
        Ok(NodeOutput::Single(response))
    }
    .boxed()
}
