//! Collection operations

use super::listing::{finish_listing, ListOptions};
use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use crate::schema::{build_create_schema, build_update_schema, parse_schema_json, CollectionSchema};
use futures::future::BoxFuture;
use futures::FutureExt;

pub const HANDLERS: HandlerTable = &[
    ("create", create),
    ("get", get),
    ("getAll", get_all),
    ("update", update),
    ("delete", delete),
    ("truncate", truncate),
];

/// Group name of the `fields` fixedCollection rows
const FIELD_GROUP: &str = "field";

struct CreateCollection {
    schema: CollectionSchema,
}

impl FromParameters for CreateCollection {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        if params.bool_or("jsonParameters", false) {
            let schema = params.required_json("schemaJson", "Schema (JSON)")?;
            return Ok(Self {
                schema: parse_schema_json(schema, params.optional_str("name"))?,
            });
        }

        let mut additional = params.collection("additionalFields");
        if let Some(name) = params.optional_str("name") {
            additional.insert("name", name);
        }
        let rows = params.fixed_collection("fields", FIELD_GROUP);
        Ok(Self {
            schema: build_create_schema(&rows, &additional)?,
        })
    }
}

struct CollectionName {
    name: String,
}

impl FromParameters for CollectionName {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            name: params.required_str("collectionName", "Collection name")?,
        })
    }
}

struct ListCollections {
    options: ListOptions,
    name_prefix: Option<String>,
    columns: Vec<String>,
}

impl FromParameters for ListCollections {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let filters = params.collection("filters");
        Ok(Self {
            options: ListOptions::from_parameters(params)?,
            name_prefix: filters.optional_str("namePrefix"),
            columns: filters.comma_list("columns"),
        })
    }
}

struct UpdateCollection {
    name: String,
    schema: CollectionSchema,
}

impl FromParameters for UpdateCollection {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let name = params.required_str("collectionName", "Collection name")?;
        let rows = params.fixed_collection("fields", FIELD_GROUP);
        let schema = build_update_schema(&rows, &params.collection("additionalFields"))?;
        if schema.is_empty() {
            return Err(NodeError::validation(
                "Nothing to update: add at least one field or attribute",
            ));
        }
        Ok(Self { name, schema })
    }
}

fn create<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = CreateCollection::from_parameters(ctx.params)?;
        let created = ctx.client.create_collection(&p.schema).await?;
        Ok(NodeOutput::Single(created))
    }
    .boxed()
}

fn get<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = CollectionName::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(ctx.client.retrieve_collection(&p.name).await?))
    }
    .boxed()
}

fn get_all<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ListCollections::from_parameters(ctx.params)?;
        let collections = ctx.client.list_collections().await?;
        let prefix = p.name_prefix.as_deref().map(|prefix| ("name", prefix));
        Ok(NodeOutput::Many(finish_listing(
            collections,
            prefix,
            p.options,
            &p.columns,
        )))
    }
    .boxed()
}

fn update<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = UpdateCollection::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.update_collection(&p.name, &p.schema).await?,
        ))
    }
    .boxed()
}

fn delete<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = CollectionName::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(ctx.client.delete_collection(&p.name).await?))
    }
    .boxed()
}

fn truncate<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = CollectionName::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(ctx.client.truncate_collection(&p.name).await?))
    }
    .boxed()
}
