//! Alias operations

use super::listing::{finish_listing, ListOptions};
use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::NodeResult;
use crate::params::Parameters;
use futures::future::BoxFuture;
use futures::FutureExt;

pub const HANDLERS: HandlerTable = &[
    ("upsert", upsert),
    ("get", get),
    ("getAll", get_all),
    ("delete", delete),
];

struct UpsertAlias {
    name: String,
    collection: String,
}

impl FromParameters for UpsertAlias {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            name: params.required_str("aliasName", "Alias name")?,
            collection: params.required_str("collectionName", "Collection name")?,
        })
    }
}

struct AliasName {
    name: String,
}

impl FromParameters for AliasName {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            name: params.required_str("aliasName", "Alias name")?,
        })
    }
}

struct ListAliases {
    options: ListOptions,
    name_prefix: Option<String>,
}

impl FromParameters for ListAliases {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            options: ListOptions::from_parameters(params)?,
            name_prefix: params.collection("filters").optional_str("namePrefix"),
        })
    }
}

fn upsert<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = UpsertAlias::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.upsert_alias(&p.name, &p.collection).await?,
        ))
    }
    .boxed()
}

fn get<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = AliasName::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(ctx.client.retrieve_alias(&p.name).await?))
    }
    .boxed()
}

fn get_all<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ListAliases::from_parameters(ctx.params)?;
        let aliases = ctx.client.list_aliases().await?;
        Ok(NodeOutput::Many(finish_listing(
            aliases,
            p.name_prefix.as_deref().map(|prefix| ("name", prefix)),
            p.options,
            &[],
        )))
    }
    .boxed()
}

fn delete<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = AliasName::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(ctx.client.delete_alias(&p.name).await?))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_aliases_reads_filters() {
        let params = Parameters::new()
            .with("limit", 3)
            .with("filters", json!({"namePrefix": "books_"}));
        let p = ListAliases::from_parameters(&params).unwrap();

        assert_eq!(p.name_prefix.as_deref(), Some("books_"));
        assert_eq!(p.options.limit, 3);
        assert!(!p.options.return_all);
    }

    #[test]
    fn test_list_aliases_rejects_zero_limit() {
        let params = Parameters::new().with("limit", 0);
        assert!(ListAliases::from_parameters(&params).is_err());
    }
}
