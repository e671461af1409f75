//! API key operations

use super::listing::{finish_listing, ListOptions};
use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use crate::typesense::scoped_key::generate_scoped_search_key;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};

pub const HANDLERS: HandlerTable = &[
    ("create", create),
    ("get", get),
    ("getAll", get_all),
    ("delete", delete),
    ("generateScopedSearchKey", generate_scoped_key),
];

struct CreateKey {
    body: Value,
}

impl FromParameters for CreateKey {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let description = params.required_str("description", "Description")?;
        let actions = params.comma_list("actions");
        if actions.is_empty() {
            return Err(NodeError::validation("At least one action is required"));
        }
        let collections = params.comma_list("collections");
        if collections.is_empty() {
            return Err(NodeError::validation(
                "At least one collection is required (use * for all)",
            ));
        }

        let mut body = Map::new();
        body.insert("description".to_string(), Value::String(description));
        body.insert("actions".to_string(), json!(actions));
        body.insert("collections".to_string(), json!(collections));

        let additional = params.collection("additionalFields");
        if let Some(expires_at) = additional.optional_timestamp("expiresAt", "Expires at")? {
            body.insert("expires_at".to_string(), json!(expires_at));
        }
        if let Some(value) = additional.optional_str("value") {
            body.insert("value".to_string(), Value::String(value));
        }
        if let Some(autodelete) = additional.optional_bool("autodelete") {
            body.insert("autodelete".to_string(), Value::Bool(autodelete));
        }

        Ok(Self {
            body: Value::Object(body),
        })
    }
}

struct KeyId {
    id: u64,
}

impl FromParameters for KeyId {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            id: params.required_u64("keyId", "Key ID")?,
        })
    }
}

struct ListKeys {
    options: ListOptions,
    description_prefix: Option<String>,
}

impl FromParameters for ListKeys {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            options: ListOptions::from_parameters(params)?,
            description_prefix: params.collection("filters").optional_str("descriptionPrefix"),
        })
    }
}

struct ScopedKey {
    search_key: String,
    embedded: Map<String, Value>,
}

impl FromParameters for ScopedKey {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let search_key = params.required_str("searchKey", "Search key")?;
        let mut embedded =
            params.required_json_object("embeddedParameters", "Embedded parameters")?;
        if let Some(expires_at) = params.optional_timestamp("expiresAt", "Expires at")? {
            embedded.insert("expires_at".to_string(), json!(expires_at));
        }
        Ok(Self {
            search_key,
            embedded,
        })
    }
}

fn create<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = CreateKey::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(ctx.client.create_key(&p.body).await?))
    }
    .boxed()
}

fn get<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = KeyId::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(ctx.client.retrieve_key(p.id).await?))
    }
    .boxed()
}

fn get_all<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ListKeys::from_parameters(ctx.params)?;
        let keys = ctx.client.list_keys().await?;
        let prefix = p
            .description_prefix
            .as_deref()
            .map(|prefix| ("description", prefix));
        Ok(NodeOutput::Many(finish_listing(keys, prefix, p.options, &[])))
    }
    .boxed()
}

fn delete<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = KeyId::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(ctx.client.delete_key(p.id).await?))
    }
    .boxed()
}

/// Computed locally, no request is sent
fn generate_scoped_key<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ScopedKey::from_parameters(ctx.params)?;
        let scoped = generate_scoped_search_key(&p.search_key, &p.embedded)?;
        Ok(NodeOutput::Single(json!({ "scoped_key": scoped })))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body() {
        let params = Parameters::new()
            .with("description", "Search only")
            .with("actions", "documents:search")
            .with("collections", "books, authors")
            .with(
                "additionalFields",
                json!({"expiresAt": "2030-05-27T10:08:26Z", "autodelete": "yes"}),
            );
        let p = CreateKey::from_parameters(&params).unwrap();
        assert_eq!(
            p.body,
            json!({
                "description": "Search only",
                "actions": ["documents:search"],
                "collections": ["books", "authors"],
                "expires_at": 1906106906,
                "autodelete": true
            })
        );
    }

    #[test]
    fn test_create_requires_actions() {
        let params = Parameters::new()
            .with("description", "Empty")
            .with("actions", " ")
            .with("collections", "*");
        assert!(CreateKey::from_parameters(&params).is_err());
    }

    #[test]
    fn test_key_id_must_be_numeric() {
        let params = Parameters::new().with("keyId", "abc");
        assert!(KeyId::from_parameters(&params).is_err());
        let params = Parameters::new().with("keyId", "42");
        assert_eq!(KeyId::from_parameters(&params).unwrap().id, 42);
    }

    #[test]
    fn test_scoped_key_embeds_expiry() {
        let params = Parameters::new()
            .with("searchKey", "RN23GFr1s6jQ9kgSNg2O7fYcAUXU7127")
            .with("embeddedParameters", "{\"filter_by\": \"company_id:124\"}")
            .with("expiresAt", 1906054106);
        let p = ScopedKey::from_parameters(&params).unwrap();
        assert_eq!(p.embedded["expires_at"], 1906054106);
    }

    #[test]
    fn test_scoped_key_handler_runs_offline() {
        let creds = crate::config::Credentials::new("xyz", "127.0.0.1", crate::config::Protocol::Http)
            .with_port(1);
        let client = crate::typesense::get_client(Some(&creds)).unwrap();
        let params = Parameters::new()
            .with("searchKey", "RN23GFr1s6jQ9kgSNg2O7fYcAUXU7127")
            .with("embeddedParameters", json!({"filter_by": "company_id:124"}));
        let ctx = OperationContext {
            client: &client,
            params: &params,
            item_index: 0,
        };

        let output = tokio_test::block_on(generate_scoped_key(&ctx)).unwrap();
        let NodeOutput::Single(record) = output else {
            panic!("expected a single record");
        };
        assert!(record["scoped_key"].as_str().unwrap().len() > 40);
    }
}
