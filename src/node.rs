//! Node entry point
//!
//! Runs a batch of input items in order. Each item names a resource and an
//! operation; its output records are appended to one flat list.

use crate::config::Credentials;
use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use crate::resource::ResourceRegistry;
use crate::typesense::{get_client, TypesenseClient};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct TypesenseNode<'r> {
    registry: &'r ResourceRegistry,
    client: TypesenseClient,
}

impl<'r> TypesenseNode<'r> {
    /// Build the client from credentials; fails if they are missing
    pub fn new(registry: &'r ResourceRegistry, credentials: Option<&Credentials>) -> NodeResult<Self> {
        Ok(Self::with_client(registry, get_client(credentials)?))
    }

    pub fn with_client(registry: &'r ResourceRegistry, client: TypesenseClient) -> Self {
        Self { registry, client }
    }

    pub fn client(&self) -> &TypesenseClient {
        &self.client
    }

    /// Execute every item
    ///
    /// With `continue_on_fail` a failing item contributes `{"error": message}`
    /// and the batch goes on. Without it the first failure is returned wrapped
    /// with its item index and later items are not sent.
    #[tracing::instrument(skip_all, fields(execution_id = %Uuid::new_v4(), items = items.len()))]
    pub async fn execute(&self, items: &[Parameters], continue_on_fail: bool) -> NodeResult<Vec<Value>> {
        let mut output = Vec::with_capacity(items.len());

        for (item_index, params) in items.iter().enumerate() {
            match self.execute_item(item_index, params).await {
                Ok(records) => output.extend(records),
                Err(err) if continue_on_fail => {
                    warn!("Item {} failed, continuing: {}", item_index, err);
                    output.push(json!({ "error": err.user_message() }));
                }
                Err(err) => {
                    error!("Item {} failed: {}", item_index, err);
                    return Err(err.at_item(item_index));
                }
            }
        }

        Ok(output)
    }

    async fn execute_item(&self, item_index: usize, params: &Parameters) -> NodeResult<Vec<Value>> {
        let resource_type = params.required_str("resource", "Resource")?;
        let operation = params.required_str("operation", "Operation")?;

        if !self.registry.is_resource_supported(&resource_type) {
            return Err(NodeError::ResourceNotSupported {
                resource: resource_type,
                supported: self
                    .registry
                    .supported_resources()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
        }

        let resource = self.registry.get_resource(&resource_type)?;
        info!("Item {}: {}/{}", item_index, resource_type, operation);

        let output = resource
            .execute(&operation, &self.client, params, item_index)
            .await?;
        Ok(output.into_items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    fn offline_node(registry: &ResourceRegistry) -> TypesenseNode<'_> {
        // Port 1 is never listening; nothing in these tests reaches the network
        let creds = Credentials::new("xyz", "127.0.0.1", Protocol::Http).with_port(1);
        TypesenseNode::new(registry, Some(&creds)).unwrap()
    }

    #[test]
    fn test_missing_credentials() {
        let registry = ResourceRegistry::new();
        let err = TypesenseNode::new(&registry, None).err().unwrap();
        assert!(matches!(err, NodeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_resource_lists_valid_ones() {
        let registry = ResourceRegistry::new();
        let node = offline_node(&registry);
        let items = vec![Parameters::new()
            .with("resource", "pipeline")
            .with("operation", "run")];

        let err = node.execute(&items, false).await.unwrap_err();
        let NodeError::Item { item_index, source } = err else {
            panic!("expected an item error");
        };
        assert_eq!(item_index, 0);
        assert!(matches!(*source, NodeError::ResourceNotSupported { .. }));
        assert!(source.to_string().contains("collection, document, search"));
    }

    #[tokio::test]
    async fn test_unknown_operation_becomes_error_record() {
        let registry = ResourceRegistry::new();
        let node = offline_node(&registry);
        let items = vec![Parameters::new()
            .with("resource", "alias")
            .with("operation", "rename")];

        let output = node.execute(&items, true).await.unwrap();
        assert_eq!(output.len(), 1);
        let message = output[0]["error"].as_str().unwrap();
        assert!(message.contains("\"rename\""));
        assert!(message.contains("\"alias\""));
    }

    #[tokio::test]
    async fn test_validation_runs_before_any_request() {
        let registry = ResourceRegistry::new();
        let node = offline_node(&registry);
        let items = vec![Parameters::new()
            .with("resource", "collection")
            .with("operation", "get")];

        let output = node.execute(&items, true).await.unwrap();
        assert_eq!(output, vec![json!({"error": "Collection name is required"})]);
    }

    #[tokio::test]
    async fn test_local_operation_produces_record() {
        let registry = ResourceRegistry::new();
        let node = offline_node(&registry);
        let items = vec![Parameters::new()
            .with("resource", "apiKey")
            .with("operation", "generateScopedSearchKey")
            .with("searchKey", "RN23GFr1s6jQ9kgSNg2O7fYcAUXU7127")
            .with("embeddedParameters", json!({"filter_by": "company_id:124"}))];

        let output = node.execute(&items, false).await.unwrap();
        assert_eq!(output.len(), 1);
        assert!(output[0]["scoped_key"].is_string());
    }
}
