//! Typesense Client
//!
//! Typed entry points for the endpoints the node covers, built on the shared
//! HTTP transport.

use super::http::{encode_segment, Query, TypesenseHttpClient};
use crate::config::Credentials;
use crate::error::{NodeError, NodeResult};
use crate::schema::CollectionSchema;
use serde_json::{json, Value};

/// Build a client handle from the credential record
///
/// A new handle is created for every call; reqwest pools connections per
/// handle.
pub fn get_client(credentials: Option<&Credentials>) -> NodeResult<TypesenseClient> {
    let Some(credentials) = credentials else {
        return Err(NodeError::Configuration(
            "No Typesense credentials were provided".to_string(),
        ));
    };
    if credentials.api_key.trim().is_empty() {
        return Err(NodeError::Configuration(
            "The Typesense API key is missing".to_string(),
        ));
    }
    if credentials.host.trim().is_empty() {
        return Err(NodeError::Configuration(
            "The Typesense host is missing".to_string(),
        ));
    }

    TypesenseClient::new(credentials)
}

/// How a single-document write treats an existing id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Upsert,
    Update,
    Emplace,
}

impl WriteAction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "create" => Some(Self::Create),
            "upsert" => Some(Self::Upsert),
            "update" => Some(Self::Update),
            "emplace" => Some(Self::Emplace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Upsert => "upsert",
            Self::Update => "update",
            Self::Emplace => "emplace",
        }
    }
}

/// Main Typesense client
#[derive(Clone)]
pub struct TypesenseClient {
    http: TypesenseHttpClient,
}

impl TypesenseClient {
    /// Create a new Typesense client
    pub fn new(credentials: &Credentials) -> NodeResult<Self> {
        let http = TypesenseHttpClient::new(credentials)?;
        tracing::debug!("Typesense client ready for {}", http.base_url());
        Ok(Self { http })
    }

    /// Shared transport, for endpoints without a typed wrapper
    pub fn http(&self) -> &TypesenseHttpClient {
        &self.http
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    pub fn collection_path(collection: &str) -> String {
        format!("/collections/{}", encode_segment(collection))
    }

    pub fn documents_path(collection: &str) -> String {
        format!("{}/documents", Self::collection_path(collection))
    }

    pub fn document_path(collection: &str, id: &str) -> String {
        format!("{}/{}", Self::documents_path(collection), encode_segment(id))
    }

    fn child_path(collection: &str, kind: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            Self::collection_path(collection),
            kind,
            encode_segment(id)
        )
    }

    // =========================================================================
    // Collections
    // =========================================================================

    pub async fn list_collections(&self) -> NodeResult<Vec<Value>> {
        let response = self.http.get("/collections", &Query::new()).await?;
        Ok(into_list(response, None))
    }

    pub async fn create_collection(&self, schema: &CollectionSchema) -> NodeResult<Value> {
        let body = to_body(schema)?;
        self.http.post("/collections", &Query::new(), Some(&body)).await
    }

    pub async fn retrieve_collection(&self, name: &str) -> NodeResult<Value> {
        self.http
            .get(&Self::collection_path(name), &Query::new())
            .await
    }

    pub async fn update_collection(&self, name: &str, schema: &CollectionSchema) -> NodeResult<Value> {
        let body = to_body(schema)?;
        self.http
            .patch(&Self::collection_path(name), &Query::new(), &body)
            .await
    }

    pub async fn delete_collection(&self, name: &str) -> NodeResult<Value> {
        self.http
            .delete(&Self::collection_path(name), &Query::new())
            .await
    }

    /// Remove every document but keep the schema
    pub async fn truncate_collection(&self, name: &str) -> NodeResult<Value> {
        let mut query = Query::new();
        query.push("truncate", true);
        self.http.delete(&Self::documents_path(name), &query).await
    }

    // =========================================================================
    // Documents
    // =========================================================================

    pub async fn write_document(
        &self,
        collection: &str,
        document: &Value,
        action: WriteAction,
    ) -> NodeResult<Value> {
        let mut query = Query::new();
        query.push("action", action.as_str());
        self.http
            .post(&Self::documents_path(collection), &query, Some(document))
            .await
    }

    pub async fn retrieve_document(&self, collection: &str, id: &str) -> NodeResult<Value> {
        self.http
            .get(&Self::document_path(collection, id), &Query::new())
            .await
    }

    pub async fn update_document(&self, collection: &str, id: &str, document: &Value) -> NodeResult<Value> {
        self.http
            .patch(&Self::document_path(collection, id), &Query::new(), document)
            .await
    }

    pub async fn delete_document(&self, collection: &str, id: &str) -> NodeResult<Value> {
        self.http
            .delete(&Self::document_path(collection, id), &Query::new())
            .await
    }

    pub async fn delete_documents_by_query(
        &self,
        collection: &str,
        filter_by: &str,
        batch_size: Option<u64>,
    ) -> NodeResult<Value> {
        let mut query = Query::new();
        query
            .push("filter_by", filter_by)
            .push_opt("batch_size", batch_size);
        self.http
            .delete(&Self::documents_path(collection), &query)
            .await
    }

    pub async fn update_documents_by_query(
        &self,
        collection: &str,
        filter_by: &str,
        document: &Value,
    ) -> NodeResult<Value> {
        let mut query = Query::new();
        query.push("filter_by", filter_by);
        self.http
            .patch(&Self::documents_path(collection), &query, document)
            .await
    }

    // =========================================================================
    // Search
    // =========================================================================

    pub async fn search(&self, collection: &str, params: &Query) -> NodeResult<Value> {
        let path = format!("{}/search", Self::documents_path(collection));
        self.http.get(&path, params).await
    }

    /// `POST /multi_search`; `common` applies to every search in the body
    pub async fn multi_search(&self, searches: Vec<Value>, common: &Query) -> NodeResult<Value> {
        let body = json!({ "searches": searches });
        self.http.post("/multi_search", common, Some(&body)).await
    }

    // =========================================================================
    // API keys
    // =========================================================================

    pub async fn create_key(&self, body: &Value) -> NodeResult<Value> {
        self.http.post("/keys", &Query::new(), Some(body)).await
    }

    pub async fn retrieve_key(&self, id: u64) -> NodeResult<Value> {
        self.http.get(&format!("/keys/{}", id), &Query::new()).await
    }

    pub async fn list_keys(&self) -> NodeResult<Vec<Value>> {
        let response = self.http.get("/keys", &Query::new()).await?;
        Ok(into_list(response, Some("keys")))
    }

    pub async fn delete_key(&self, id: u64) -> NodeResult<Value> {
        self.http
            .delete(&format!("/keys/{}", id), &Query::new())
            .await
    }

    // =========================================================================
    // Aliases
    // =========================================================================

    pub async fn upsert_alias(&self, name: &str, collection: &str) -> NodeResult<Value> {
        let body = json!({ "collection_name": collection });
        self.http
            .put(&format!("/aliases/{}", encode_segment(name)), &body)
            .await
    }

    pub async fn retrieve_alias(&self, name: &str) -> NodeResult<Value> {
        self.http
            .get(&format!("/aliases/{}", encode_segment(name)), &Query::new())
            .await
    }

    pub async fn list_aliases(&self) -> NodeResult<Vec<Value>> {
        let response = self.http.get("/aliases", &Query::new()).await?;
        Ok(into_list(response, Some("aliases")))
    }

    pub async fn delete_alias(&self, name: &str) -> NodeResult<Value> {
        self.http
            .delete(&format!("/aliases/{}", encode_segment(name)), &Query::new())
            .await
    }

    // =========================================================================
    // Synonyms and overrides (per collection)
    // =========================================================================

    pub async fn upsert_synonym(&self, collection: &str, id: &str, body: &Value) -> NodeResult<Value> {
        self.http
            .put(&Self::child_path(collection, "synonyms", id), body)
            .await
    }

    pub async fn retrieve_synonym(&self, collection: &str, id: &str) -> NodeResult<Value> {
        self.http
            .get(&Self::child_path(collection, "synonyms", id), &Query::new())
            .await
    }

    pub async fn list_synonyms(&self, collection: &str) -> NodeResult<Vec<Value>> {
        let path = format!("{}/synonyms", Self::collection_path(collection));
        let response = self.http.get(&path, &Query::new()).await?;
        Ok(into_list(response, Some("synonyms")))
    }

    pub async fn delete_synonym(&self, collection: &str, id: &str) -> NodeResult<Value> {
        self.http
            .delete(&Self::child_path(collection, "synonyms", id), &Query::new())
            .await
    }

    pub async fn upsert_override(&self, collection: &str, id: &str, body: &Value) -> NodeResult<Value> {
        self.http
            .put(&Self::child_path(collection, "overrides", id), body)
            .await
    }

    pub async fn retrieve_override(&self, collection: &str, id: &str) -> NodeResult<Value> {
        self.http
            .get(&Self::child_path(collection, "overrides", id), &Query::new())
            .await
    }

    pub async fn list_overrides(&self, collection: &str) -> NodeResult<Vec<Value>> {
        let path = format!("{}/overrides", Self::collection_path(collection));
        let response = self.http.get(&path, &Query::new()).await?;
        Ok(into_list(response, Some("overrides")))
    }

    pub async fn delete_override(&self, collection: &str, id: &str) -> NodeResult<Value> {
        self.http
            .delete(&Self::child_path(collection, "overrides", id), &Query::new())
            .await
    }

    // =========================================================================
    // Conversation models
    // =========================================================================

    pub async fn create_conversation_model(&self, body: &Value) -> NodeResult<Value> {
        self.http
            .post("/conversations/models", &Query::new(), Some(body))
            .await
    }

    pub async fn retrieve_conversation_model(&self, id: &str) -> NodeResult<Value> {
        self.http
            .get(&format!("/conversations/models/{}", encode_segment(id)), &Query::new())
            .await
    }

    pub async fn list_conversation_models(&self) -> NodeResult<Vec<Value>> {
        let response = self.http.get("/conversations/models", &Query::new()).await?;
        Ok(into_list(response, Some("models")))
    }

    pub async fn update_conversation_model(&self, id: &str, body: &Value) -> NodeResult<Value> {
        self.http
            .put(&format!("/conversations/models/{}", encode_segment(id)), body)
            .await
    }

    pub async fn delete_conversation_model(&self, id: &str) -> NodeResult<Value> {
        self.http
            .delete(&format!("/conversations/models/{}", encode_segment(id)), &Query::new())
            .await
    }
}

/// Lists come back either bare or wrapped in an object under `key`
pub(crate) fn into_list(response: Value, key: Option<&str>) -> Vec<Value> {
    match response {
        Value::Array(items) => items,
        Value::Object(mut map) => key
            .and_then(|k| map.remove(k))
            .and_then(|v| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn to_body<T: serde::Serialize>(payload: &T) -> NodeResult<Value> {
    serde_json::to_value(payload)
        .map_err(|e| NodeError::validation(format!("Failed to serialize request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    #[test]
    fn test_get_client_requires_credentials() {
        let err = get_client(None).err().expect("should fail without credentials");
        assert!(matches!(err, NodeError::Configuration(_)));

        let blank = Credentials::new("", "localhost", Protocol::Http);
        assert!(matches!(get_client(Some(&blank)), Err(NodeError::Configuration(_))));

        let ok = Credentials::new("xyz", "localhost", Protocol::Https);
        let client = get_client(Some(&ok)).expect("client should build");
        assert_eq!(client.http().base_url().as_str(), "https://localhost/");
    }

    #[test]
    fn test_paths_encode_segments() {
        assert_eq!(
            TypesenseClient::document_path("books/2024", "a b"),
            "/collections/books%2F2024/documents/a%20b"
        );
        assert_eq!(
            TypesenseClient::child_path("books", "synonyms", "coat-syn"),
            "/collections/books/synonyms/coat-syn"
        );
    }

    #[test]
    fn test_into_list_unwraps_known_shapes() {
        assert_eq!(into_list(json!([1, 2]), None).len(), 2);
        assert_eq!(into_list(json!({"keys": [{"id": 1}]}), Some("keys")).len(), 1);
        assert!(into_list(json!({"other": []}), Some("keys")).is_empty());
        assert!(into_list(Value::Null, None).is_empty());
    }
}
