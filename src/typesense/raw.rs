//! Raw Endpoints
//!
//! Analytics administration and bulk import/export. These speak to Typesense
//! directly through the transport rather than the typed client: analytics
//! payloads are passed through mostly untouched and import/export bodies are
//! NDJSON text instead of JSON.

use super::client::{into_list, TypesenseClient, WriteAction};
use super::http::{encode_segment, Query, TypesenseHttpClient};
use crate::error::NodeResult;
use reqwest::Method;
use serde_json::Value;

const NDJSON_CONTENT_TYPE: &str = "text/plain";

/// Options for `POST /collections/{c}/documents/import`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    pub action: WriteAction,
    pub batch_size: Option<u64>,
    pub dirty_values: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            action: WriteAction::Create,
            batch_size: None,
            dirty_values: None,
        }
    }
}

/// Options for `GET /collections/{c}/documents/export`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportOptions {
    pub filter_by: Option<String>,
    pub include_fields: Option<String>,
    pub exclude_fields: Option<String>,
}

/// Raw calls sharing the client's transport
pub struct RawApi<'a> {
    http: &'a TypesenseHttpClient,
}

impl<'a> RawApi<'a> {
    pub fn new(client: &'a TypesenseClient) -> Self {
        Self {
            http: client.http(),
        }
    }

    fn rule_path(name: &str) -> String {
        format!("/analytics/rules/{}", encode_segment(name))
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    pub async fn create_analytics_rule(&self, rule: &Value) -> NodeResult<Value> {
        self.http
            .post("/analytics/rules", &Query::new(), Some(rule))
            .await
    }

    pub async fn upsert_analytics_rule(&self, name: &str, rule: &Value) -> NodeResult<Value> {
        self.http.put(&Self::rule_path(name), rule).await
    }

    pub async fn retrieve_analytics_rule(&self, name: &str) -> NodeResult<Value> {
        self.http.get(&Self::rule_path(name), &Query::new()).await
    }

    pub async fn list_analytics_rules(&self) -> NodeResult<Vec<Value>> {
        let response = self.http.get("/analytics/rules", &Query::new()).await?;
        Ok(into_list(response, Some("rules")))
    }

    pub async fn delete_analytics_rule(&self, name: &str) -> NodeResult<Value> {
        self.http
            .delete(&Self::rule_path(name), &Query::new())
            .await
    }

    pub async fn send_analytics_event(&self, event: &Value) -> NodeResult<Value> {
        self.http
            .post("/analytics/events", &Query::new(), Some(event))
            .await
    }

    pub async fn analytics_events(&self, user_id: &str, name: &str, n: u64) -> NodeResult<Value> {
        let mut query = Query::new();
        query.push("user_id", user_id).push("name", name).push("n", n);
        self.http.get("/analytics/events", &query).await
    }

    pub async fn flush_analytics(&self) -> NodeResult<Value> {
        self.http.post("/analytics/flush", &Query::new(), None).await
    }

    pub async fn analytics_status(&self) -> NodeResult<Value> {
        self.http.get("/analytics/status", &Query::new()).await
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Send NDJSON and return the per-line NDJSON result text
    pub async fn import_documents(
        &self,
        collection: &str,
        ndjson: String,
        options: &ImportOptions,
    ) -> NodeResult<String> {
        let mut query = Query::new();
        query
            .push("action", options.action.as_str())
            .push_opt("batch_size", options.batch_size)
            .push_opt("dirty_values", options.dirty_values.as_deref());

        let path = format!("{}/import", TypesenseClient::documents_path(collection));
        self.http
            .request_text(Method::POST, &path, &query, Some(ndjson), NDJSON_CONTENT_TYPE)
            .await
    }

    /// Fetch every matching document as NDJSON text
    pub async fn export_documents(&self, collection: &str, options: &ExportOptions) -> NodeResult<String> {
        let mut query = Query::new();
        query
            .push_opt("filter_by", options.filter_by.as_deref())
            .push_opt("include_fields", options.include_fields.as_deref())
            .push_opt("exclude_fields", options.exclude_fields.as_deref());

        let path = format!("{}/export", TypesenseClient::documents_path(collection));
        self.http
            .request_text(Method::GET, &path, &query, None, NDJSON_CONTENT_TYPE)
            .await
    }
}
