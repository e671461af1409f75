//! HTTP utilities for Typesense REST calls
//!
//! Every request leaves through [`TypesenseHttpClient`]: it owns the base URL
//! derived from the credentials and attaches the API key header, so neither
//! the typed client nor the raw analytics/import paths repeat that work.

use crate::config::Credentials;
use crate::error::{NodeError, NodeResult};
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Header Typesense reads the API key from
pub const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let total = body.chars().count();
    let truncated = if total > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control() && c != ' ', "")
}

/// Fallback message when Typesense sends no `message` of its own
fn describe_status(status: u16) -> &'static str {
    match status {
        400 => "Bad request. Check the operation parameters.",
        401 => "Unauthorized. Check the Typesense API key.",
        403 => "Forbidden. The API key lacks permission for this action.",
        404 => "Not found.",
        409 => "Conflict. The resource already exists.",
        422 => "Unprocessable entity. Typesense rejected the payload.",
        429 => "Rate limit exceeded. Please try again later.",
        503 => "Typesense is not ready or is lagging behind.",
        500..=599 => "Typesense server error.",
        _ => "Request failed.",
    }
}

/// Ordered query string parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn push_opt<T: ToString>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    /// Flatten a JSON object into query pairs
    ///
    /// Arrays are comma-joined, nested objects are sent as JSON text and
    /// nulls are skipped.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut query = Self::new();
        for (key, value) in map {
            if let Some(text) = query_value(value) {
                query.push(key, text);
            }
        }
        query
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Percent-encode one path segment (collection names, document ids, ...)
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// HTTP client wrapper for Typesense API calls
#[derive(Clone)]
pub struct TypesenseHttpClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl TypesenseHttpClient {
    /// Create a new HTTP client from the credential record
    pub fn new(credentials: &Credentials) -> NodeResult<Self> {
        let base_url = Url::parse(&credentials.base_url()).map_err(|e| {
            NodeError::Configuration(format!(
                "Invalid Typesense host {:?}: {}",
                credentials.host, e
            ))
        })?;

        let mut builder = Client::builder().user_agent(concat!(
            "typesense-node/",
            env!("CARGO_PKG_VERSION")
        ));
        if credentials.timeout_seconds > 0 {
            let timeout = Duration::from_secs(credentials.timeout_seconds);
            builder = builder.connect_timeout(timeout).timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| NodeError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: credentials.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an already-encoded path plus query
    pub fn url(&self, path: &str, query: &Query) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.pairs().iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        url
    }

    /// Send a request with an optional JSON body and parse a JSON response
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> NodeResult<Value> {
        let url = self.url(path, query);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response_body = self.send(request).await?;

        // Handle empty response
        if response_body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_body)
            .map_err(|e| NodeError::upstream(format!("Failed to parse response JSON: {}", e)))
    }

    /// Send a request with an optional text body and return the raw response text
    pub async fn request_text(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<String>,
        content_type: &str,
    ) -> NodeResult<String> {
        let url = self.url(path, query);
        tracing::debug!("{} {} ({})", method, url, content_type);

        let mut request = self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key);

        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body);
        }

        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> NodeResult<String> {
        let response = request.send().await.map_err(NodeError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            NodeError::upstream(format!("Failed to read response body: {}", e))
        })?;

        if !status.is_success() {
            // Only log sanitized/truncated error body
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(NodeError::Upstream {
                status: Some(status.as_u16()),
                message: error_message(status.as_u16(), &body),
            });
        }

        Ok(body)
    }

    pub async fn get(&self, path: &str, query: &Query) -> NodeResult<Value> {
        self.request_json(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, query: &Query, body: Option<&Value>) -> NodeResult<Value> {
        self.request_json(Method::POST, path, query, body).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> NodeResult<Value> {
        self.request_json(Method::PUT, path, &Query::new(), Some(body))
            .await
    }

    pub async fn patch(&self, path: &str, query: &Query, body: &Value) -> NodeResult<Value> {
        self.request_json(Method::PATCH, path, query, Some(body)).await
    }

    pub async fn delete(&self, path: &str, query: &Query) -> NodeResult<Value> {
        self.request_json(Method::DELETE, path, query, None).await
    }
}

/// Pull Typesense's `{"message": ...}` out of an error body
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| describe_status(status).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use serde_json::json;

    #[test]
    fn test_url_building_with_query() {
        let creds = Credentials::new("key", "localhost", Protocol::Http);
        let client = TypesenseHttpClient::new(&creds).unwrap();

        let mut query = Query::new();
        query.push("q", "harry potter").push("query_by", "title");
        let url = client.url(
            &format!("/collections/{}/documents/search", encode_segment("my books")),
            &query,
        );

        assert_eq!(
            url.as_str(),
            "http://localhost:8108/collections/my%20books/documents/search?q=harry+potter&query_by=title"
        );
    }

    #[test]
    fn test_query_from_map_flattens_values() {
        let map = json!({
            "q": "*",
            "per_page": 10,
            "prefix": false,
            "facet_by": ["genre", "year"],
            "skip": null
        });
        let query = Query::from_map(map.as_object().unwrap());

        assert_eq!(query.get("q"), Some("*"));
        assert_eq!(query.get("per_page"), Some("10"));
        assert_eq!(query.get("prefix"), Some("false"));
        assert_eq!(query.get("facet_by"), Some("genre,year"));
        assert_eq!(query.get("skip"), None);
    }

    #[test]
    fn test_error_message_prefers_typesense_message() {
        assert_eq!(
            error_message(404, r#"{"message": "Collection not found"}"#),
            "Collection not found"
        );
        assert_eq!(error_message(401, "<html>nope</html>"), describe_status(401));
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "é".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("[truncated, 1000 bytes total]"));
        assert!(sanitize_for_log("a\nb").eq("ab"));
    }
}
