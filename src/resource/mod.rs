//! Resource abstraction layer
//!
//! Each of the nine Typesense resources is a manifest (the operations and UI
//! fields the host renders, embedded from JSON at compile time) plus a table
//! mapping operation names to handler functions. One generic dispatcher runs
//! every resource.
//!
//! # Architecture
//!
//! - [`manifest`] - UI manifest types and the embedded JSON sources
//! - [`registry`] - lazily builds and memoizes one [`Resource`] per type
//! - [`listing`] - client-side filtering, truncation and column projection
//! - [`search`] - the shared search parameter assembly
//! - one module per resource with its typed parameters and handlers
//!
//! # Resource Definitions
//!
//! Manifests live in `src/resources/*.json`, one file per resource.

mod alias;
mod analytics;
mod api_key;
mod collection;
mod conversation;
mod document;
pub mod listing;
pub mod manifest;
mod overrides;
pub mod registry;
pub mod search;
mod synonym;

use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use crate::typesense::TypesenseClient;
use futures::future::BoxFuture;
use serde_json::{json, Value};

pub use manifest::{FieldDef, OperationDef, OptionValue, ResourceManifest};
pub use registry::ResourceRegistry;

/// Everything a handler may touch while running one operation
pub struct OperationContext<'a> {
    pub client: &'a TypesenseClient,
    pub params: &'a Parameters,
    pub item_index: usize,
}

/// What an operation hands back to the node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    Single(Value),
    Many(Vec<Value>),
}

impl NodeOutput {
    /// Flatten into output records
    ///
    /// A single result with an empty upstream body becomes one
    /// `{"success": true}` record. A list result is passed through as is, so
    /// an empty listing or a search without hits yields no records.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::Single(Value::Null) => vec![json!({ "success": true })],
            Self::Single(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

pub type OperationResult = NodeResult<NodeOutput>;

/// Handler signature shared by every operation
pub type Handler = for<'a> fn(&'a OperationContext<'a>) -> BoxFuture<'a, OperationResult>;

/// Operation name to handler
pub type HandlerTable = &'static [(&'static str, Handler)];

/// Typed parameters of one operation, parsed and validated in a single step
pub trait FromParameters: Sized {
    fn from_parameters(params: &Parameters) -> NodeResult<Self>;
}

/// The nine resources the node exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Collection,
    Document,
    Search,
    Analytics,
    ApiKey,
    Alias,
    Synonym,
    Override,
    Conversation,
}

impl ResourceType {
    pub const ALL: [ResourceType; 9] = [
        Self::Collection,
        Self::Document,
        Self::Search,
        Self::Analytics,
        Self::ApiKey,
        Self::Alias,
        Self::Synonym,
        Self::Override,
        Self::Conversation,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == s)
    }

    /// Value the host stores in the `resource` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Document => "document",
            Self::Search => "search",
            Self::Analytics => "analytics",
            Self::ApiKey => "apiKey",
            Self::Alias => "alias",
            Self::Synonym => "synonym",
            Self::Override => "override",
            Self::Conversation => "conversation",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    fn handlers(&self) -> HandlerTable {
        match self {
            Self::Collection => collection::HANDLERS,
            Self::Document => document::HANDLERS,
            Self::Search => search::HANDLERS,
            Self::Analytics => analytics::HANDLERS,
            Self::ApiKey => api_key::HANDLERS,
            Self::Alias => alias::HANDLERS,
            Self::Synonym => synonym::HANDLERS,
            Self::Override => overrides::HANDLERS,
            Self::Conversation => conversation::HANDLERS,
        }
    }
}

/// One resource: its manifest and its handlers
pub struct Resource {
    kind: ResourceType,
    manifest: ResourceManifest,
    handlers: HandlerTable,
}

impl Resource {
    /// Parse the embedded manifest and pair it with the handler table
    pub fn load(kind: ResourceType) -> NodeResult<Self> {
        let manifest = ResourceManifest::load(kind)?;

        // Every operation offered in the UI must be executable
        if let Some(missing) = manifest
            .operations
            .iter()
            .find(|op| !kind.handlers().iter().any(|(name, _)| *name == op.value))
        {
            return Err(NodeError::Configuration(format!(
                "Operation \"{}\" of resource \"{}\" has no handler",
                missing.value,
                kind.as_str()
            )));
        }

        Ok(Self {
            kind,
            manifest,
            handlers: kind.handlers(),
        })
    }

    pub fn kind(&self) -> ResourceType {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn display_name(&self) -> &str {
        &self.manifest.display_name
    }

    pub fn manifest(&self) -> &ResourceManifest {
        &self.manifest
    }

    pub fn operations(&self) -> &[OperationDef] {
        &self.manifest.operations
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.manifest.fields
    }

    pub fn supports(&self, operation: &str) -> bool {
        self.handler(operation).is_some()
    }

    fn handler(&self, operation: &str) -> Option<Handler> {
        self.handlers
            .iter()
            .find(|(name, _)| *name == operation)
            .map(|(_, handler)| *handler)
    }

    /// Run one operation for one item
    pub async fn execute(
        &self,
        operation: &str,
        client: &TypesenseClient,
        params: &Parameters,
        item_index: usize,
    ) -> OperationResult {
        let Some(handler) = self.handler(operation) else {
            return Err(NodeError::OperationNotSupported {
                resource: self.name().to_string(),
                operation: operation.to_string(),
                item_index,
            });
        };

        tracing::debug!(
            "execute: resource={}, operation={}, item={}",
            self.name(),
            operation,
            item_index
        );

        let ctx = OperationContext {
            client,
            params,
            item_index,
        };
        handler(&ctx).await
    }
}
