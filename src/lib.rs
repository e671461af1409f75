//! Typesense workflow node
//!
//! Exposes collections, documents, search, analytics, API keys, aliases,
//! synonyms, overrides and conversation models of a Typesense server as
//! resource/operation pairs a workflow host can execute item by item.
//!
//! ```ignore
//! use typesense_node::{Credentials, Parameters, Protocol, ResourceRegistry, TypesenseNode};
//!
//! let registry = ResourceRegistry::new();
//! let creds = Credentials::new("xyz", "localhost", Protocol::Http);
//! let node = TypesenseNode::new(&registry, Some(&creds))?;
//! let items = vec![Parameters::new()
//!     .with("resource", "collection")
//!     .with("operation", "getAll")];
//! let records = node.execute(&items, false).await?;
//! ```

pub mod config;
pub mod error;
pub mod node;
pub mod params;
pub mod resource;
pub mod schema;
pub mod typesense;

pub use config::{Config, Credentials, Protocol};
pub use error::{NodeError, NodeResult};
pub use node::TypesenseNode;
pub use params::Parameters;
pub use resource::{ResourceRegistry, ResourceType};

/// Version injected at compile time via TYPESENSE_NODE_VERSION (set by CI),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("TYPESENSE_NODE_VERSION") {
    Some(v) => v,
    None => "dev",
};
