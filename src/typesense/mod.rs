//! Typesense API interaction module
//!
//! # Module Structure
//!
//! - [`http`] - transport: base URL, API key header, error mapping
//! - [`client`] - client factory and typed endpoint calls
//! - [`raw`] - analytics administration and NDJSON import/export
//! - [`ndjson`] - line-by-line NDJSON codec
//! - [`scoped_key`] - locally generated scoped search keys
//!
//! # Example
//!
//! ```ignore
//! use typesense_node::config::{Credentials, Protocol};
//! use typesense_node::typesense::get_client;
//!
//! async fn example() -> typesense_node::NodeResult<()> {
//!     let creds = Credentials::new("xyz", "localhost", Protocol::Http);
//!     let client = get_client(Some(&creds))?;
//!     let collections = client.list_collections().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod ndjson;
pub mod raw;
pub mod scoped_key;

pub use client::{get_client, TypesenseClient, WriteAction};
pub use http::{Query, API_KEY_HEADER};
pub use raw::{ExportOptions, ImportOptions, RawApi};
