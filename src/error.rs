//! Node Errors
//!
//! Every failure the node can surface, from missing credentials to
//! Typesense rejecting a request.

use thiserror::Error;

/// Result alias used across the library
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors produced while resolving and executing an operation.
///
/// `Item` is only ever created by the node entry point, which wraps whatever
/// an operation returned with the index of the input item that failed.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Credentials are absent or unusable
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A parameter is missing, empty or malformed
    #[error("{0}")]
    Validation(String),

    /// The resource exists but does not know the requested operation
    #[error("the operation \"{operation}\" is not supported for resource \"{resource}\" (item {item_index})")]
    OperationNotSupported {
        resource: String,
        operation: String,
        item_index: usize,
    },

    /// The entry point was asked for a resource the node does not offer
    #[error("the resource \"{resource}\" is not supported; valid resources are: {}", .supported.join(", "))]
    ResourceNotSupported {
        resource: String,
        supported: Vec<String>,
    },

    /// The registry was asked to build an unknown resource type
    #[error("unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    /// Typesense (or the transport in front of it) failed the request
    #[error("Typesense request failed{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Any of the above, tagged with the input item that produced it
    #[error("item {item_index}: {source}")]
    Item {
        item_index: usize,
        #[source]
        source: Box<NodeError>,
    },
}

impl NodeError {
    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for an upstream error without an HTTP status
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// Wrap this error with the index of the item being processed
    pub fn at_item(self, item_index: usize) -> Self {
        match self {
            // Never double-wrap
            already @ Self::Item { .. } => already,
            other => Self::Item {
                item_index,
                source: Box::new(other),
            },
        }
    }

    /// Message shown to the user when the error becomes item data
    pub fn user_message(&self) -> String {
        match self {
            Self::Item { source, .. } => source.user_message(),
            other => other.to_string(),
        }
    }

    /// HTTP status attached to an upstream failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::Item { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NodeError {
    fn from(error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else if error.is_connect() {
            "could not connect to the Typesense server".to_string()
        } else {
            error.to_string()
        };
        Self::Upstream {
            status: error.status().map(|s| s.as_u16()),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_wrapping_keeps_innermost_index() {
        let err = NodeError::validation("Collection name is required")
            .at_item(1)
            .at_item(4);
        match err {
            NodeError::Item { item_index, .. } => assert_eq!(item_index, 1),
            other => panic!("expected item error, got {:?}", other),
        }
    }

    #[test]
    fn test_user_message_strips_item_prefix() {
        let err = NodeError::validation("Document ID is required").at_item(2);
        assert_eq!(err.to_string(), "item 2: Document ID is required");
        assert_eq!(err.user_message(), "Document ID is required");
    }

    #[test]
    fn test_upstream_display_includes_status() {
        let err = NodeError::Upstream {
            status: Some(404),
            message: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "Typesense request failed (404): Not Found");
        assert_eq!(err.at_item(0).status(), Some(404));
    }

    #[test]
    fn test_resource_not_supported_lists_resources() {
        let err = NodeError::ResourceNotSupported {
            resource: "bogus".to_string(),
            supported: vec!["collection".to_string(), "document".to_string()],
        };
        assert!(err.to_string().contains("collection, document"));
    }
}
