//! DOM Node Operations errors

use crate::NodeId;
use thiserror::Error;

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// Node not found
    #[error("node {0} not found")]
    NotFound(NodeId),
    /// Inserting a node into its own subtree, or moving the document
    #[error("hierarchy request error")]
    HierarchyRequest,
    /// Operation needs an element
    #[error("node {0} is not an element")]
    InvalidNodeType(NodeId),
    /// Reference node is not a child of the parent
    #[error("node is not a child")]
    NotAChild,
}
