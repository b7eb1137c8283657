//! DOM operation errors

use thiserror::Error;

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
///
/// Every mutating operation validates before it touches the tree, so an
/// `Err` always means nothing changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// The mutation would violate tree-shape invariants
    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),
    /// A referenced child or attribute is not where the caller said it is
    #[error("Not found: {0}")]
    NotFound(String),
    /// The attribute is already owned by another element
    #[error("The attribute is in use by another element")]
    InUseAttribute,
    /// The node is in a lifecycle state that forbids the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// Offset out of range
    #[error("The index is not in the allowed range")]
    IndexSize,
    /// Operation not supported for this node or definition
    #[error("Not supported: {0}")]
    NotSupported(String),
    /// Name contains characters that are not allowed
    #[error("Invalid character in name: {0}")]
    InvalidCharacter(String),
    /// Malformed name or selector
    #[error("Syntax error: {0}")]
    Syntax(String),
    /// Invalid argument combination
    #[error("Type error: {0}")]
    Type(String),
}

impl DomError {
    pub(crate) fn hierarchy(message: impl Into<String>) -> Self {
        Self::HierarchyRequest(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomError::hierarchy("cycle");
        assert_eq!(err.to_string(), "Hierarchy request error: cycle");
        assert_eq!(DomError::IndexSize.to_string(), "The index is not in the allowed range");
    }
}
