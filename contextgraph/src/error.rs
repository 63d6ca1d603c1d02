use contextgraph_api::{NodeId, RelationshipId};
use std::fmt;

/// The error type for contextgraph operations.
#[derive(Debug)]
pub enum Error {
    /// The query text does not match the grammar.
    Syntax {
        message: String,
        /// Character offset of the offending token.
        position: usize,
        line: usize,
        column: usize,
    },
    /// A referenced node does not exist.
    NodeNotFound(NodeId),
    /// A referenced relationship does not exist.
    RelationshipNotFound(RelationshipId),
    /// An explicit node id is already taken.
    DuplicateId(NodeId),
    /// Transaction protocol violation: nested begin, or commit/rollback with
    /// no active transaction.
    Transaction(String),
    /// Failure while executing a well-formed query.
    Database(String),
    /// IO error interacting with the filesystem.
    Io(std::io::Error),
    /// A saved graph could not be encoded or decoded.
    Persistence(String),
}

impl Error {
    pub fn is_syntax(&self) -> bool {
        matches!(self, Error::Syntax { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax {
                message,
                line,
                column,
                ..
            } => write!(f, "Syntax error at line {line}, column {column}: {message}"),
            Error::NodeNotFound(id) => write!(f, "Node {id} not found"),
            Error::RelationshipNotFound(id) => write!(f, "Relationship {id} not found"),
            Error::DuplicateId(id) => write!(f, "Node id {id} already exists"),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e),
            Error::Database(e) => write!(f, "Database error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Persistence(e) => write!(f, "Persistence error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<contextgraph_storage::Error> for Error {
    fn from(e: contextgraph_storage::Error) -> Self {
        use contextgraph_storage::Error as StorageError;
        match e {
            StorageError::NodeNotFound(id) => Error::NodeNotFound(id),
            StorageError::RelationshipNotFound(id) => Error::RelationshipNotFound(id),
            StorageError::DuplicateId(id) => Error::DuplicateId(id),
            StorageError::Io(e) => Error::Io(e),
            _ => Error::Persistence(e.to_string()),
        }
    }
}

// Syntax errors keep their position; everything raised while executing is a
// database error.
impl From<contextgraph_query::Error> for Error {
    fn from(e: contextgraph_query::Error) -> Self {
        match e {
            contextgraph_query::Error::Syntax {
                message,
                position,
                line,
                column,
            } => Error::Syntax {
                message,
                position,
                line,
                column,
            },
            contextgraph_query::Error::Database(msg)
            | contextgraph_query::Error::InvalidResult(msg) => Error::Database(msg),
        }
    }
}

/// A specialized Result type for contextgraph operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn syntax_errors_stay_syntax_errors() {
        let query_err = contextgraph_query::parse("MATCH (n").unwrap_err();
        let err: Error = query_err.into();
        match err {
            Error::Syntax { position, line, .. } => {
                assert_eq!(position, 8);
                assert_eq!(line, 1);
            }
            other => panic!("expected syntax error, got: {other:?}"),
        }
    }

    #[test]
    fn map_storage_lookup_errors() {
        let err: Error = contextgraph_storage::Error::NodeNotFound(7).into();
        assert!(matches!(err, Error::NodeNotFound(7)));

        let err: Error = contextgraph_storage::Error::Corrupt("bad magic".into()).into();
        match err {
            Error::Persistence(msg) => assert!(msg.contains("bad magic")),
            other => panic!("expected persistence error, got: {other:?}"),
        }
    }
}
