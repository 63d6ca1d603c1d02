//! Error and result types for the query crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The query text does not match the grammar.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        /// Character offset of the offending token.
        position: usize,
        line: usize,
        column: usize,
    },

    /// Failure while executing a well-formed query.
    #[error("{0}")]
    Database(String),

    /// Misuse of a [`QueryResult`](crate::QueryResult) accessor.
    #[error("{0}")]
    InvalidResult(String),
}

impl Error {
    pub(crate) fn database(message: impl Into<String>) -> Self {
        Error::Database(message.into())
    }

    /// Wraps a storage failure with what the executor was doing at the time.
    pub(crate) fn storage(context: &str, err: contextgraph_storage::Error) -> Self {
        Error::Database(format!("{context}: {err}"))
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Error::Syntax { .. })
    }
}
