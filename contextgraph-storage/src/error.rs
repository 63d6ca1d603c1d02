use contextgraph_api::{NodeId, RelationshipId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("relationship {0} not found")]
    RelationshipNotFound(RelationshipId),

    #[error("node id {0} already exists")]
    DuplicateId(NodeId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("graph image corrupted: {0}")]
    Corrupt(String),
}
