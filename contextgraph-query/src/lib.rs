pub mod ast;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod lexer;
mod matcher;
pub mod parser;
pub mod query_api;
pub mod result;
pub mod value;

pub use error::{Error, Result};
pub use query_api::{
    DEFAULT_MAX_VAR_LENGTH_HOPS, Params, PreparedQuery, QueryOptions, execute, prepare,
};
pub use result::{QueryResult, QueryStats, Record};
pub use value::Value;

pub fn parse(cypher: &str) -> Result<ast::Query> {
    parser::Parser::parse(cypher)
}
