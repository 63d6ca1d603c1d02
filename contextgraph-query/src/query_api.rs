use crate::ast::Query;
use crate::error::Result;
use crate::executor::Executor;
use crate::result::QueryResult;
use crate::value::Value;
use contextgraph_storage::GraphStore;
use std::collections::BTreeMap;

/// Hop ceiling applied to variable-length relationships without an upper bound.
pub const DEFAULT_MAX_VAR_LENGTH_HOPS: u32 = 10;

/// Query parameters, referenced as `$name` in query text.
///
/// # Example
///
/// ```ignore
/// let mut params = Params::new();
/// params.insert("name", Value::from("Alice"));
/// let result = execute(&mut store, "MATCH (p {name: $name}) RETURN p", &params, &QueryOptions::default())?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    inner: BTreeMap<String, Value>,
}

impl Params {
    /// Creates a new empty parameters map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter value, replacing any previous value of that name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.insert(name.into(), value.into());
    }

    /// Builder form of [`Params::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Gets a parameter value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Upper bound for `*`, `*n..` and similar open-ended hop ranges.
    pub max_var_length_hops: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_var_length_hops: DEFAULT_MAX_VAR_LENGTH_HOPS,
        }
    }
}

/// A parsed query that can be executed any number of times.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    query: Query,
}

impl PreparedQuery {
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// True when the query contains CREATE, SET or DELETE.
    pub fn is_write(&self) -> bool {
        self.query.is_write()
    }

    pub fn execute(
        &self,
        store: &mut GraphStore,
        params: &Params,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        Executor::new(store, params, options).run(&self.query)
    }
}

/// Parses query text.
///
/// # Supported clauses
///
/// `MATCH`, `WHERE`, `CREATE`, `SET`, `[DETACH] DELETE`, `RETURN [DISTINCT]`,
/// `ORDER BY`, `SKIP` and `LIMIT`, in that order, each at most once.
pub fn prepare(text: &str) -> Result<PreparedQuery> {
    let query = crate::parser::Parser::parse(text)?;
    Ok(PreparedQuery { query })
}

/// Parses and runs `text` against `store`.
pub fn execute(
    store: &mut GraphStore,
    text: &str,
    params: &Params,
    options: &QueryOptions,
) -> Result<QueryResult> {
    prepare(text)?.execute(store, params, options)
}
