//! # contextgraph
//!
//! An embedded, in-memory property graph with a Cypher-like query language.
//!
//! ```rust
//! use contextgraph::{Db, Params, Result};
//!
//! fn main() -> Result<()> {
//!     let mut db = Db::new();
//!     db.execute(
//!         "CREATE (:Person {name: 'Alice', age: 30})-[:KNOWS]->(:Person {name: 'Bob', age: 25})",
//!         &Params::new(),
//!     )?;
//!
//!     let result = db.execute(
//!         "MATCH (p:Person) WHERE p.age > 26 RETURN p.name",
//!         &Params::new(),
//!     )?;
//!     assert_eq!(result.value(None).map_err(contextgraph::Error::from)?.to_string(), "Alice");
//!     Ok(())
//! }
//! ```
//!
//! ## Core concepts
//!
//! - **[`Db`]**: owns the [`GraphStore`] and runs queries against it.
//! - **Transactions**: [`Db::begin`], [`Db::commit`] and [`Db::rollback`], or the
//!   [`Db::transaction`] closure. They are single level and snapshot the whole
//!   graph, so their cost grows with the graph rather than with the change.
//! - **Persistence**: [`Db::save`] and [`Db::load`] in a portable JSON [`Format`]
//!   or a lossless binary one.
//! - **[`query`]**: the query engine (re-exported from `contextgraph-query`).

mod error;

use contextgraph_storage::persistence;
use log::{info, warn};
use std::path::Path;

pub use contextgraph_api::{
    GraphView, Node, NodeId, Properties, PropertyValue, Relationship, RelationshipId,
};
pub use contextgraph_query as query;
pub use contextgraph_query::{
    DEFAULT_MAX_VAR_LENGTH_HOPS, Params, PreparedQuery, QueryOptions, QueryResult, QueryStats,
    Record, Value,
};
pub use contextgraph_storage::{GraphImage, GraphStore};
pub use error::{Error, Result};

/// Settings for a new [`Db`].
///
/// # Example
///
/// ```
/// use contextgraph::{Db, Options};
///
/// let db = Db::with_options(Options::new().directed(false).max_var_length_hops(4));
/// assert!(!db.store().directed());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    directed: bool,
    max_var_length_hops: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            directed: true,
            max_var_length_hops: DEFAULT_MAX_VAR_LENGTH_HOPS,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Undirected graphs traverse every relationship both ways.
    pub fn directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    /// Ceiling for open-ended variable-length hops such as `*` or `*2..`.
    pub fn max_var_length_hops(mut self, hops: u32) -> Self {
        self.max_var_length_hops = hops;
        self
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn var_length_ceiling(&self) -> u32 {
        self.max_var_length_hops
    }

    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            max_var_length_hops: self.max_var_length_hops,
        }
    }
}

/// On-disk encoding used by [`Db::save`] and [`Db::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Textual JSON document. Keeps null, booleans, integers, floats, strings,
    /// lists and string-keyed maps.
    Json,
    /// Binary encoding of the full [`GraphImage`], preserving every value tag.
    Binary,
}

impl Format {
    /// `.json` files are [`Format::Json`]; anything else is binary.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Binary,
        }
    }
}

/// The database handle.
///
/// All mutating calls take `&mut self`; share a `Db` between threads only
/// behind your own lock.
#[derive(Debug, Default)]
pub struct Db {
    store: GraphStore,
    options: Options,
    snapshot: Option<GraphImage>,
}

impl Db {
    /// Creates an empty directed database.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            store: GraphStore::new(options.directed),
            options,
            snapshot: None,
        }
    }

    /// Wraps an existing store, e.g. one filled by a bulk import.
    pub fn from_store(store: GraphStore) -> Self {
        let options = Options::new().directed(store.directed());
        Self {
            store,
            options,
            snapshot: None,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Changes the hop ceiling for later queries. Directedness belongs to the
    /// store and cannot change.
    pub fn set_max_var_length_hops(&mut self, hops: u32) {
        self.options = self.options.max_var_length_hops(hops);
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Direct access to the store. Changes made here are covered by an active
    /// transaction's snapshot like any other.
    pub fn store_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }

    pub fn into_store(self) -> GraphStore {
        self.store
    }

    /// Parses and runs a query.
    ///
    /// When the query fails inside an active transaction, the transaction is
    /// rolled back before the error is returned.
    pub fn execute(&mut self, text: &str, params: &Params) -> Result<QueryResult> {
        let outcome = query::prepare(text).and_then(|prepared| {
            prepared.execute(&mut self.store, params, &self.options.query_options())
        });
        self.finish(outcome)
    }

    /// Runs a query parsed earlier with [`query::prepare`].
    pub fn execute_prepared(
        &mut self,
        prepared: &PreparedQuery,
        params: &Params,
    ) -> Result<QueryResult> {
        let outcome = prepared.execute(&mut self.store, params, &self.options.query_options());
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: query::Result<QueryResult>) -> Result<QueryResult> {
        match outcome {
            Ok(result) => Ok(result),
            Err(e) => {
                if self.in_transaction() {
                    warn!("query failed inside a transaction, rolling back: {e}");
                    self.rollback()?;
                }
                Err(e.into())
            }
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Starts a transaction by snapshotting the whole graph.
    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction() {
            return Err(Error::Transaction(
                "a transaction is already active".to_string(),
            ));
        }
        self.snapshot = Some(self.store.to_image());
        info!(
            "transaction started ({} nodes, {} relationships)",
            self.store.node_count(),
            self.store.relationship_count()
        );
        Ok(())
    }

    /// Keeps every change since [`Db::begin`].
    pub fn commit(&mut self) -> Result<()> {
        if self.snapshot.take().is_none() {
            return Err(Error::Transaction("no active transaction".to_string()));
        }
        info!("transaction committed");
        Ok(())
    }

    /// Restores the graph as it was at [`Db::begin`].
    pub fn rollback(&mut self) -> Result<()> {
        let image = self
            .snapshot
            .take()
            .ok_or_else(|| Error::Transaction("no active transaction".to_string()))?;
        self.store = GraphStore::from_image(image)?;
        info!("transaction rolled back");
        Ok(())
    }

    /// Runs `f` inside a transaction: committed when it returns `Ok`, rolled
    /// back when it returns `Err`. The closure's error is returned unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use contextgraph::{Db, Params};
    ///
    /// let mut db = Db::new();
    /// let outcome = db.transaction(|db| {
    ///     db.execute("CREATE (:Temp)", &Params::new())?;
    ///     db.execute("RETURN 1 / 0", &Params::new())
    /// });
    /// assert!(outcome.is_err());
    /// assert_eq!(db.store().node_count(), 0);
    /// ```
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Db) -> Result<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                if self.in_transaction() {
                    self.commit()?;
                }
                Ok(value)
            }
            Err(e) => {
                // `execute` may already have rolled back.
                if self.in_transaction()
                    && let Err(rollback_err) = self.rollback()
                {
                    warn!("rollback after failed transaction also failed: {rollback_err}");
                }
                Err(e)
            }
        }
    }

    /// Writes the graph to `path`.
    pub fn save(&self, path: impl AsRef<Path>, format: Format) -> Result<()> {
        let path = path.as_ref();
        match format {
            Format::Json => persistence::save_json(&self.store, path)?,
            Format::Binary => persistence::save_binary(&self.store, path)?,
        }
        info!("saved graph to {} as {format:?}", path.display());
        Ok(())
    }

    /// Opens a graph written by [`Db::save`].
    pub fn load(path: impl AsRef<Path>, format: Format) -> Result<Self> {
        let path = path.as_ref();
        let store = match format {
            Format::Json => persistence::load_json(path)?,
            Format::Binary => persistence::load_binary(path)?,
        };
        info!(
            "loaded graph from {} ({} nodes, {} relationships)",
            path.display(),
            store.node_count(),
            store.relationship_count()
        );
        Ok(Self::from_store(store))
    }

    /// Removes everything and resets both id counters.
    pub fn clear(&mut self) {
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path("graph.json"), Format::Json);
        assert_eq!(Format::from_path("graph.JSON"), Format::Json);
        assert_eq!(Format::from_path("graph.cgdb"), Format::Binary);
        assert_eq!(Format::from_path("graph"), Format::Binary);
    }

    #[test]
    fn test_transaction_protocol() {
        let mut db = Db::new();
        assert!(matches!(db.commit(), Err(Error::Transaction(_))));
        assert!(matches!(db.rollback(), Err(Error::Transaction(_))));
        db.begin().unwrap();
        assert!(matches!(db.begin(), Err(Error::Transaction(_))));
        assert!(db.in_transaction());
        db.commit().unwrap();
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_failed_execute_rolls_back() {
        let mut db = Db::new();
        db.execute("CREATE (:Keep)", &Params::new()).unwrap();
        db.begin().unwrap();
        db.execute("CREATE (:Drop)", &Params::new()).unwrap();
        let err = db.execute("MATCH (n) RETURN 1 / 0", &Params::new());
        assert!(err.is_err());
        assert!(!db.in_transaction());
        assert_eq!(db.store().node_count(), 1);
    }

    #[test]
    fn test_failed_execute_outside_transaction_keeps_state() {
        let mut db = Db::new();
        db.execute("CREATE (:A)", &Params::new()).unwrap();
        assert!(db.execute("MATCH (", &Params::new()).unwrap_err().is_syntax());
        assert_eq!(db.store().node_count(), 1);
    }

    #[test]
    fn test_options_reach_the_query_engine() {
        let mut db = Db::with_options(Options::new().max_var_length_hops(2));
        db.execute(
            "CREATE (:S {i: 0})-[:T]->(:S {i: 1})-[:T]->(:S {i: 2})-[:T]->(:S {i: 3})",
            &Params::new(),
        )
        .unwrap();
        let result = db
            .execute("MATCH (a {i: 0})-[:T*]->(b) RETURN COUNT(b)", &Params::new())
            .unwrap();
        assert_eq!(result.value(None).unwrap(), &Value::Int(2));
    }
}
