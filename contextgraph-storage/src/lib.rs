//! In-memory property graph storage.
//!
//! [`GraphStore`] owns every node and relationship and keeps the invariants the
//! query engine relies on: endpoints always resolve to live nodes, ids are never
//! reused while alive, and id lookups stay O(1) across deletions.
//!
//! [`GraphImage`] is the enumerated form of a store. Transactions snapshot it and
//! the [`persistence`] module writes it to disk in a portable JSON tier and a
//! lossless binary tier.

mod error;
pub mod image;
pub mod persistence;
pub mod store;

pub use crate::error::{Error, Result};
pub use crate::image::GraphImage;
pub use crate::store::{BatchOutcome, GraphStore, RelationshipSpec};
