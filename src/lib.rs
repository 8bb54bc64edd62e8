pub mod collection;
pub mod errors;
pub mod logger;
pub mod oid;
pub mod query;
pub mod stats;
pub mod store;
pub mod utils;

pub use crate::collection::{Collection, CollectionOptions, DEFAULT_QUERY_TIMEOUT_MS};
pub use crate::errors::{CollectionError, QueryError};
pub use crate::query::{
    DEFAULT_LIMIT, FilterGrammar, ODataGrammar, Order, ParsedQuery, Projection, QueryParams,
};
pub use crate::stats::{Increment, Increments, StatsRequest, StatsUpdatePlan};
pub use crate::store::{DataStore, FindSpec, MemoryStore, UpdateAck};

use bson::Document;

/// Decodes an encoded HTTP query string into a store-ready query.
///
/// Convenience wrapper over [`ParsedQuery::from_query_str`].
pub fn parse_query(query: &str) -> Result<ParsedQuery, QueryError> {
    ParsedQuery::from_query_str(query)
}

/// Decodes an encoded HTTP query string, merging `defaults` over the result.
pub fn parse_query_with_defaults(
    query: &str,
    defaults: Document,
) -> Result<ParsedQuery, QueryError> {
    ParsedQuery::parse(&QueryParams::from_query_str(query), Some(defaults))
}

/// Initializes the logging system.
///
/// This function should be called before any other operations.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::init()?;
    Ok(())
}
